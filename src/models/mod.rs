//! Data models for Libris

pub mod author;
pub mod book;
pub mod borrow;
pub mod category;
pub mod user;

// Re-export commonly used types
pub use author::Author;
pub use book::Book;
pub use borrow::{Borrow, BorrowDetails};
pub use category::Category;
pub use user::{Role, User, UserClaims, UserProfile};
