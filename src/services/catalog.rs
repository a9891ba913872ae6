//! Catalog management service: authors, categories and books
//!
//! Deleting an author or a category deletes its books, and deleting a book
//! deletes its borrows. These cascades run here, inside one transaction, and
//! not through foreign key actions.

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorInput},
        book::{Book, BookFields, BookInput, BookQuery},
        category::{Category, CategoryInput},
    },
    repository::{
        books::{BookScope, CascadeSummary},
        Repository,
    },
};
use validator::Validate;

const DUPLICATE_CATEGORY: &str = "category with this name already exists.";

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    // Authors

    pub async fn list_authors(&self) -> AppResult<Vec<Author>> {
        self.repository.authors_list().await
    }

    pub async fn get_author(&self, id: i32) -> AppResult<Author> {
        self.repository.authors_get_by_id(id).await
    }

    pub async fn create_author(&self, data: AuthorInput) -> AppResult<Author> {
        data.validate()?;
        self.repository.authors_create(&data).await
    }

    pub async fn update_author(&self, id: i32, data: AuthorInput) -> AppResult<Author> {
        data.validate()?;
        self.repository.authors_update(id, &data).await
    }

    /// Delete an author with all its books and their borrows
    pub async fn delete_author(&self, id: i32) -> AppResult<CascadeSummary> {
        let mut tx = self.repository.begin().await?;
        if !self.repository.authors_lock(&mut tx, id).await? {
            return Err(AppError::NotFound(format!("Author {} not found", id)));
        }

        let removed = self
            .repository
            .books_delete_cascade(&mut tx, BookScope::Author(id))
            .await?;
        self.repository.authors_delete(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(
            author_id = id,
            books = removed.books,
            borrows = removed.borrows,
            "Author deleted with dependent books"
        );
        Ok(removed)
    }

    // Categories

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.repository.categories_list().await
    }

    pub async fn get_category(&self, id: i32) -> AppResult<Category> {
        self.repository.categories_get_by_id(id).await
    }

    pub async fn create_category(&self, data: CategoryInput) -> AppResult<Category> {
        data.validate()?;
        if self.repository.categories_name_exists(&data.name, None).await? {
            return Err(AppError::field("name", DUPLICATE_CATEGORY));
        }
        self.repository.categories_create(&data).await
    }

    pub async fn update_category(&self, id: i32, data: CategoryInput) -> AppResult<Category> {
        data.validate()?;
        // 404 takes precedence over a name clash
        self.repository.categories_get_by_id(id).await?;
        if self.repository.categories_name_exists(&data.name, Some(id)).await? {
            return Err(AppError::field("name", DUPLICATE_CATEGORY));
        }
        self.repository.categories_update(id, &data).await
    }

    /// Delete a category with all its books and their borrows
    pub async fn delete_category(&self, id: i32) -> AppResult<CascadeSummary> {
        let mut tx = self.repository.begin().await?;
        if !self.repository.categories_lock(&mut tx, id).await? {
            return Err(AppError::NotFound(format!("Category {} not found", id)));
        }

        let removed = self
            .repository
            .books_delete_cascade(&mut tx, BookScope::Category(id))
            .await?;
        self.repository.categories_delete(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(
            category_id = id,
            books = removed.books,
            borrows = removed.borrows,
            "Category deleted with dependent books"
        );
        Ok(removed)
    }

    // Books

    pub async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        self.repository.books_list(query).await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books_get_by_id(id).await
    }

    pub async fn create_book(&self, data: BookInput) -> AppResult<Book> {
        let fields = self.checked_book_fields(data).await?;
        let book = self.repository.books_create(&fields).await?;
        tracing::info!(book_id = book.id, title = %book.title, "Book created");
        Ok(book)
    }

    pub async fn update_book(&self, id: i32, data: BookInput) -> AppResult<Book> {
        self.repository.books_get_by_id(id).await?;
        let fields = self.checked_book_fields(data).await?;
        self.repository.books_update(id, &fields).await
    }

    /// Delete a book and its borrows
    pub async fn delete_book(&self, id: i32) -> AppResult<CascadeSummary> {
        let mut tx = self.repository.begin().await?;
        if self.repository.books_lock(&mut tx, id).await?.is_none() {
            return Err(AppError::NotFound(format!("Book {} not found", id)));
        }

        let removed = self
            .repository
            .books_delete_cascade(&mut tx, BookScope::Book(id))
            .await?;
        tx.commit().await?;

        tracing::info!(book_id = id, borrows = removed.borrows, "Book deleted");
        Ok(removed)
    }

    /// Validate payload and referenced author/category
    async fn checked_book_fields(&self, data: BookInput) -> AppResult<BookFields> {
        let fields = data.into_fields()?;

        if !self.repository.authors_exists(fields.author_id).await? {
            return Err(AppError::field(
                "author",
                format!("Invalid pk \"{}\" - object does not exist.", fields.author_id),
            ));
        }
        if !self.repository.categories_exists(fields.category_id).await? {
            return Err(AppError::field(
                "category",
                format!("Invalid pk \"{}\" - object does not exist.", fields.category_id),
            ));
        }

        Ok(fields)
    }
}
