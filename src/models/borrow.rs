//! Borrow model, lending date rules and workflow requests

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::book::Book;

/// Borrow row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Borrow {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
}

/// Borrow lifecycle. Active -> Returned is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowState {
    Active,
    Returned,
}

impl Borrow {
    pub fn state(&self) -> BorrowState {
        match self.return_date {
            None => BorrowState::Active,
            Some(_) => BorrowState::Returned,
        }
    }
}

/// Due date of a borrow started on `borrow_date`
pub fn due_date_for(borrow_date: NaiveDate, loan_period_days: i64) -> NaiveDate {
    borrow_date + Duration::days(loan_period_days)
}

/// Whole days between due date and return date; zero when returned on time
pub fn days_late(due_date: NaiveDate, return_date: NaiveDate) -> i32 {
    let days = (return_date - due_date).num_days();
    if days > 0 {
        i32::try_from(days).unwrap_or(i32::MAX)
    } else {
        0
    }
}

/// Borrow with the borrowed book embedded
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowDetails {
    pub id: i32,
    /// Borrower ID
    pub user: i32,
    pub book: Book,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
}

impl BorrowDetails {
    pub fn new(borrow: Borrow, book: Book) -> Self {
        BorrowDetails {
            id: borrow.id,
            user: borrow.user_id,
            book,
            borrow_date: borrow.borrow_date,
            due_date: borrow.due_date,
            return_date: borrow.return_date,
        }
    }
}

/// Borrow request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BorrowRequest {
    #[validate(required(message = "This field is required."))]
    pub book_id: Option<i32>,
}

/// Return request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReturnRequest {
    #[validate(required(message = "This field is required."))]
    pub borrow_id: Option<i32>,
}
