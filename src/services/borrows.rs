//! Borrow and return workflows
//!
//! Both workflows run in a single transaction. All rule checks happen before
//! the first write, and the rows they depend on are locked first, so two
//! requests racing for the last copy (or for a user's last borrowing slot)
//! are serialized by the database.

use chrono::{NaiveDate, Utc};
use validator::Validate;

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::borrow::{days_late, due_date_for, BorrowDetails, BorrowRequest, BorrowState},
    repository::{books::BookStock, Repository},
};

#[derive(Clone)]
pub struct BorrowsService {
    repository: Repository,
    config: LendingConfig,
}

/// Outcome of a return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnOutcome {
    pub borrow_id: i32,
    pub return_date: NaiveDate,
    pub days_late: i32,
}

impl BorrowsService {
    pub fn new(repository: Repository, config: LendingConfig) -> Self {
        Self { repository, config }
    }

    /// Active borrows of a user
    pub async fn active_borrows(&self, user_id: i32) -> AppResult<Vec<BorrowDetails>> {
        self.repository.borrows_active_for_user(user_id).await
    }

    /// Borrow one copy of the requested book for `user_id`
    pub async fn borrow(&self, user_id: i32, request: BorrowRequest) -> AppResult<BorrowDetails> {
        self.borrow_on(user_id, request, today()).await
    }

    /// Borrow dated `today`
    pub async fn borrow_on(
        &self,
        user_id: i32,
        request: BorrowRequest,
        today: NaiveDate,
    ) -> AppResult<BorrowDetails> {
        let mut tx = self.repository.begin().await?;

        // Serializes concurrent borrows by the same user
        self.repository.users_lock(&mut tx, user_id).await?;

        let active = self.repository.borrows_count_active(&mut tx, user_id).await?;
        check_borrow_limit(active, self.config.max_active_borrows)?;

        request.validate()?;
        let book_id = request
            .book_id
            .ok_or_else(|| AppError::field("book_id", "This field is required."))?;
        let stock = self
            .repository
            .books_lock(&mut tx, book_id)
            .await?
            .ok_or_else(|| {
                AppError::field(
                    "book_id",
                    format!("Invalid pk \"{}\" - object does not exist.", book_id),
                )
            })?;
        check_available(&stock)?;

        self.repository.books_take_copy(&mut tx, book_id).await?;
        let borrow = self
            .repository
            .borrows_insert(
                &mut tx,
                user_id,
                book_id,
                today,
                due_date_for(today, self.config.loan_period_days),
            )
            .await?;
        let book = self.repository.books_get_in(&mut tx, book_id).await?;

        tx.commit().await?;

        tracing::info!(
            borrow_id = borrow.id,
            user_id,
            book_id,
            due_date = %borrow.due_date,
            "Book borrowed"
        );
        Ok(BorrowDetails::new(borrow, book))
    }

    /// Return a borrow owned by `user_id`, accruing penalty points when late
    pub async fn return_borrow(&self, user_id: i32, borrow_id: i32) -> AppResult<ReturnOutcome> {
        self.return_borrow_on(user_id, borrow_id, today()).await
    }

    /// Return dated `today`
    ///
    /// Locks the book row before the borrow row, the same order as book
    /// deletion, so the two cannot deadlock.
    pub async fn return_borrow_on(
        &self,
        user_id: i32,
        borrow_id: i32,
        today: NaiveDate,
    ) -> AppResult<ReturnOutcome> {
        let not_found = || AppError::NotFound(format!("Borrow {} not found", borrow_id));
        let mut tx = self.repository.begin().await?;

        let book_id = self
            .repository
            .borrows_book_for_user(&mut tx, borrow_id, user_id)
            .await?
            .ok_or_else(not_found)?;
        // Gone if the book was deleted meanwhile, and its borrows with it
        self.repository
            .books_lock(&mut tx, book_id)
            .await?
            .ok_or_else(not_found)?;

        let borrow = self
            .repository
            .borrows_lock_for_user(&mut tx, borrow_id, user_id)
            .await?
            .ok_or_else(not_found)?;

        if borrow.state() == BorrowState::Returned {
            return Err(AppError::AlreadyReturned(
                "This book has already been returned.".to_string(),
            ));
        }

        let returned = self
            .repository
            .borrows_mark_returned(&mut tx, borrow.id, today)
            .await?;
        self.repository.books_restore_copy(&mut tx, borrow.book_id).await?;

        let late = days_late(borrow.due_date, today);
        if late > 0 {
            let total = self
                .repository
                .profiles_add_penalty(&mut tx, user_id, late)
                .await?;
            tracing::info!(user_id, borrow_id, days_late = late, penalty_points = total, "Late return penalized");
        }

        tx.commit().await?;

        tracing::info!(borrow_id, user_id, book_id = borrow.book_id, "Book returned");
        Ok(ReturnOutcome {
            borrow_id: returned.id,
            return_date: today,
            days_late: late,
        })
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn check_borrow_limit(active: i64, max_active: i64) -> AppResult<()> {
    if active >= max_active {
        return Err(AppError::LimitExceeded(format!(
            "You have reached your borrowing limit ({} books).",
            max_active
        )));
    }
    Ok(())
}

fn check_available(stock: &BookStock) -> AppResult<()> {
    if stock.available_copies <= 0 {
        return Err(AppError::Unavailable(
            "No available copies for this book.".to_string(),
        ));
    }
    Ok(())
}
