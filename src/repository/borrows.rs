//! Borrow domain methods on Repository

use chrono::NaiveDate;
use sqlx::{PgConnection, Row};

use super::Repository;
use crate::{
    error::AppResult,
    models::{
        book::Book,
        borrow::{Borrow, BorrowDetails},
    },
};

impl Repository {
    /// Active borrows of a user, oldest first, with book details
    pub async fn borrows_active_for_user(&self, user_id: i32) -> AppResult<Vec<BorrowDetails>> {
        let rows = sqlx::query(
            r#"
            SELECT br.id, br.user_id, br.borrow_date, br.due_date, br.return_date,
                   b.id AS book_id, b.title, b.description,
                   b.author_id, a.name AS author_name,
                   b.category_id, c.name AS category_name,
                   b.total_copies, b.available_copies
            FROM borrows br
            JOIN books b ON b.id = br.book_id
            JOIN authors a ON a.id = b.author_id
            JOIN categories c ON c.id = b.category_id
            WHERE br.user_id = $1 AND br.return_date IS NULL
            ORDER BY br.borrow_date, br.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            result.push(BorrowDetails {
                id: row.get("id"),
                user: row.get("user_id"),
                book: Book {
                    id: row.get("book_id"),
                    title: row.get("title"),
                    description: row.get("description"),
                    author: row.get("author_id"),
                    author_name: row.get("author_name"),
                    category: row.get("category_id"),
                    category_name: row.get("category_name"),
                    total_copies: row.get("total_copies"),
                    available_copies: row.get("available_copies"),
                },
                borrow_date: row.get("borrow_date"),
                due_date: row.get("due_date"),
                return_date: row.get("return_date"),
            });
        }

        Ok(result)
    }

    /// Number of borrows of a user not yet returned
    pub async fn borrows_count_active(&self, conn: &mut PgConnection, user_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrows WHERE user_id = $1 AND return_date IS NULL",
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    /// Insert an active borrow
    pub async fn borrows_insert(
        &self,
        conn: &mut PgConnection,
        user_id: i32,
        book_id: i32,
        borrow_date: NaiveDate,
        due_date: NaiveDate,
    ) -> AppResult<Borrow> {
        let borrow = sqlx::query_as::<_, Borrow>(
            r#"
            INSERT INTO borrows (user_id, book_id, borrow_date, due_date)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(borrow_date)
        .bind(due_date)
        .fetch_one(&mut *conn)
        .await?;
        Ok(borrow)
    }

    /// Book of a borrow belonging to `user_id`, read without locking
    pub async fn borrows_book_for_user(
        &self,
        conn: &mut PgConnection,
        id: i32,
        user_id: i32,
    ) -> AppResult<Option<i32>> {
        let book_id = sqlx::query_scalar::<_, i32>(
            "SELECT book_id FROM borrows WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(book_id)
    }

    /// Lock a borrow belonging to `user_id`; other users' borrows are invisible
    pub async fn borrows_lock_for_user(
        &self,
        conn: &mut PgConnection,
        id: i32,
        user_id: i32,
    ) -> AppResult<Option<Borrow>> {
        let borrow = sqlx::query_as::<_, Borrow>(
            "SELECT * FROM borrows WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(borrow)
    }

    /// Close a borrow
    pub async fn borrows_mark_returned(
        &self,
        conn: &mut PgConnection,
        id: i32,
        return_date: NaiveDate,
    ) -> AppResult<Borrow> {
        let borrow = sqlx::query_as::<_, Borrow>(
            "UPDATE borrows SET return_date = $1 WHERE id = $2 AND return_date IS NULL RETURNING *",
        )
        .bind(return_date)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(borrow)
    }
}
