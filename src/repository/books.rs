//! Book domain methods on Repository

use sqlx::{FromRow, PgConnection};

use super::Repository;
use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookFields, BookQuery},
};

/// Book columns joined with author and category names
const BOOK_SELECT: &str = r#"
    SELECT b.id, b.title, b.description,
           b.author_id AS author, a.name AS author_name,
           b.category_id AS category, c.name AS category_name,
           b.total_copies, b.available_copies
    FROM books b
    JOIN authors a ON a.id = b.author_id
    JOIN categories c ON c.id = b.category_id
"#;

/// Copy counters of a locked book row
#[derive(Debug, Clone, FromRow)]
pub struct BookStock {
    pub id: i32,
    pub total_copies: i32,
    pub available_copies: i32,
}

/// Which books a cascading delete applies to
#[derive(Debug, Clone, Copy)]
pub enum BookScope {
    Book(i32),
    Author(i32),
    Category(i32),
}

impl BookScope {
    fn condition(&self) -> (&'static str, i32) {
        match *self {
            BookScope::Book(id) => ("id = $1", id),
            BookScope::Author(id) => ("author_id = $1", id),
            BookScope::Category(id) => ("category_id = $1", id),
        }
    }
}

/// Rows removed by a cascading delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeSummary {
    pub books: u64,
    pub borrows: u64,
}

impl Repository {
    /// List books, optionally filtered by author and/or category
    pub async fn books_list(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let sql = format!(
            "{} WHERE ($1::int IS NULL OR b.author_id = $1) AND ($2::int IS NULL OR b.category_id = $2) ORDER BY b.id",
            BOOK_SELECT
        );
        let rows = sqlx::query_as::<_, Book>(&sql)
            .bind(query.author)
            .bind(query.category)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Get book by ID
    pub async fn books_get_by_id(&self, id: i32) -> AppResult<Book> {
        let mut conn = self.pool.acquire().await?;
        self.books_get_in(&mut conn, id).await
    }

    /// Get book by ID on the given connection (sees uncommitted changes of its transaction)
    pub async fn books_get_in(&self, conn: &mut PgConnection, id: i32) -> AppResult<Book> {
        let sql = format!("{} WHERE b.id = $1", BOOK_SELECT);
        sqlx::query_as::<_, Book>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
    }

    /// Create book
    pub async fn books_create(&self, data: &BookFields) -> AppResult<Book> {
        let mut tx = self.begin().await?;
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO books (title, description, author_id, category_id, total_copies, available_copies)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.author_id)
        .bind(data.category_id)
        .bind(data.total_copies)
        .bind(data.available_copies)
        .fetch_one(&mut *tx)
        .await?;

        let book = self.books_get_in(&mut tx, id).await?;
        tx.commit().await?;
        Ok(book)
    }

    /// Replace all book fields
    pub async fn books_update(&self, id: i32, data: &BookFields) -> AppResult<Book> {
        let mut tx = self.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE books
            SET title = $1, description = $2, author_id = $3, category_id = $4,
                total_copies = $5, available_copies = $6
            WHERE id = $7
            "#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.author_id)
        .bind(data.category_id)
        .bind(data.total_copies)
        .bind(data.available_copies)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book {} not found", id)));
        }

        let book = self.books_get_in(&mut tx, id).await?;
        tx.commit().await?;
        Ok(book)
    }

    /// Lock a book row and read its copy counters
    pub async fn books_lock(&self, conn: &mut PgConnection, id: i32) -> AppResult<Option<BookStock>> {
        let stock = sqlx::query_as::<_, BookStock>(
            "SELECT id, total_copies, available_copies FROM books WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(stock)
    }

    /// Take one copy off the shelf
    pub async fn books_take_copy(&self, conn: &mut PgConnection, id: i32) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE books SET available_copies = available_copies - 1 WHERE id = $1 AND available_copies > 0",
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::Unavailable("No available copies for this book.".to_string()));
        }
        Ok(())
    }

    /// Put one copy back; never above total_copies
    pub async fn books_restore_copy(&self, conn: &mut PgConnection, id: i32) -> AppResult<()> {
        sqlx::query(
            "UPDATE books SET available_copies = LEAST(available_copies + 1, total_copies) WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Delete the books in scope together with all their borrows
    ///
    /// The book rows are locked first: a borrow or return in flight on one of
    /// them finishes before its borrows are deleted, and later ones no longer
    /// find the book.
    pub async fn books_delete_cascade(
        &self,
        conn: &mut PgConnection,
        scope: BookScope,
    ) -> AppResult<CascadeSummary> {
        let (condition, id) = scope.condition();

        sqlx::query_scalar::<_, i32>(&format!(
            "SELECT id FROM books WHERE {} ORDER BY id FOR UPDATE",
            condition
        ))
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let borrows = sqlx::query(&format!(
            "DELETE FROM borrows WHERE book_id IN (SELECT id FROM books WHERE {})",
            condition
        ))
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        let books = sqlx::query(&format!("DELETE FROM books WHERE {}", condition))
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        Ok(CascadeSummary { books, borrows })
    }
}
