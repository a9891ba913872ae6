//! User and penalty profile domain methods on Repository

use sqlx::PgConnection;

use super::Repository;
use crate::{
    error::{AppError, AppResult},
    models::user::{Role, User, UserProfileRow},
};

impl Repository {
    /// Get user by ID
    pub async fn users_get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by username (case-insensitive)
    pub async fn users_get_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(username) = LOWER($1)")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Check if a username is already taken
    pub async fn users_username_exists(&self, username: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Insert a user row
    pub async fn users_create(
        &self,
        conn: &mut PgConnection,
        username: &str,
        email: Option<&str>,
        password_hash: &str,
        role: Role,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&mut *conn)
        .await
    }

    /// Lock a user row for the rest of the transaction
    pub async fn users_lock(&self, conn: &mut PgConnection, id: i32) -> AppResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;
        Ok(())
    }

    /// Create the penalty profile of a user if it does not exist yet
    pub async fn profiles_ensure(&self, conn: &mut PgConnection, user_id: i32) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO user_profiles (user_id, penalty_points) VALUES ($1, 0) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Get the penalty profile of a user, creating an empty one when missing
    pub async fn profiles_get_or_create(&self, user_id: i32) -> AppResult<UserProfileRow> {
        let mut conn = self.pool.acquire().await?;
        self.profiles_ensure(&mut conn, user_id).await?;

        let profile = sqlx::query_as::<_, UserProfileRow>(
            "SELECT id, user_id, penalty_points FROM user_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(profile)
    }

    /// Add late-return days to a user's penalty points
    pub async fn profiles_add_penalty(
        &self,
        conn: &mut PgConnection,
        user_id: i32,
        points: i32,
    ) -> AppResult<i32> {
        let total: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO user_profiles (user_id, penalty_points)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET penalty_points = user_profiles.penalty_points + EXCLUDED.penalty_points
            RETURNING penalty_points
            "#,
        )
        .bind(user_id)
        .bind(points)
        .fetch_one(&mut *conn)
        .await?;
        Ok(total)
    }

    /// Reset a user's penalty points to zero
    pub async fn profiles_reset_penalty(&self, user_id: i32) -> AppResult<()> {
        sqlx::query("UPDATE user_profiles SET penalty_points = 0 WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
