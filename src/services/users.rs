//! Registration, authentication and penalty profile service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{RegisterRequest, Role, User, UserClaims, UserProfile, UserSummary},
    repository::{is_unique_violation, Repository},
};

const DUPLICATE_USERNAME: &str = "A user with that username already exists.";

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Register a member account and its empty penalty profile
    pub async fn register(&self, request: RegisterRequest) -> AppResult<User> {
        request.validate()?;
        if self.repository.users_username_exists(&request.username).await? {
            return Err(AppError::field("username", DUPLICATE_USERNAME));
        }

        let password = self.hash_password(&request.password)?;
        let user = self
            .create_account(&request.username, request.normalized_email(), &password, Role::Member)
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Create the configured staff account if it does not exist yet
    pub async fn ensure_bootstrap_staff(&self) -> AppResult<()> {
        let (Some(username), Some(password)) = (
            self.config.bootstrap_staff_username.as_deref(),
            self.config.bootstrap_staff_password.as_deref(),
        ) else {
            return Ok(());
        };

        if self.repository.users_username_exists(username).await? {
            return Ok(());
        }

        let hash = self.hash_password(password)?;
        let user = self.create_account(username, None, &hash, Role::Staff).await?;
        tracing::info!(user_id = user.id, username = %user.username, "Bootstrap staff account created");
        Ok(())
    }

    /// Insert user and profile in one transaction
    async fn create_account(
        &self,
        username: &str,
        email: Option<&str>,
        password_hash: &str,
        role: Role,
    ) -> AppResult<User> {
        let mut tx = self.repository.begin().await?;

        let user = self
            .repository
            .users_create(&mut tx, username, email, password_hash, role)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::field("username", DUPLICATE_USERNAME)
                } else {
                    AppError::Database(e)
                }
            })?;
        self.repository.profiles_ensure(&mut tx, user.id).await?;

        tx.commit().await?;
        Ok(user)
    }

    /// Authenticate by username and password, returning a signed token
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users_get_by_username(username)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

        if !self.verify_password(&user, password)? {
            return Err(AppError::Authentication("Invalid username or password".to_string()));
        }

        let claims = UserClaims::new(&user, self.config.jwt_expiration_hours);
        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok((token, user))
    }

    /// Token lifetime in seconds
    pub fn token_lifetime_secs(&self) -> u64 {
        self.config.jwt_expiration_hours * 3600
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users_get_by_id(id).await
    }

    /// Penalty profile of `user_id` as seen by `caller`
    pub async fn get_penalties(&self, caller: &UserClaims, user_id: i32) -> AppResult<UserProfile> {
        let user = self.repository.users_get_by_id(user_id).await?;
        caller.require_self_or_staff(user.id)?;
        self.profile_of(&user).await
    }

    /// Clear a user's penalty points
    pub async fn reset_penalties(&self, user_id: i32) -> AppResult<UserProfile> {
        let user = self.repository.users_get_by_id(user_id).await?;
        self.repository.profiles_get_or_create(user.id).await?;
        self.repository.profiles_reset_penalty(user.id).await?;
        tracing::info!(user_id = user.id, "Penalty points reset");
        self.profile_of(&user).await
    }

    async fn profile_of(&self, user: &User) -> AppResult<UserProfile> {
        let profile = self.repository.profiles_get_or_create(user.id).await?;
        Ok(UserProfile {
            id: profile.id,
            user: UserSummary::from(user),
            penalty_points: profile.penalty_points,
        })
    }

    /// Verify user password
    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}
