//! Book model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Book with its author and category names resolved
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub description: String,
    /// Author ID
    pub author: i32,
    pub author_name: String,
    /// Category ID
    pub category: i32,
    pub category_name: String,
    pub total_copies: i32,
    pub available_copies: i32,
}

/// Book list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Only books by this author ID
    pub author: Option<i32>,
    /// Only books in this category ID
    pub category: Option<i32>,
}

/// Create or replace book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BookInput {
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "Ensure this field has between 1 and 255 characters."))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub description: String,
    /// Author ID
    #[validate(required(message = "This field is required."))]
    pub author: Option<i32>,
    /// Category ID
    #[validate(required(message = "This field is required."))]
    pub category: Option<i32>,
    #[validate(
        required(message = "This field is required."),
        range(min = 0, message = "Ensure this value is greater than or equal to 0.")
    )]
    pub total_copies: Option<i32>,
    #[validate(
        required(message = "This field is required."),
        range(min = 0, message = "Ensure this value is greater than or equal to 0.")
    )]
    pub available_copies: Option<i32>,
}

/// Validated book fields ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookFields {
    pub title: String,
    pub description: String,
    pub author_id: i32,
    pub category_id: i32,
    pub total_copies: i32,
    pub available_copies: i32,
}

impl BookInput {
    /// Check field rules and the copy-count invariant
    pub fn into_fields(self) -> AppResult<BookFields> {
        self.validate()?;

        let missing = || AppError::Validation("Missing required book field".to_string());
        let fields = BookFields {
            title: self.title,
            description: self.description,
            author_id: self.author.ok_or_else(missing)?,
            category_id: self.category.ok_or_else(missing)?,
            total_copies: self.total_copies.ok_or_else(missing)?,
            available_copies: self.available_copies.ok_or_else(missing)?,
        };

        if fields.available_copies > fields.total_copies {
            return Err(AppError::field(
                "available_copies",
                "Available copies cannot exceed total copies.",
            ));
        }

        Ok(fields)
    }
}
