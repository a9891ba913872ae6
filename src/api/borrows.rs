//! Borrow and return endpoints

use axum::{extract::State, http::StatusCode, Json};
use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::borrow::{BorrowDetails, BorrowRequest, ReturnRequest},
    AppState,
};

use super::{AuthenticatedUser, JsonBody};

/// Return response
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    /// Status message
    pub message: String,
    /// Borrow ID
    pub borrow_id: i32,
    pub return_date: NaiveDate,
    /// Days past the due date (penalty points added)
    pub days_late: i32,
}

/// Borrow one copy of a book
#[utoipa::path(
    post,
    path = "/borrow",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Book borrowed", body = BorrowDetails),
        (status = 400, description = "Unknown book, borrowing limit reached or no copy available", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    JsonBody(request): JsonBody<BorrowRequest>,
) -> AppResult<(StatusCode, Json<BorrowDetails>)> {
    let borrow = state.services.borrows.borrow(claims.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(borrow)))
}

/// Active borrows of the current user
#[utoipa::path(
    get,
    path = "/borrow/active",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Borrows not yet returned", body = Vec<BorrowDetails>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn active_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowDetails>>> {
    let borrows = state.services.borrows.active_borrows(claims.user_id).await?;
    Ok(Json(borrows))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 400, description = "Invalid request or already returned", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "No such borrow for this user", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    JsonBody(request): JsonBody<ReturnRequest>,
) -> AppResult<Json<ReturnResponse>> {
    request.validate()?;
    let borrow_id = request
        .borrow_id
        .ok_or_else(|| AppError::field("borrow_id", "This field is required."))?;

    let outcome = state
        .services
        .borrows
        .return_borrow(claims.user_id, borrow_id)
        .await?;

    Ok(Json(ReturnResponse {
        message: "Book returned successfully.".to_string(),
        borrow_id: outcome.borrow_id,
        return_date: outcome.return_date,
        days_late: outcome.days_late,
    }))
}
