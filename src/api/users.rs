//! Penalty profile endpoints

use axum::{extract::State, Json};

use crate::{error::AppResult, models::user::UserProfile, AppState};

use super::{AuthenticatedUser, PathParam};

/// Penalty points of a user
#[utoipa::path(
    get,
    path = "/users/{id}/penalties",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Penalty profile", body = UserProfile),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Neither the user nor staff", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_penalties(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    PathParam(user_id): PathParam<i32>,
) -> AppResult<Json<UserProfile>> {
    let profile = state.services.users.get_penalties(&claims, user_id).await?;
    Ok(Json(profile))
}

/// Clear the penalty points of a user
#[utoipa::path(
    post,
    path = "/users/{id}/penalties/reset",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Penalty profile after reset", body = UserProfile),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Staff only", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn reset_penalties(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    PathParam(user_id): PathParam<i32>,
) -> AppResult<Json<UserProfile>> {
    claims.require_staff("Only admins can reset penalties.")?;

    let profile = state.services.users.reset_penalties(user_id).await?;
    Ok(Json(profile))
}
