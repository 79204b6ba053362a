/// User endpoints
///
/// Registration and the availability checks are public; everything else needs
/// a bearer token, and mutations are limited to the caller's own account.
///
/// # Endpoints
///
/// - `POST /v1/users` - Register
/// - `GET /v1/users/check-email?email=` - Is the email free?
/// - `GET /v1/users/check-username?username=` - Is the username free?
/// - `GET /v1/users/:id` - Fetch a user
/// - `PATCH /v1/users/:id` - Update name and username
/// - `PATCH /v1/users/:id/email` - Change email
/// - `PATCH /v1/users/:id/notifications` - Notification preferences
/// - `PATCH /v1/users/:id/verify` - Mark the account verified

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use orgdesk_shared::{
    auth::middleware::AuthUser,
    models::user::{
        CreateUser, NotificationSettings, UpdateEmail, UpdateNotifications, UpdateUser, User,
    },
    services::UserView,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 3, max = 32, message = "Username must be 3-32 characters"))]
    pub username: Option<String>,

    #[validate(length(max = 100, message = "First name must be at most 100 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: Option<String>,
}

/// Profile update request
///
/// Omitted or empty fields keep their stored value.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 100, message = "First name must be at most 100 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: Option<String>,

    #[validate(custom(function = "validate_profile_username"))]
    pub username: Option<String>,
}

/// Empty means "keep the current username"; anything else must be 3-32 characters
fn validate_profile_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    if len == 0 || (3..=32).contains(&len) {
        return Ok(());
    }

    let mut error = ValidationError::new("length");
    error.message = Some(Cow::from("Username must be 3-32 characters"));
    Err(error)
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNotificationsRequest {
    pub send_emails: bool,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: String,
}

/// Availability check response
#[derive(Debug, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /v1/users
/// Content-Type: application/json
///
/// {
///   "email": "ada@example.com",
///   "username": "ada",
///   "first_name": "Ada",
///   "last_name": "Lovelace"
/// }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Email or username already taken
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    req.validate()?;

    let user = state
        .users
        .create(CreateUser {
            email: req.email,
            username: req.username,
            first_name: req.first_name,
            last_name: req.last_name,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn check_email(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> ApiResult<Json<AvailabilityResponse>> {
    let available = state.users.check_email_available(&query.email).await?;
    Ok(Json(AvailabilityResponse { available }))
}

pub async fn check_username(
    State(state): State<AppState>,
    Query(query): Query<UsernameQuery>,
) -> ApiResult<Json<AvailabilityResponse>> {
    let available = state.users.check_username_available(&query.username).await?;
    Ok(Json(AvailabilityResponse { available }))
}

/// Fetch a user by id
///
/// Any authenticated caller may look up any user. Callers other than the
/// owner get only `user_id`, `username` and `email`.
pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<UserView>> {
    Ok(Json(state.users.find_one(auth.user_id, user_id).await?))
}

/// Update the caller's name or username
///
/// # Errors
///
/// - `400 Bad Request`: Nothing to update
/// - `403 Forbidden`: Not the caller's own account
/// - `409 Conflict`: Username taken
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    req.validate()?;

    let user = state
        .users
        .update_profile(
            auth.user_id,
            user_id,
            UpdateUser {
                first_name: req.first_name,
                last_name: req.last_name,
                username: req.username,
            },
        )
        .await?;

    Ok(Json(user))
}

pub async fn update_email(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateEmailRequest>,
) -> ApiResult<Json<User>> {
    req.validate()?;

    let user = state
        .users
        .update_email(auth.user_id, user_id, UpdateEmail { email: req.email })
        .await?;

    Ok(Json(user))
}

pub async fn update_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateNotificationsRequest>,
) -> ApiResult<Json<NotificationSettings>> {
    let settings = state
        .users
        .update_notifications(
            auth.user_id,
            user_id,
            UpdateNotifications {
                send_emails: req.send_emails,
            },
        )
        .await?;

    Ok(Json(settings))
}

pub async fn verify(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.verify(auth.user_id, user_id).await?))
}
