/// Organization endpoints
///
/// All endpoints require a bearer token. Reading needs an active membership;
/// updating and adding members needs an active admin membership.
///
/// # Endpoints
///
/// - `POST /v1/organizations` - Create (caller becomes admin)
/// - `GET /v1/organizations` - Organizations the caller belongs to
/// - `GET /v1/organizations/:org_id` - Fetch one
/// - `PATCH /v1/organizations/:org_id` - Update name or description
/// - `GET /v1/organizations/:org_id/users` - Members split into admins and users
/// - `POST /v1/organizations/:org_id/users` - Add a member by email

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use orgdesk_shared::{
    auth::middleware::AuthUser,
    models::{
        organization::{CreateOrganization, Organization, UpdateOrganization},
        user::User,
    },
    services::{AddOrganizationUser, MemberList, OrganizationList},
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

/// Organization update request
///
/// Omitted or empty fields keep their stored value; a request that changes
/// nothing is rejected with 400.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrganizationRequest {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Create an organization
///
/// # Endpoint
///
/// ```text
/// POST /v1/organizations
/// Authorization: Bearer <token>
///
/// { "name": "Acme", "description": "Widgets" }
/// ```
pub async fn create_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateOrganizationRequest>,
) -> ApiResult<(StatusCode, Json<Organization>)> {
    req.validate()?;

    let organization = state
        .organizations
        .create(
            auth.user_id,
            CreateOrganization {
                name: req.name,
                description: req.description,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(organization)))
}

pub async fn list_organizations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<OrganizationList>> {
    Ok(Json(state.organizations.find_all(auth.user_id).await?))
}

/// Fetch one organization
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an active member
/// - `404 Not Found`: No such organization
pub async fn get_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(org_id): Path<i64>,
) -> ApiResult<Json<Organization>> {
    Ok(Json(state.organizations.find_one(auth.user_id, org_id).await?))
}

/// Update an organization
///
/// # Errors
///
/// - `400 Bad Request`: Nothing to update
/// - `403 Forbidden`: Caller is not an active admin
pub async fn update_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(org_id): Path<i64>,
    Json(req): Json<UpdateOrganizationRequest>,
) -> ApiResult<Json<Organization>> {
    req.validate()?;

    let organization = state
        .organizations
        .update(
            auth.user_id,
            org_id,
            UpdateOrganization {
                name: req.name,
                description: req.description,
            },
        )
        .await?;

    Ok(Json(organization))
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(org_id): Path<i64>,
) -> ApiResult<Json<MemberList>> {
    Ok(Json(state.organization_users.find_all(auth.user_id, org_id).await?))
}

/// Add a member by email
///
/// Unknown emails get a placeholder account; deactivated members are
/// reactivated.
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an active admin
/// - `409 Conflict`: Already an active member
pub async fn add_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(org_id): Path<i64>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    req.validate()?;

    let user = state
        .organization_users
        .add(auth.user_id, org_id, AddOrganizationUser { email: req.email })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}
