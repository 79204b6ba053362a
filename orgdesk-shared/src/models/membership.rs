/// Membership model and database operations
///
/// A membership links a user to an organization. `is_admin` grants full
/// control; `is_active = false` marks a soft-removed member whose row is kept
/// so they can be re-added without a duplicate.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE organization_user_control (
///     org_user_id BIGSERIAL PRIMARY KEY,
///     org_id BIGINT NOT NULL REFERENCES organization(org_id) ON DELETE CASCADE,
///     user_id BIGINT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
///     is_admin BOOLEAN NOT NULL DEFAULT FALSE,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     created_by BIGINT,
///     updated_by BIGINT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (org_id, user_id)
/// );
/// ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::{build_update_query, DbError, PreparedStatement, QueryExecutor, UpdateFields, WhereClause};
use crate::error::ServiceResult;

const MEMBERSHIP_COLUMNS: &str = "org_user_id, org_id, user_id, is_admin, is_active";

/// A user's membership in an organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub org_user_id: i64,
    pub org_id: i64,
    pub user_id: i64,
    pub is_admin: bool,
    pub is_active: bool,
}

/// Member as shown in an organization's user list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSummary {
    pub user_id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
}

/// Data access for `organization_user_control`
#[derive(Clone)]
pub struct MembershipRepository {
    db: Arc<dyn QueryExecutor>,
}

impl MembershipRepository {
    pub fn new(db: Arc<dyn QueryExecutor>) -> Self {
        Self { db }
    }

    /// Finds the membership row for a user in an organization, active or not
    pub async fn find(&self, org_id: i64, user_id: i64) -> ServiceResult<Option<Membership>> {
        let statement = PreparedStatement::new(
            "fetch-org-user",
            format!(
                "SELECT {} FROM organization_user_control WHERE org_id = $1 AND user_id = $2",
                MEMBERSHIP_COLUMNS
            ),
        )
        .bind(org_id)
        .bind(user_id);

        Ok(self.db.query(&statement).await?.first()?)
    }

    /// Inserts an active membership
    pub async fn create(
        &self,
        org_id: i64,
        user_id: i64,
        is_admin: bool,
        acting_user_id: i64,
    ) -> ServiceResult<Membership> {
        let statement = PreparedStatement::new(
            "create-organization-user",
            format!(
                r#"
                INSERT INTO organization_user_control
                    (org_id, user_id, is_admin, is_active, created_by, updated_by)
                VALUES ($1, $2, $3, TRUE, $4, $4)
                RETURNING {}
                "#,
                MEMBERSHIP_COLUMNS
            ),
        )
        .bind(org_id)
        .bind(user_id)
        .bind(is_admin)
        .bind(acting_user_id);

        let membership = self
            .db
            .query(&statement)
            .await?
            .first()?
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))?;

        Ok(membership)
    }

    /// Flips a soft-removed membership back to active
    pub async fn reactivate(
        &self,
        org_id: i64,
        user_id: i64,
        acting_user_id: i64,
    ) -> ServiceResult<Option<Membership>> {
        let statement = build_update_query(
            "organization_user_control",
            &UpdateFields::new().set("is_active", true),
            &WhereClause::new().eq("org_id", org_id).eq("user_id", user_id),
            acting_user_id,
            Some("reactivate"),
        )?;

        Ok(self.db.query(&statement).await?.first()?)
    }

    /// Active members of an organization, admins first
    pub async fn list_members(&self, org_id: i64) -> ServiceResult<Vec<MemberSummary>> {
        let statement = PreparedStatement::new(
            "fetch-org-members",
            r#"
            SELECT u.user_id, u.email, u.first_name, u.last_name, ouc.is_admin
            FROM organization_user_control ouc
            INNER JOIN users u ON u.user_id = ouc.user_id
            WHERE ouc.org_id = $1 AND ouc.is_active = TRUE
            ORDER BY ouc.is_admin DESC, u.user_id
            "#,
        )
        .bind(org_id);

        Ok(self.db.query(&statement).await?.all()?)
    }
}
