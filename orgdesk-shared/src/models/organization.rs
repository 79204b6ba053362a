/// Organization model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE organization (
///     org_id BIGSERIAL PRIMARY KEY,
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     created_by BIGINT,
///     updated_by BIGINT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use orgdesk_shared::db::QueryExecutor;
/// use orgdesk_shared::models::organization::{CreateOrganization, OrganizationRepository};
///
/// # async fn example(db: Arc<dyn QueryExecutor>) -> Result<(), Box<dyn std::error::Error>> {
/// let orgs = OrganizationRepository::new(db);
///
/// let created = orgs
///     .create(
///         CreateOrganization {
///             name: "Acme".to_string(),
///             description: Some("Widgets".to_string()),
///         },
///         42,
///     )
///     .await?;
///
/// assert!(created.admin.is_admin);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::membership::Membership;
use crate::db::{build_update_query, DbError, PreparedStatement, QueryExecutor, UpdateFields, WhereClause};
use crate::error::ServiceResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub org_id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrganization {
    pub name: String,
    pub description: Option<String>,
}

/// Fields an admin may change; blank values are ignored
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrganization {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl UpdateOrganization {
    pub fn to_fields(&self) -> UpdateFields {
        UpdateFields::new()
            .set_some("name", self.name.clone())
            .set_some("description", self.description.clone())
    }
}

/// A new organization and its creator's admin membership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedOrganization {
    pub organization: Organization,
    pub admin: Membership,
}

// One row of the create-organization statement
#[derive(Deserialize)]
struct CreatedOrganizationRow {
    org_id: i64,
    name: String,
    description: Option<String>,
    org_user_id: i64,
    user_id: i64,
    is_admin: bool,
    is_active: bool,
}

impl From<CreatedOrganizationRow> for CreatedOrganization {
    fn from(row: CreatedOrganizationRow) -> Self {
        Self {
            organization: Organization {
                org_id: row.org_id,
                name: row.name,
                description: row.description,
            },
            admin: Membership {
                org_user_id: row.org_user_id,
                org_id: row.org_id,
                user_id: row.user_id,
                is_admin: row.is_admin,
                is_active: row.is_active,
            },
        }
    }
}

/// Data access for `organization`
#[derive(Clone)]
pub struct OrganizationRepository {
    db: Arc<dyn QueryExecutor>,
}

impl OrganizationRepository {
    pub fn new(db: Arc<dyn QueryExecutor>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, org_id: i64) -> ServiceResult<Option<Organization>> {
        let statement = PreparedStatement::new(
            "fetch-org",
            "SELECT org_id, name, description FROM organization WHERE org_id = $1",
        )
        .bind(org_id);

        Ok(self.db.query(&statement).await?.first()?)
    }

    /// Organizations where the user holds an active membership
    pub async fn list_for_user(&self, user_id: i64) -> ServiceResult<Vec<Organization>> {
        let statement = PreparedStatement::new(
            "retrieve-orgs-for-user",
            r#"
            SELECT org.org_id, org.name, org.description
            FROM organization org
            INNER JOIN organization_user_control ouc ON org.org_id = ouc.org_id
            WHERE ouc.user_id = $1 AND ouc.is_active = TRUE
            ORDER BY org.org_id
            "#,
        )
        .bind(user_id);

        Ok(self.db.query(&statement).await?.all()?)
    }

    /// Creates an organization with `user_id` as its first admin
    ///
    /// The organization and the membership are inserted by a single
    /// data-modifying CTE, so either both rows exist or neither does.
    pub async fn create(
        &self,
        data: CreateOrganization,
        user_id: i64,
    ) -> ServiceResult<CreatedOrganization> {
        let statement = PreparedStatement::new(
            "create-organization",
            r#"
            WITH new_org AS (
                INSERT INTO organization (name, description, created_by, updated_by)
                VALUES ($1, $2, $3, $3)
                RETURNING org_id, name, description
            ), admin AS (
                INSERT INTO organization_user_control
                    (org_id, user_id, is_admin, is_active, created_by, updated_by)
                SELECT org_id, $3, TRUE, TRUE, $3, $3 FROM new_org
                RETURNING org_user_id, org_id, user_id, is_admin, is_active
            )
            SELECT new_org.org_id, new_org.name, new_org.description,
                   admin.org_user_id, admin.user_id, admin.is_admin, admin.is_active
            FROM new_org
            INNER JOIN admin ON admin.org_id = new_org.org_id
            "#,
        )
        .bind(data.name)
        .bind(data.description)
        .bind(user_id);

        let row: CreatedOrganizationRow = self
            .db
            .query(&statement)
            .await?
            .first()?
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))?;

        Ok(row.into())
    }

    /// Partial update; `None` when the organization does not exist
    pub async fn update(
        &self,
        org_id: i64,
        data: UpdateOrganization,
        acting_user_id: i64,
    ) -> ServiceResult<Option<Organization>> {
        let statement = build_update_query(
            "organization",
            &data.to_fields(),
            &WhereClause::new().eq("org_id", org_id),
            acting_user_id,
            None,
        )?;

        Ok(self.db.query(&statement).await?.first()?)
    }
}
