/// Organization operations
///
/// Any authenticated user may create an organization and becomes its first
/// admin. Reading requires membership, updating requires admin.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::active_membership;
use crate::auth::authorization::{require_permission, Action};
use crate::db::QueryExecutor;
use crate::error::{ServiceError, ServiceResult};
use crate::events::{DomainEvent, EventSink};
use crate::models::membership::MembershipRepository;
use crate::models::organization::{
    CreateOrganization, Organization, OrganizationRepository, UpdateOrganization,
};

/// Organizations the caller belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationList {
    pub organizations: Vec<Organization>,
}

#[derive(Clone)]
pub struct OrganizationService {
    orgs: OrganizationRepository,
    memberships: MembershipRepository,
    events: Arc<dyn EventSink>,
}

impl OrganizationService {
    pub fn new(db: Arc<dyn QueryExecutor>, events: Arc<dyn EventSink>) -> Self {
        Self {
            orgs: OrganizationRepository::new(db.clone()),
            memberships: MembershipRepository::new(db),
            events,
        }
    }

    /// Creates an organization with the actor as admin
    pub async fn create(&self, actor_id: i64, data: CreateOrganization) -> ServiceResult<Organization> {
        let created = self.orgs.create(data, actor_id).await?;
        let org_id = created.organization.org_id;

        self.events.emit(DomainEvent::OrganizationCreated {
            org_id,
            user_id: actor_id,
        });
        info!(
            org_id,
            user_id = actor_id,
            org_user_id = created.admin.org_user_id,
            "Organization created"
        );

        Ok(created.organization)
    }

    pub async fn find_all(&self, actor_id: i64) -> ServiceResult<OrganizationList> {
        let organizations = self.orgs.list_for_user(actor_id).await?;
        Ok(OrganizationList { organizations })
    }

    pub async fn find_one(&self, actor_id: i64, org_id: i64) -> ServiceResult<Organization> {
        let membership = active_membership(&self.memberships, org_id, actor_id).await?;
        require_permission(
            Action::Read,
            membership.as_ref(),
            Some("Error - insufficient permissions to access this organization."),
        )?;

        self.orgs
            .find_by_id(org_id)
            .await?
            .ok_or_else(ServiceError::resource_not_found)
    }

    /// Applies a partial update; admins only
    ///
    /// # Errors
    ///
    /// - `InsufficientPermission` unless the actor is an active admin
    /// - `ParametersRequired` when no field carries a value
    /// - `ResourceNotFound` when the organization vanished
    pub async fn update(
        &self,
        actor_id: i64,
        org_id: i64,
        data: UpdateOrganization,
    ) -> ServiceResult<Organization> {
        let membership = active_membership(&self.memberships, org_id, actor_id).await?;
        require_permission(Action::Update, membership.as_ref(), None)?;

        let organization = self
            .orgs
            .update(org_id, data, actor_id)
            .await?
            .ok_or_else(ServiceError::resource_not_found)?;

        self.events.emit(DomainEvent::OrganizationUpdated {
            org_id,
            user_id: actor_id,
        });
        info!(org_id, user_id = actor_id, "Organization updated");

        Ok(organization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockExecutor, RecordingEventSink};
    use serde_json::json;

    fn service() -> (OrganizationService, Arc<MockExecutor>, Arc<RecordingEventSink>) {
        let db = MockExecutor::new();
        let events = RecordingEventSink::new();
        (OrganizationService::new(db.clone(), events.clone()), db, events)
    }

    fn membership_row(org_id: i64, user_id: i64, is_admin: bool, is_active: bool) -> serde_json::Value {
        json!({
            "org_user_id": 1,
            "org_id": org_id,
            "user_id": user_id,
            "is_admin": is_admin,
            "is_active": is_active
        })
    }

    #[tokio::test]
    async fn test_create_makes_creator_admin_and_emits_created() {
        let (svc, db, events) = service();
        db.respond(
            "create-organization",
            vec![json!({
                "org_id": 11,
                "name": "Acme",
                "description": "desc",
                "org_user_id": 3,
                "user_id": 42,
                "is_admin": true,
                "is_active": true
            })],
        );

        let org = svc
            .create(
                42,
                CreateOrganization {
                    name: "Acme".to_string(),
                    description: Some("desc".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(org.org_id, 11);
        let stmt = db.last_statement("create-organization").unwrap();
        assert!(stmt.text.contains("organization_user_control"));
        assert!(stmt.text.contains("TRUE, TRUE"));
        assert_eq!(stmt.values, vec![json!("Acme"), json!("desc"), json!(42)]);
        assert_eq!(
            events.events(),
            vec![DomainEvent::OrganizationCreated { org_id: 11, user_id: 42 }]
        );
    }

    #[tokio::test]
    async fn test_find_one_requires_membership() {
        let (svc, db, _events) = service();

        let err = svc.find_one(5, 11).await.unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientPermission(_)));
        assert!(db.last_statement("fetch-org").is_none());

        let stmt = db.last_statement("fetch-org-user").unwrap();
        assert_eq!(stmt.values, vec![json!(11), json!(5)]);
    }

    #[tokio::test]
    async fn test_find_one_returns_organization() {
        let (svc, db, _events) = service();
        db.respond("fetch-org-user", vec![membership_row(11, 5, false, true)]);
        db.respond(
            "fetch-org",
            vec![json!({"org_id": 11, "name": "Acme", "description": null})],
        );

        let org = svc.find_one(5, 11).await.unwrap();
        assert_eq!(org.name, "Acme");
    }

    #[tokio::test]
    async fn test_find_one_missing_org_is_not_found() {
        let (svc, db, _events) = service();
        db.respond("fetch-org-user", vec![membership_row(11, 5, true, true)]);

        let err = svc.find_one(5, 11).await.unwrap_err();
        assert!(matches!(err, ServiceError::ResourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_inactive_member_is_denied() {
        let (svc, db, _events) = service();
        db.respond("fetch-org-user", vec![membership_row(11, 5, true, false)]);

        let err = svc.find_one(5, 11).await.unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientPermission(_)));
    }

    #[tokio::test]
    async fn test_member_cannot_update() {
        let (svc, db, events) = service();
        db.respond("fetch-org-user", vec![membership_row(11, 5, false, true)]);

        let err = svc
            .update(
                5,
                11,
                UpdateOrganization {
                    name: Some("New".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InsufficientPermission(_)));
        assert!(db.last_statement("update-organization").is_none());
        assert!(events.events().is_empty());
    }

    #[tokio::test]
    async fn test_admin_update_emits_updated() {
        let (svc, db, events) = service();
        db.respond("fetch-org-user", vec![membership_row(11, 5, true, true)]);
        db.respond(
            "update-organization",
            vec![json!({"org_id": 11, "name": "New", "description": null})],
        );

        let org = svc
            .update(
                5,
                11,
                UpdateOrganization {
                    name: Some("New".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(org.name, "New");
        assert_eq!(
            events.events(),
            vec![DomainEvent::OrganizationUpdated { org_id: 11, user_id: 5 }]
        );
    }

    #[tokio::test]
    async fn test_admin_update_with_empty_payload() {
        let (svc, db, events) = service();
        db.respond("fetch-org-user", vec![membership_row(11, 5, true, true)]);

        let err = svc.update(5, 11, UpdateOrganization::default()).await.unwrap_err();

        assert!(matches!(err, ServiceError::ParametersRequired(_)));
        assert!(events.events().is_empty());
    }

    #[tokio::test]
    async fn test_find_all_wraps_list() {
        let (svc, db, _events) = service();
        db.respond(
            "retrieve-orgs-for-user",
            vec![
                json!({"org_id": 1, "name": "A", "description": null}),
                json!({"org_id": 2, "name": "B", "description": "b"}),
            ],
        );

        let list = svc.find_all(5).await.unwrap();
        assert_eq!(list.organizations.len(), 2);
    }
}
