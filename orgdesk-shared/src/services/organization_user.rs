/// Organization membership operations
///
/// Members may list who belongs to an organization; only admins may add
/// users. Adding works by email: an unknown address creates a bare account
/// that is completed when its owner signs up.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::active_membership;
use crate::auth::authorization::{require_permission, Action};
use crate::db::QueryExecutor;
use crate::error::{ServiceError, ServiceResult};
use crate::events::{DomainEvent, EventSink};
use crate::models::membership::{MemberSummary, MembershipRepository};
use crate::models::user::{CreateUser, User, UserRepository};

/// Members of an organization split by role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberList {
    pub org_id: i64,
    pub admins: Vec<MemberSummary>,
    pub users: Vec<MemberSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddOrganizationUser {
    pub email: String,
}

#[derive(Clone)]
pub struct OrganizationUserService {
    users: UserRepository,
    memberships: MembershipRepository,
    events: Arc<dyn EventSink>,
}

impl OrganizationUserService {
    pub fn new(db: Arc<dyn QueryExecutor>, events: Arc<dyn EventSink>) -> Self {
        Self {
            users: UserRepository::new(db.clone()),
            memberships: MembershipRepository::new(db),
            events,
        }
    }

    pub async fn find_all(&self, actor_id: i64, org_id: i64) -> ServiceResult<MemberList> {
        let membership = active_membership(&self.memberships, org_id, actor_id).await?;
        require_permission(Action::Read, membership.as_ref(), None)?;

        let (admins, users): (Vec<MemberSummary>, Vec<MemberSummary>) = self
            .memberships
            .list_members(org_id)
            .await?
            .into_iter()
            .partition(|member| member.is_admin);

        Ok(MemberList {
            org_id,
            admins,
            users,
        })
    }

    /// Adds a user to the organization by email
    ///
    /// - active member already: `ActionNotAllowed`, nothing written
    /// - deactivated member: the existing row is reactivated
    /// - known user without membership: a member row is inserted
    /// - unknown email: a user is created, then a member row inserted
    pub async fn add(
        &self,
        actor_id: i64,
        org_id: i64,
        data: AddOrganizationUser,
    ) -> ServiceResult<User> {
        let membership = active_membership(&self.memberships, org_id, actor_id).await?;
        require_permission(
            Action::Manage,
            membership.as_ref(),
            Some("You have insufficient permissions to add users to this organization. You must be an admin."),
        )?;

        let Some(user) = self.users.find_by_email(&data.email).await? else {
            let user = self
                .users
                .create(CreateUser {
                    email: data.email,
                    ..Default::default()
                })
                .await?;
            self.memberships.create(org_id, user.user_id, false, actor_id).await?;

            self.events.emit(DomainEvent::OrganizationUserCreated {
                org_id,
                user_id: actor_id,
                created_user_id: user.user_id,
            });
            info!(
                org_id,
                user_id = actor_id,
                created_user_id = user.user_id,
                "New user created and added to organization"
            );

            return Ok(user);
        };

        match self.memberships.find(org_id, user.user_id).await? {
            Some(existing) if existing.is_active => {
                return Err(ServiceError::ActionNotAllowed(
                    "Unable to add this user as they are already a part of this organization."
                        .to_string(),
                ));
            }
            Some(_) => {
                self.memberships
                    .reactivate(org_id, user.user_id, actor_id)
                    .await?
                    .ok_or_else(ServiceError::resource_not_found)?;
            }
            None => {
                self.memberships.create(org_id, user.user_id, false, actor_id).await?;
            }
        }

        self.events.emit(DomainEvent::OrganizationUserAdded {
            org_id,
            user_id: actor_id,
            added_user_id: user.user_id,
        });
        info!(
            org_id,
            user_id = actor_id,
            added_user_id = user.user_id,
            "Existing user added to organization"
        );

        Ok(user)
    }
}
