/// Business operations for users and organizations
///
/// Every mutating operation follows the same steps:
///
/// 1. Resolve the acting user's membership (organization-scoped operations)
/// 2. Check the permission; on deny return `InsufficientPermission` and write nothing
/// 3. Delegate to the repository
/// 4. Emit at most one domain event and log the mutation
/// 5. Return the record
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use orgdesk_shared::db::QueryExecutor;
/// use orgdesk_shared::events::{BroadcastEventSink, EventSink};
/// use orgdesk_shared::models::organization::CreateOrganization;
/// use orgdesk_shared::services::OrganizationService;
///
/// # async fn example(db: Arc<dyn QueryExecutor>) -> Result<(), Box<dyn std::error::Error>> {
/// let events: Arc<dyn EventSink> = Arc::new(BroadcastEventSink::new(64));
/// let orgs = OrganizationService::new(db, events);
///
/// let org = orgs
///     .create(42, CreateOrganization { name: "Acme".to_string(), description: None })
///     .await?;
/// # Ok(())
/// # }
/// ```

pub mod organization;
pub mod organization_user;
pub mod user;

pub use organization::{OrganizationList, OrganizationService};
pub use organization_user::{AddOrganizationUser, MemberList, OrganizationUserService};
pub use user::{UserService, UserView};

use crate::error::ServiceResult;
use crate::models::membership::{Membership, MembershipRepository};

/// The acting user's membership, treating a deactivated row as no membership
pub(crate) async fn active_membership(
    memberships: &MembershipRepository,
    org_id: i64,
    user_id: i64,
) -> ServiceResult<Option<Membership>> {
    Ok(memberships
        .find(org_id, user_id)
        .await?
        .filter(|membership| membership.is_active))
}
