/// Authorization helpers and permission checks
///
/// Orgdesk uses a two-level permission model scoped to an organization:
///
/// 1. **Membership**: the acting user must hold an active membership row
/// 2. **Admin flag**: admins may do anything; plain members may read and create
///
/// The checker itself is a pure function of `(action, membership)`. Resolving
/// the membership is the caller's job (see the services layer), which keeps the
/// policy trivially testable.
///
/// # Example
///
/// ```
/// use orgdesk_shared::auth::authorization::{check_permission, Action};
/// use orgdesk_shared::models::membership::Membership;
///
/// let member = Membership {
///     org_user_id: 1,
///     org_id: 7,
///     user_id: 42,
///     is_admin: false,
///     is_active: true,
/// };
///
/// assert!(check_permission(Action::Read, Some(&member)));
/// assert!(!check_permission(Action::Update, Some(&member)));
/// assert!(!check_permission(Action::Read, None));
/// ```

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ServiceError, ServiceResult};
use crate::models::membership::Membership;

/// Actions a user can attempt against an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    /// Membership administration (adding users)
    Manage,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Read,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Manage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Manage => "manage",
        }
    }
}

/// Decides whether a membership allows an action
///
/// - No membership: deny
/// - Admin membership: allow, whatever the action
/// - Member: `Read` and `Create` allowed, everything else denied
pub fn check_permission(action: Action, membership: Option<&Membership>) -> bool {
    let Some(membership) = membership else {
        return false;
    };

    if membership.is_admin {
        return true;
    }

    match action {
        Action::Read | Action::Create => true,
        Action::Update | Action::Delete | Action::Manage => false,
    }
}

/// Like [`check_permission`] but fails with `InsufficientPermission`
///
/// `denial_message` replaces the default message when given.
pub fn require_permission(
    action: Action,
    membership: Option<&Membership>,
    denial_message: Option<&str>,
) -> ServiceResult<()> {
    if check_permission(action, membership) {
        return Ok(());
    }

    warn!(
        action = action.as_str(),
        org_id = membership.map(|m| m.org_id),
        user_id = membership.map(|m| m.user_id),
        "Permission denied"
    );

    Err(match denial_message {
        Some(message) => ServiceError::InsufficientPermission(message.to_string()),
        None => ServiceError::insufficient_permission(),
    })
}

/// Checks that a user is acting on their own account
pub fn require_ownership(actor_id: i64, target_user_id: i64) -> ServiceResult<()> {
    if actor_id != target_user_id {
        warn!(actor_id, target_user_id, "Refused mutation of another user's account");
        return Err(ServiceError::insufficient_permission());
    }

    Ok(())
}
