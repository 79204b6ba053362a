/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`jwt`]: Identity-provider token validation
/// - [`jwks`]: Signing-key retrieval with caching and refresh limits
/// - [`middleware`]: Axum bearer-token middleware resolving callers to users
/// - [`authorization`]: Organization permission checks
///
/// # Example
///
/// ```
/// use orgdesk_shared::auth::authorization::{check_permission, Action};
///
/// // Without a membership nothing is allowed
/// assert!(!check_permission(Action::Read, None));
/// ```

pub mod authorization;
pub mod jwks;
pub mod jwt;
pub mod middleware;
