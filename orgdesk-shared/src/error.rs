/// Service-level error taxonomy
///
/// Every service operation returns [`ServiceResult`]. The four named kinds are
/// user-facing and map one-to-one onto HTTP error responses in the API crate;
/// `Database` wraps anything that went wrong below the service layer.
///
/// # Example
///
/// ```
/// use orgdesk_shared::error::ServiceError;
///
/// let err = ServiceError::resource_not_found();
/// assert_eq!(err.to_string(), "This resource was not found.");
/// ```

use crate::db::DbError;

/// Service result type alias
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by the service layer
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Authorization denial (permission checker said no)
    #[error("{0}")]
    InsufficientPermission(String),

    /// Business-rule denial, e.g. re-adding an already active member
    #[error("{0}")]
    ActionNotAllowed(String),

    /// A required entity does not exist
    #[error("{0}")]
    ResourceNotFound(String),

    /// An update payload carried nothing to update
    #[error("{0}")]
    ParametersRequired(String),

    /// Failure in the data-access layer
    #[error("Database error: {0}")]
    Database(#[source] DbError),
}

impl ServiceError {
    pub fn insufficient_permission() -> Self {
        ServiceError::InsufficientPermission(
            "You have insufficient permissions to access this resource".to_string(),
        )
    }

    pub fn action_not_allowed() -> Self {
        ServiceError::ActionNotAllowed("This action is restricted and not allowed.".to_string())
    }

    pub fn resource_not_found() -> Self {
        ServiceError::ResourceNotFound("This resource was not found.".to_string())
    }

    pub fn parameters_required() -> Self {
        ServiceError::ParametersRequired(
            "Required parameters for this operation were not found.".to_string(),
        )
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ParametersRequired(msg) => ServiceError::ParametersRequired(msg),
            other => ServiceError::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_messages() {
        assert_eq!(
            ServiceError::insufficient_permission().to_string(),
            "You have insufficient permissions to access this resource"
        );
        assert_eq!(
            ServiceError::action_not_allowed().to_string(),
            "This action is restricted and not allowed."
        );
        assert_eq!(
            ServiceError::parameters_required().to_string(),
            "Required parameters for this operation were not found."
        );
    }

    #[test]
    fn test_parameters_required_keeps_its_kind() {
        let err: ServiceError = DbError::ParametersRequired("nothing to update".to_string()).into();
        assert!(matches!(err, ServiceError::ParametersRequired(ref m) if m == "nothing to update"));

        let err: ServiceError = DbError::InvalidIdentifier("bad name".to_string()).into();
        assert!(matches!(err, ServiceError::Database(_)));
    }
}
