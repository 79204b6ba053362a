/// User model and database operations
///
/// Users are identified by a numeric id. The identity provider only knows their
/// email, so most lookups from the outside world start there.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     user_id BIGSERIAL PRIMARY KEY,
///     username VARCHAR(64) UNIQUE,
///     first_name VARCHAR(128),
///     last_name VARCHAR(128),
///     email VARCHAR(255) NOT NULL UNIQUE,
///     is_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     created_by BIGINT,
///     updated_by BIGINT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE user_notification_settings (
///     user_id BIGINT PRIMARY KEY REFERENCES users(user_id) ON DELETE CASCADE,
///     send_emails BOOLEAN NOT NULL DEFAULT TRUE,
///     updated_by BIGINT
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use orgdesk_shared::db::QueryExecutor;
/// use orgdesk_shared::models::user::{UpdateUser, UserRepository};
///
/// # async fn example(db: Arc<dyn QueryExecutor>) -> Result<(), Box<dyn std::error::Error>> {
/// let users = UserRepository::new(db);
///
/// if users.is_email_available("jane@example.com").await? {
///     println!("email is free");
/// }
///
/// let updated = users
///     .update_info(7, UpdateUser {
///         last_name: Some("Doe".to_string()),
///         ..Default::default()
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::{build_update_query, DbError, PreparedStatement, QueryExecutor, UpdateFields, WhereClause};
use crate::error::{ServiceError, ServiceResult};

const USER_COLUMNS: &str = "user_id, username, first_name, last_name, email, is_verified";

const PUBLIC_USER_COLUMNS: &str = "user_id, username, email";

/// A user account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,

    /// Login handle; stored lowercase
    pub username: Option<String>,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    /// Matched case-insensitively
    pub email: String,

    #[serde(default)]
    pub is_verified: bool,
}

/// What other users may see of an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub user_id: i64,
    pub username: Option<String>,
    pub email: String,
}

/// Per-user notification preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub user_id: i64,
    pub send_emails: bool,
}

/// Input for creating a user
///
/// Only the email is required; users added to an organization by email get
/// the rest filled in when they sign up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Profile fields a user may change
///
/// `None` and empty strings leave the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl UpdateUser {
    pub fn to_fields(&self) -> UpdateFields {
        UpdateFields::new()
            .set_some("first_name", self.first_name.clone())
            .set_some("last_name", self.last_name.clone())
            .set_some("username", self.username.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEmail {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNotifications {
    pub send_emails: bool,
}

/// Data access for `users` and `user_notification_settings`
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<dyn QueryExecutor>,
}

impl UserRepository {
    pub fn new(db: Arc<dyn QueryExecutor>) -> Self {
        Self { db }
    }

    /// Inserts a user together with default notification settings
    ///
    /// Both rows are written by one statement, so a user never exists
    /// without settings.
    pub async fn create(&self, data: CreateUser) -> ServiceResult<User> {
        let statement = PreparedStatement::new(
            "create-user",
            format!(
                r#"
                WITH new_user AS (
                    INSERT INTO users (first_name, last_name, email, username)
                    VALUES ($1, $2, $3, $4)
                    RETURNING {cols}
                ), settings AS (
                    INSERT INTO user_notification_settings (user_id, send_emails)
                    SELECT user_id, TRUE FROM new_user
                )
                SELECT {cols} FROM new_user
                "#,
                cols = USER_COLUMNS
            ),
        )
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.email)
        .bind(data.username);

        let user = self
            .db
            .query(&statement)
            .await?
            .first()?
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))?;

        Ok(user)
    }

    /// Loads a user by id
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` when no such user exists.
    pub async fn find_by_id(&self, user_id: i64) -> ServiceResult<User> {
        let statement = PreparedStatement::new(
            "find-user-by-id",
            format!("SELECT {} FROM users WHERE user_id = $1", USER_COLUMNS),
        )
        .bind(user_id);

        self.db.query(&statement).await?.first()?.ok_or_else(|| {
            ServiceError::ResourceNotFound(format!("Unable to find a user with ID of {}", user_id))
        })
    }

    /// Loads the id, username and email of a user
    pub async fn find_public_by_id(&self, user_id: i64) -> ServiceResult<PublicUser> {
        let statement = PreparedStatement::new(
            "find-one-user",
            format!("SELECT {} FROM users WHERE user_id = $1", PUBLIC_USER_COLUMNS),
        )
        .bind(user_id);

        self.db.query(&statement).await?.first()?.ok_or_else(|| {
            ServiceError::ResourceNotFound(format!("Unable to find a user with ID of {}", user_id))
        })
    }

    /// Case-insensitive lookup by email
    pub async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let statement = PreparedStatement::new(
            "find-user-by-email",
            format!(
                "SELECT {} FROM users WHERE lower(email) = lower($1) LIMIT 1",
                USER_COLUMNS
            ),
        )
        .bind(email);

        Ok(self.db.query(&statement).await?.first()?)
    }

    /// Resolves an email to a user id
    pub async fn find_id_by_email(&self, email: &str) -> ServiceResult<Option<i64>> {
        Ok(self.find_by_email(email).await?.map(|user| user.user_id))
    }

    /// Partial profile update; the user is recorded as the editor
    pub async fn update_info(&self, user_id: i64, data: UpdateUser) -> ServiceResult<User> {
        let statement = build_update_query(
            "users",
            &data.to_fields(),
            &WhereClause::new().eq("user_id", user_id),
            user_id,
            None,
        )?;

        self.db.query(&statement).await?.first()?.ok_or_else(|| {
            ServiceError::ResourceNotFound(format!(
                "Unable to find a user to update with ID of {}",
                user_id
            ))
        })
    }

    pub async fn update_email(&self, user_id: i64, data: UpdateEmail) -> ServiceResult<User> {
        let statement = build_update_query(
            "users",
            &UpdateFields::new().set("email", data.email),
            &WhereClause::new().eq("user_id", user_id),
            user_id,
            Some("email"),
        )?;

        self.db.query(&statement).await?.first()?.ok_or_else(|| {
            ServiceError::ResourceNotFound(format!(
                "Unable to find and update the email of user {}",
                user_id
            ))
        })
    }

    /// Stores notification preferences
    ///
    /// Uses a fixed statement rather than the update builder so that
    /// `send_emails = false` is written.
    pub async fn update_notifications(
        &self,
        user_id: i64,
        data: UpdateNotifications,
    ) -> ServiceResult<NotificationSettings> {
        let statement = PreparedStatement::new(
            "update-user_notification_settings",
            r#"
            UPDATE user_notification_settings
            SET send_emails = $1, updated_by = $2
            WHERE user_id = $3
            RETURNING user_id, send_emails
            "#,
        )
        .bind(data.send_emails)
        .bind(user_id)
        .bind(user_id);

        self.db.query(&statement).await?.first()?.ok_or_else(|| {
            ServiceError::ResourceNotFound(format!(
                "Unable to find and update notification settings for user with ID of {}",
                user_id
            ))
        })
    }

    pub async fn verify(&self, user_id: i64) -> ServiceResult<User> {
        let statement = PreparedStatement::new(
            "verify-user",
            format!(
                "UPDATE users SET is_verified = TRUE, updated_by = $1 WHERE user_id = $1 RETURNING {}",
                USER_COLUMNS
            ),
        )
        .bind(user_id);

        self.db.query(&statement).await?.first()?.ok_or_else(|| {
            ServiceError::ResourceNotFound(format!(
                "Unable to find and verify a user with ID of {}",
                user_id
            ))
        })
    }

    /// True when no user holds this email (case-insensitive)
    pub async fn is_email_available(&self, email: &str) -> ServiceResult<bool> {
        let statement = PreparedStatement::new(
            "check-email-taken",
            "SELECT user_id FROM users WHERE lower(email) = lower($1) LIMIT 1",
        )
        .bind(email);

        let taken = !self.db.query(&statement).await?.is_empty();
        debug!(taken, "Checked email availability");
        Ok(!taken)
    }

    /// True when no user other than `user_id` holds this email (case-insensitive)
    pub async fn is_email_available_for(&self, email: &str, user_id: i64) -> ServiceResult<bool> {
        let statement = PreparedStatement::new(
            "check-email-taken-by-other",
            "SELECT user_id FROM users WHERE lower(email) = lower($1) AND user_id <> $2 LIMIT 1",
        )
        .bind(email)
        .bind(user_id);

        let taken = !self.db.query(&statement).await?.is_empty();
        debug!(user_id, taken, "Checked email availability");
        Ok(!taken)
    }

    /// True when no user holds this username (case-insensitive)
    pub async fn is_username_available(&self, username: &str) -> ServiceResult<bool> {
        let statement = PreparedStatement::new(
            "check-username-taken",
            "SELECT user_id FROM users WHERE lower(username) = lower($1) LIMIT 1",
        )
        .bind(username);

        Ok(self.db.query(&statement).await?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockExecutor;
    use serde_json::json;

    fn user_row(id: i64, email: &str) -> serde_json::Value {
        json!({
            "user_id": id,
            "username": null,
            "first_name": null,
            "last_name": "Doe",
            "email": email,
            "is_verified": false
        })
    }

    #[tokio::test]
    async fn test_create_binds_in_column_order() {
        let db = MockExecutor::new();
        db.respond("create-user", vec![user_row(1, "jane@example.com")]);
        let repo = UserRepository::new(db.clone());

        let user = repo
            .create(CreateUser {
                email: "jane@example.com".to_string(),
                first_name: Some("Jane".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(user.user_id, 1);
        let stmt = db.last_statement("create-user").unwrap();
        assert!(stmt.text.contains("user_notification_settings"));
        assert_eq!(
            stmt.values,
            vec![json!("Jane"), json!(null), json!("jane@example.com"), json!(null)]
        );
    }

    #[tokio::test]
    async fn test_find_by_id_missing_is_not_found() {
        let db = MockExecutor::new();
        let repo = UserRepository::new(db.clone());

        let err = repo.find_by_id(99).await.unwrap_err();
        assert!(matches!(err, ServiceError::ResourceNotFound(ref m) if m.contains("99")));
    }

    #[tokio::test]
    async fn test_find_public_by_id_selects_only_public_columns() {
        let db = MockExecutor::new();
        db.respond(
            "find-one-user",
            vec![json!({"user_id": 3, "username": "jdoe", "email": "j@example.com"})],
        );
        let repo = UserRepository::new(db.clone());

        let user = repo.find_public_by_id(3).await.unwrap();

        assert_eq!(
            user,
            PublicUser {
                user_id: 3,
                username: Some("jdoe".to_string()),
                email: "j@example.com".to_string(),
            }
        );
        let stmt = db.last_statement("find-one-user").unwrap();
        assert_eq!(stmt.text, "SELECT user_id, username, email FROM users WHERE user_id = $1");
        assert_eq!(stmt.values, vec![json!(3)]);
    }

    #[tokio::test]
    async fn test_update_info_skips_empty_first_name() {
        let db = MockExecutor::new();
        db.respond("update-users", vec![user_row(7, "j@example.com")]);
        let repo = UserRepository::new(db.clone());

        repo.update_info(
            7,
            UpdateUser {
                first_name: Some(String::new()),
                last_name: Some("Doe".to_string()),
                username: None,
            },
        )
        .await
        .unwrap();

        let stmt = db.last_statement("update-users").unwrap();
        assert_eq!(
            stmt.text,
            "UPDATE users SET last_name = $1, updated_by = $2 WHERE user_id = $3 RETURNING *"
        );
        assert_eq!(stmt.values, vec![json!("Doe"), json!(7), json!(7)]);
    }

    #[tokio::test]
    async fn test_update_info_without_fields_is_rejected_before_querying() {
        let db = MockExecutor::new();
        let repo = UserRepository::new(db.clone());

        let err = repo.update_info(7, UpdateUser::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::ParametersRequired(_)));
        assert!(db.executed_names().is_empty());
    }

    #[tokio::test]
    async fn test_update_notifications_can_store_false() {
        let db = MockExecutor::new();
        db.respond(
            "update-user_notification_settings",
            vec![json!({"user_id": 3, "send_emails": false})],
        );
        let repo = UserRepository::new(db.clone());

        let settings = repo
            .update_notifications(3, UpdateNotifications { send_emails: false })
            .await
            .unwrap();

        assert!(!settings.send_emails);
        let stmt = db.last_statement("update-user_notification_settings").unwrap();
        assert_eq!(stmt.values, vec![json!(false), json!(3), json!(3)]);
    }

    #[tokio::test]
    async fn test_update_email_uses_suffixed_statement() {
        let db = MockExecutor::new();
        db.respond("update-users-email", vec![user_row(4, "new@example.com")]);
        let repo = UserRepository::new(db.clone());

        let user = repo
            .update_email(4, UpdateEmail { email: "new@example.com".to_string() })
            .await
            .unwrap();

        assert_eq!(user.email, "new@example.com");
        assert_eq!(db.executed_names(), vec!["update-users-email"]);
    }

    #[tokio::test]
    async fn test_availability_checks() {
        let db = MockExecutor::new();
        db.respond("check-email-taken", vec![json!({"user_id": 1})]);
        let repo = UserRepository::new(db.clone());

        assert!(!repo.is_email_available("Taken@Example.com").await.unwrap());
        assert!(repo.is_username_available("free_name").await.unwrap());

        let stmt = db.last_statement("check-email-taken").unwrap();
        assert!(!stmt.text.to_lowercase().contains("like"));
    }

    #[tokio::test]
    async fn test_email_availability_ignores_own_account() {
        let db = MockExecutor::new();
        let repo = UserRepository::new(db.clone());

        assert!(repo.is_email_available_for("JDoe@Example.com", 4).await.unwrap());

        let stmt = db.last_statement("check-email-taken-by-other").unwrap();
        assert!(stmt.text.contains("user_id <> $2"));
        assert_eq!(stmt.values, vec![json!("JDoe@Example.com"), json!(4)]);
    }

    #[tokio::test]
    async fn test_find_id_by_email() {
        let db = MockExecutor::new();
        db.respond("find-user-by-email", vec![user_row(12, "a@example.com")]);
        let repo = UserRepository::new(db.clone());

        assert_eq!(repo.find_id_by_email("A@example.com").await.unwrap(), Some(12));
        assert_eq!(repo.find_id_by_email("nobody@example.com").await.unwrap(), None);
    }
}
