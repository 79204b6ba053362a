/// User account operations
///
/// Registration is open; every other mutation is restricted to the account
/// owner.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::auth::authorization::require_ownership;
use crate::db::update_query::is_truthy;
use crate::db::QueryExecutor;
use crate::error::{ServiceError, ServiceResult};
use crate::events::{DomainEvent, EventSink};
use crate::models::user::{
    CreateUser, NotificationSettings, PublicUser, UpdateEmail, UpdateNotifications, UpdateUser,
    User, UserRepository,
};

/// A user as seen by the caller
///
/// Owners get their full record; everyone else gets the public columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UserView {
    Owner(User),
    Public(PublicUser),
}

#[derive(Clone)]
pub struct UserService {
    users: UserRepository,
    events: Arc<dyn EventSink>,
}

impl UserService {
    pub fn new(db: Arc<dyn QueryExecutor>, events: Arc<dyn EventSink>) -> Self {
        Self {
            users: UserRepository::new(db),
            events,
        }
    }

    /// Registers a user
    ///
    /// # Errors
    ///
    /// `ActionNotAllowed` when the email or username is already taken.
    pub async fn create(&self, mut data: CreateUser) -> ServiceResult<User> {
        if !self.users.is_email_available(&data.email).await? {
            return Err(ServiceError::ActionNotAllowed(
                "An account with this email already exists.".to_string(),
            ));
        }

        data.username = data.username.map(|u| u.to_lowercase());
        if let Some(username) = data.username.as_deref() {
            if !self.users.is_username_available(username).await? {
                return Err(ServiceError::ActionNotAllowed(
                    "This username is already taken.".to_string(),
                ));
            }
        }

        let user = self.users.create(data).await?;

        self.events.emit(DomainEvent::UserCreated { user_id: user.user_id });
        info!(user_id = user.user_id, "User created");

        Ok(user)
    }

    /// Loads a user for `actor_id`
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` when no such user exists.
    pub async fn find_one(&self, actor_id: i64, user_id: i64) -> ServiceResult<UserView> {
        if actor_id == user_id {
            Ok(UserView::Owner(self.users.find_by_id(user_id).await?))
        } else {
            Ok(UserView::Public(self.users.find_public_by_id(user_id).await?))
        }
    }

    /// Updates the caller's own profile; blank fields are left unchanged
    pub async fn update_profile(
        &self,
        actor_id: i64,
        user_id: i64,
        mut data: UpdateUser,
    ) -> ServiceResult<User> {
        require_ownership(actor_id, user_id)?;

        data.username = data.username.map(|u| u.to_lowercase());
        if let Some(username) = data.username.as_deref().filter(|u| !u.is_empty()) {
            let current = self.users.find_by_id(user_id).await?;
            if current.username.as_deref() != Some(username)
                && !self.users.is_username_available(username).await?
            {
                return Err(ServiceError::ActionNotAllowed(
                    "This username is already taken.".to_string(),
                ));
            }
        }

        let fields: Vec<String> = data
            .to_fields()
            .iter()
            .filter(|(_, value)| is_truthy(value))
            .map(|(column, _)| column.to_string())
            .collect();

        let user = self.users.update_info(user_id, data).await?;

        self.events.emit(DomainEvent::UserUpdated {
            user_id,
            fields: fields.clone(),
        });
        info!(user_id, ?fields, "User profile updated");

        Ok(user)
    }

    pub async fn update_email(
        &self,
        actor_id: i64,
        user_id: i64,
        data: UpdateEmail,
    ) -> ServiceResult<User> {
        require_ownership(actor_id, user_id)?;

        if !self.users.is_email_available_for(&data.email, user_id).await? {
            return Err(ServiceError::ActionNotAllowed(
                "This email is already in use.".to_string(),
            ));
        }

        let user = self.users.update_email(user_id, data).await?;

        self.events.emit(DomainEvent::UserEmailUpdated { user_id });
        info!(user_id, "User email updated");

        Ok(user)
    }

    pub async fn update_notifications(
        &self,
        actor_id: i64,
        user_id: i64,
        data: UpdateNotifications,
    ) -> ServiceResult<NotificationSettings> {
        require_ownership(actor_id, user_id)?;

        let settings = self.users.update_notifications(user_id, data).await?;

        self.events.emit(DomainEvent::UserNotificationsUpdated {
            user_id,
            send_emails: settings.send_emails,
        });
        info!(user_id, send_emails = settings.send_emails, "Notification settings updated");

        Ok(settings)
    }

    pub async fn verify(&self, actor_id: i64, user_id: i64) -> ServiceResult<User> {
        require_ownership(actor_id, user_id)?;

        let user = self.users.verify(user_id).await?;

        self.events.emit(DomainEvent::UserVerified { user_id });
        info!(user_id, "User verified");

        Ok(user)
    }

    pub async fn check_email_available(&self, email: &str) -> ServiceResult<bool> {
        self.users.is_email_available(email).await
    }

    pub async fn check_username_available(&self, username: &str) -> ServiceResult<bool> {
        self.users.is_username_available(username).await
    }
}
