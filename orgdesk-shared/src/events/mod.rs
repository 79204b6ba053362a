/// Domain events
///
/// Services emit one [`DomainEvent`] after each successful mutation. Emission
/// is fire-and-forget: the emitting service never waits for, or learns about,
/// delivery. Listeners subscribe through the sink (see [`sink`]).
///
/// # Wire format
///
/// Events serialize as `{"name": "<event name>", "payload": {...}}`:
///
/// ```
/// use orgdesk_shared::events::DomainEvent;
///
/// let event = DomainEvent::OrganizationCreated { org_id: 11, user_id: 42 };
/// assert_eq!(event.name(), "organization.created");
/// assert_eq!(
///     serde_json::to_string(&event).unwrap(),
///     r#"{"name":"organization.created","payload":{"org_id":11,"user_id":42}}"#
/// );
/// ```

pub mod sink;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use sink::{spawn_event_logger, BroadcastEventSink, EventSink};

/// Something that happened to a user or organization
///
/// Every payload carries the acting user's id and the ids of the affected
/// entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload")]
pub enum DomainEvent {
    #[serde(rename = "user.created")]
    UserCreated { user_id: i64 },

    /// `fields` lists the columns that were written
    #[serde(rename = "user.updated")]
    UserUpdated { user_id: i64, fields: Vec<String> },

    #[serde(rename = "user.email.updated")]
    UserEmailUpdated { user_id: i64 },

    #[serde(rename = "user.notifications.updated")]
    UserNotificationsUpdated { user_id: i64, send_emails: bool },

    #[serde(rename = "user.verified")]
    UserVerified { user_id: i64 },

    #[serde(rename = "organization.created")]
    OrganizationCreated { org_id: i64, user_id: i64 },

    #[serde(rename = "organization.updated")]
    OrganizationUpdated { org_id: i64, user_id: i64 },

    /// An existing user joined (or rejoined) the organization
    #[serde(rename = "organization.user.added")]
    OrganizationUserAdded {
        org_id: i64,
        user_id: i64,
        added_user_id: i64,
    },

    /// A user was created by email and joined the organization
    #[serde(rename = "organization.user.created")]
    OrganizationUserCreated {
        org_id: i64,
        user_id: i64,
        created_user_id: i64,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::UserCreated { .. } => "user.created",
            DomainEvent::UserUpdated { .. } => "user.updated",
            DomainEvent::UserEmailUpdated { .. } => "user.email.updated",
            DomainEvent::UserNotificationsUpdated { .. } => "user.notifications.updated",
            DomainEvent::UserVerified { .. } => "user.verified",
            DomainEvent::OrganizationCreated { .. } => "organization.created",
            DomainEvent::OrganizationUpdated { .. } => "organization.updated",
            DomainEvent::OrganizationUserAdded { .. } => "organization.user.added",
            DomainEvent::OrganizationUserCreated { .. } => "organization.user.created",
        }
    }

    /// Id of the user who caused the event
    pub fn actor_id(&self) -> i64 {
        match self {
            DomainEvent::UserCreated { user_id }
            | DomainEvent::UserUpdated { user_id, .. }
            | DomainEvent::UserEmailUpdated { user_id }
            | DomainEvent::UserNotificationsUpdated { user_id, .. }
            | DomainEvent::UserVerified { user_id }
            | DomainEvent::OrganizationCreated { user_id, .. }
            | DomainEvent::OrganizationUpdated { user_id, .. }
            | DomainEvent::OrganizationUserAdded { user_id, .. }
            | DomainEvent::OrganizationUserCreated { user_id, .. } => *user_id,
        }
    }
}

/// An emitted event with its identity and timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: DomainEvent,
}

impl EventEnvelope {
    pub fn new(event: DomainEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            event,
        }
    }
}
