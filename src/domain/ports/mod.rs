//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Outbound ports of the domain. Services only see these traits; concrete adapters (in-memory
// store, AMQP transport, contract generator) live in `outbounds` and are injected as
// `Arc<dyn Trait>`, so tests can swap any of them for a mock or an in-memory fake.
//--------------------------------------------------------------------------------------------------

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::models::{
    Agreement, AgreementId, AgreementStatus, NewAgreement, NewNotification, Notification,
    NotificationId, PostId, PostSummary, StatusUpdate, UserId,
};

/// +----------------------------------------------------------+
/// | STRUCTS | TRAITS | ENUMS | FUNCTIONS                     |
/// +----------+-------+-------+------------------------------+
/// | Traits:                                                  |
/// |   - AgreementStore                                       |
/// |   - NotificationStore                                    |
/// |   - MessageTransport                                     |
/// |   - DeliverySource                                       |
/// |   - ContractGenerator                                    |
/// | Structs:                                                 |
/// |   - Delivery, GeneratedContract, TransportError          |
/// | Enums:                                                   |
/// |   - StoreError, ContractError                            |
/// +----------------------------------------------------------+

/// Persistence of agreements and the post lookups they depend on.
#[async_trait]
pub trait AgreementStore: Send + Sync {
    /// Author and kind of a post, `None` if it does not exist.
    async fn get_post_summary(&self, post_id: PostId) -> Result<Option<PostSummary>, StoreError>;

    async fn get_agreement(&self, id: AgreementId) -> Result<Option<Agreement>, StoreError>;

    /// Inserts a pending agreement.
    ///
    /// # Returns
    /// The generated id and creation timestamp
    async fn insert_agreement(
        &self,
        agreement: NewAgreement,
    ) -> Result<(AgreementId, DateTime<Utc>), StoreError>;

    /// Conditional status write.
    ///
    /// # Returns
    /// * `Ok(true)` - the row was in `expected` and now carries `update`
    /// * `Ok(false)` - the row is missing or its status is no longer `expected`
    async fn update_agreement_status(
        &self,
        id: AgreementId,
        expected: AgreementStatus,
        update: StatusUpdate,
    ) -> Result<bool, StoreError>;

    async fn set_contract(
        &self,
        id: AgreementId,
        contract_url: String,
        contract_hash: Option<String>,
    ) -> Result<(), StoreError>;

    /// Agreements where the user is lender or borrower, newest first.
    async fn list_agreements_for_user(&self, user_id: UserId) -> Result<Vec<Agreement>, StoreError>;

    async fn list_active_agreements(&self) -> Result<Vec<Agreement>, StoreError>;
}

/// Persistence of notification rows.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<NotificationId, StoreError>;

    /// Notifications of a user, newest first, optionally filtered on `read`.
    async fn list_notifications(
        &self,
        user_id: UserId,
        read: Option<bool>,
    ) -> Result<Vec<Notification>, StoreError>;

    async fn get_notification(&self, id: NotificationId) -> Result<Option<Notification>, StoreError>;

    /// Flips an unread notification to read.
    ///
    /// # Returns
    /// `false` if the notification was already read
    async fn mark_notification_read(
        &self,
        id: NotificationId,
        read_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// # Returns
    /// The number of notifications flipped
    async fn mark_all_notifications_read(
        &self,
        user_id: UserId,
        read_at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}

/// Outgoing side of the message broker: one call per message, no retries.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, routing_key: &str, body: Vec<u8>) -> Result<(), TransportError>;
}

/// A message handed to the consumer, settled later by its delivery tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub routing_key: String,
    pub body: Vec<u8>,
    pub redelivered: bool,
}

/// Incoming side of the message broker, in manual acknowledgment mode.
#[async_trait]
pub trait DeliverySource: Send {
    /// Waits for the next delivery. `None` means the stream is closed for good.
    async fn next_delivery(&mut self) -> Option<Delivery>;

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), TransportError>;

    async fn nack(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedContract {
    pub location: String,
    /// Hex encoded SHA-256 of the rendered document
    pub content_hash: String,
}

/// Renders a contract document for an active agreement.
#[async_trait]
pub trait ContractGenerator: Send + Sync {
    async fn generate(&self, agreement: &Agreement) -> Result<GeneratedContract, ContractError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("failed to write contract: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to render contract: {0}")]
    Render(String),
}

#[cfg(test)]
use mockall::*;

#[cfg(test)]
mock! {
    pub AgreementStore {}

    #[async_trait]
    impl AgreementStore for AgreementStore {
        async fn get_post_summary(&self, post_id: PostId) -> Result<Option<PostSummary>, StoreError>;
        async fn get_agreement(&self, id: AgreementId) -> Result<Option<Agreement>, StoreError>;
        async fn insert_agreement(&self, agreement: NewAgreement) -> Result<(AgreementId, DateTime<Utc>), StoreError>;
        async fn update_agreement_status(&self, id: AgreementId, expected: AgreementStatus, update: StatusUpdate) -> Result<bool, StoreError>;
        async fn set_contract(&self, id: AgreementId, contract_url: String, contract_hash: Option<String>) -> Result<(), StoreError>;
        async fn list_agreements_for_user(&self, user_id: UserId) -> Result<Vec<Agreement>, StoreError>;
        async fn list_active_agreements(&self) -> Result<Vec<Agreement>, StoreError>;
    }
}

#[cfg(test)]
mock! {
    pub NotificationStore {}

    #[async_trait]
    impl NotificationStore for NotificationStore {
        async fn insert_notification(&self, notification: NewNotification) -> Result<NotificationId, StoreError>;
        async fn list_notifications(&self, user_id: UserId, read: Option<bool>) -> Result<Vec<Notification>, StoreError>;
        async fn get_notification(&self, id: NotificationId) -> Result<Option<Notification>, StoreError>;
        async fn mark_notification_read(&self, id: NotificationId, read_at: DateTime<Utc>) -> Result<bool, StoreError>;
        async fn mark_all_notifications_read(&self, user_id: UserId, read_at: DateTime<Utc>) -> Result<u64, StoreError>;
    }
}

#[cfg(test)]
mock! {
    pub MessageTransport {}

    #[async_trait]
    impl MessageTransport for MessageTransport {
        async fn send(&self, routing_key: &str, body: Vec<u8>) -> Result<(), TransportError>;
    }
}

#[cfg(test)]
mock! {
    pub ContractGenerator {}

    #[async_trait]
    impl ContractGenerator for ContractGenerator {
        async fn generate(&self, agreement: &Agreement) -> Result<GeneratedContract, ContractError>;
    }
}
