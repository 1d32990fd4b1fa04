//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Read side of notifications, scoped to their owner. Flipping `read` is the only mutation a
// notification ever sees after the materializer inserts it.
//--------------------------------------------------------------------------------------------------

pub mod notification_service;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    models::{Notification, NotificationId, UserId},
    ports::StoreError,
};

use super::ErrorKind;

pub use notification_service::NotificationServiceImpl;

#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Newest first, optionally only read or only unread.
    async fn list(
        &self,
        user_id: UserId,
        read: Option<bool>,
    ) -> Result<Vec<Notification>, NotificationError>;

    async fn get(&self, id: NotificationId, user_id: UserId) -> Result<Notification, NotificationError>;

    async fn mark_as_read(
        &self,
        id: NotificationId,
        user_id: UserId,
    ) -> Result<Notification, NotificationError>;

    /// # Returns
    /// How many unread notifications were flipped
    async fn mark_all_as_read(&self, user_id: UserId) -> Result<u64, NotificationError>;
}

#[derive(Debug, Error)]
pub enum NotificationError {
    /// Also returned for notifications owned by someone else.
    #[error("notification not found")]
    NotFound,

    #[error("notification already marked as read")]
    AlreadyRead,

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl NotificationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::AlreadyRead => ErrorKind::Validation,
            Self::Store(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
use mockall::*;

#[cfg(test)]
mock! {
    pub NotificationService {}

    #[async_trait]
    impl NotificationService for NotificationService {
        async fn list(&self, user_id: UserId, read: Option<bool>) -> Result<Vec<Notification>, NotificationError>;
        async fn get(&self, id: NotificationId, user_id: UserId) -> Result<Notification, NotificationError>;
        async fn mark_as_read(&self, id: NotificationId, user_id: UserId) -> Result<Notification, NotificationError>;
        async fn mark_all_as_read(&self, user_id: UserId) -> Result<u64, NotificationError>;
    }
}
