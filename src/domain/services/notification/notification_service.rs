use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::domain::{
    models::{Notification, NotificationId, UserId},
    ports::NotificationStore,
};

use super::{NotificationError, NotificationService};

pub struct NotificationServiceImpl {
    store: Arc<dyn NotificationStore>,
}

impl NotificationServiceImpl {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NotificationService for NotificationServiceImpl {
    async fn list(
        &self,
        user_id: UserId,
        read: Option<bool>,
    ) -> Result<Vec<Notification>, NotificationError> {
        Ok(self.store.list_notifications(user_id, read).await?)
    }

    async fn get(&self, id: NotificationId, user_id: UserId) -> Result<Notification, NotificationError> {
        self.store
            .get_notification(id)
            .await?
            .filter(|n| n.user_id == user_id)
            .ok_or(NotificationError::NotFound)
    }

    async fn mark_as_read(
        &self,
        id: NotificationId,
        user_id: UserId,
    ) -> Result<Notification, NotificationError> {
        let mut notification = self.get(id, user_id).await?;
        if notification.read {
            return Err(NotificationError::AlreadyRead);
        }

        let read_at = Utc::now();
        if !self.store.mark_notification_read(id, read_at).await? {
            return Err(NotificationError::AlreadyRead);
        }

        notification.read = true;
        notification.read_at = Some(read_at);
        Ok(notification)
    }

    async fn mark_all_as_read(&self, user_id: UserId) -> Result<u64, NotificationError> {
        let flipped = self
            .store
            .mark_all_notifications_read(user_id, Utc::now())
            .await?;
        info!("{} notification(s) of user {} marked as read", flipped, user_id);
        Ok(flipped)
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::{always, eq};
    use serde_json::json;

    use super::*;
    use crate::domain::{
        models::NotificationKind,
        ports::MockNotificationStore,
        services::ErrorKind,
    };

    fn notification(read: bool) -> Notification {
        Notification {
            id: 3,
            user_id: 2,
            kind: NotificationKind::AgreementCancelled,
            title: "Agreement Cancelled".to_owned(),
            message: "Agreement #4 has been cancelled.".to_owned(),
            read,
            created_at: Utc::now(),
            read_at: None,
            metadata: json!({ "agreement_id": 4, "post_id": 1 }),
        }
    }

    #[tokio::test]
    async fn foreign_notifications_are_not_found() {
        let mut store = MockNotificationStore::new();
        store
            .expect_get_notification()
            .returning(|_| Ok(Some(notification(false))));

        let service = NotificationServiceImpl::new(Arc::new(store));
        let err = service.get(3, 99).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(service.get(3, 2).await.is_ok());
    }

    #[tokio::test]
    async fn mark_as_read_flips_once() {
        let mut store = MockNotificationStore::new();
        store
            .expect_get_notification()
            .returning(|_| Ok(Some(notification(false))));
        store
            .expect_mark_notification_read()
            .with(eq(3), always())
            .times(1)
            .returning(|_, _| Ok(true));

        let service = NotificationServiceImpl::new(Arc::new(store));
        let read = service.mark_as_read(3, 2).await.unwrap();
        assert!(read.read);
        assert!(read.read_at.is_some());
    }

    #[tokio::test]
    async fn already_read_is_rejected() {
        let mut store = MockNotificationStore::new();
        store
            .expect_get_notification()
            .returning(|_| Ok(Some(notification(true))));
        store.expect_mark_notification_read().never();

        let service = NotificationServiceImpl::new(Arc::new(store));
        let err = service.mark_as_read(3, 2).await.unwrap_err();
        assert_eq!(err.to_string(), "notification already marked as read");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
