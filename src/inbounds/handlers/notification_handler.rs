use std::sync::Arc;

use tracing::{error, info};

use crate::domain::{
    models::{Notification, NotificationId, UserId},
    services::notification::{NotificationError, NotificationService},
};

use super::super::{
    api_error::ApiError,
    dtos::{ListNotificationsQuery, MarkAllReadResponse},
};

/// +----------------------------------------------------------+
/// | STRUCTS | TRAITS | ENUMS | FUNCTIONS                     |
/// +----------+-------+-------+------------------------------+
/// | Functions:                                               |
/// |   - handle_list_request                                  |
/// |   - handle_get_request                                   |
/// |   - handle_mark_read_request                             |
/// |   - handle_mark_all_read_request                         |
/// +----------------------------------------------------------+

pub async fn handle_list_request(
    user_id: UserId,
    query: ListNotificationsQuery,
    notifications: Arc<dyn NotificationService>,
) -> Result<Vec<Notification>, ApiError> {
    notifications
        .list(user_id, query.read_filter())
        .await
        .map_err(log_rejection)
}

pub async fn handle_get_request(
    id: NotificationId,
    user_id: UserId,
    notifications: Arc<dyn NotificationService>,
) -> Result<Notification, ApiError> {
    notifications.get(id, user_id).await.map_err(log_rejection)
}

pub async fn handle_mark_read_request(
    id: NotificationId,
    user_id: UserId,
    notifications: Arc<dyn NotificationService>,
) -> Result<Notification, ApiError> {
    notifications
        .mark_as_read(id, user_id)
        .await
        .map_err(log_rejection)
}

pub async fn handle_mark_all_read_request(
    user_id: UserId,
    notifications: Arc<dyn NotificationService>,
) -> Result<MarkAllReadResponse, ApiError> {
    let updated = notifications
        .mark_all_as_read(user_id)
        .await
        .map_err(log_rejection)?;

    info!("Marked {} notification(s) read for user {}", updated, user_id);
    Ok(MarkAllReadResponse { updated })
}

fn log_rejection(err: NotificationError) -> ApiError {
    error!("Notification request rejected: {err}");
    ApiError::from(err)
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::domain::services::notification::MockNotificationService;

    #[tokio::test]
    async fn list_passes_read_filter() {
        let mut service = MockNotificationService::new();
        service
            .expect_list()
            .with(eq(5), eq(Some(false)))
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let query = ListNotificationsQuery {
            read: Some("false".to_owned()),
        };
        let listed = handle_list_request(5, query, Arc::new(service)).await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn mark_read_twice_is_bad_request() {
        let mut service = MockNotificationService::new();
        service
            .expect_mark_as_read()
            .returning(|_, _| Err(NotificationError::AlreadyRead));

        let err = handle_mark_read_request(3, 5, Arc::new(service))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn mark_all_reports_count() {
        let mut service = MockNotificationService::new();
        service
            .expect_mark_all_as_read()
            .with(eq(5))
            .returning(|_| Ok(4));

        let response = handle_mark_all_read_request(5, Arc::new(service)).await.unwrap();
        assert_eq!(response, MarkAllReadResponse { updated: 4 });
    }
}
