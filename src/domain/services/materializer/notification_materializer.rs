use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use crate::domain::{
    events::{
        AgreementAcceptedEvent, AgreementCancelledEvent, AgreementCreatedEvent, LendingEvent,
        OverdueAlertEvent, PaymentReminderEvent,
    },
    models::{NewNotification, NotificationKind},
    ports::NotificationStore,
};

use super::HandlerError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// +----------------------------------------------------------+
/// | STRUCTS | TRAITS | ENUMS | FUNCTIONS                     |
/// +----------+-------+-------+------------------------------+
/// | Structs:                                                 |
/// |   - NotificationMaterializer                             |
/// | Functions:                                               |
/// |   - notifications_for                                    |
/// +----------------------------------------------------------+
pub struct NotificationMaterializer {
    store: Arc<dyn NotificationStore>,
}

impl NotificationMaterializer {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// Decodes a raw delivery and materializes it.
    ///
    /// # Errors
    /// `HandlerError::Decode` for unknown routing keys and malformed payloads,
    /// `HandlerError::Store` if any insert fails
    pub async fn handle_delivery(&self, routing_key: &str, body: &[u8]) -> Result<usize, HandlerError> {
        let event = LendingEvent::decode(routing_key, body)?;
        self.handle(&event).await
    }

    /// Inserts the notifications of `event` one by one, stopping at the first failure.
    ///
    /// # Returns
    /// The number of rows inserted
    pub async fn handle(&self, event: &LendingEvent) -> Result<usize, HandlerError> {
        let notifications = notifications_for(event);
        let count = notifications.len();

        for notification in notifications {
            let user_id = notification.user_id;
            let id = self
                .store
                .insert_notification(notification)
                .await
                .map_err(|source| HandlerError::Store { user_id, source })?;
            debug!("notification {} stored for user {}", id, user_id);
        }

        info!("{} materialized into {} notification(s)", event.routing_key(), count);
        Ok(count)
    }
}

/// Notifications derived from an event, in insertion order.
pub fn notifications_for(event: &LendingEvent) -> Vec<NewNotification> {
    match event {
        LendingEvent::AgreementCreated(e) => created(e),
        LendingEvent::AgreementAccepted(e) => accepted(e),
        LendingEvent::AgreementCancelled(e) => cancelled(e),
        LendingEvent::PaymentReminder(e) => vec![reminder(e)],
        LendingEvent::OverdueAlert(e) => vec![overdue(e)],
    }
}

fn created(e: &AgreementCreatedEvent) -> Vec<NewNotification> {
    vec![NewNotification {
        user_id: e.lender_id,
        kind: NotificationKind::AgreementCreated,
        title: "New Agreement Request".to_owned(),
        message: format!(
            "A new agreement request #{} has been created for your post.",
            e.agreement_id
        ),
        metadata: json!({ "agreement_id": e.agreement_id, "post_id": e.post_id }),
    }]
}

// Borrower first, then lender
fn accepted(e: &AgreementAcceptedEvent) -> Vec<NewNotification> {
    let metadata = json!({ "agreement_id": e.agreement_id, "post_id": e.post_id });

    vec![
        NewNotification {
            user_id: e.borrower_id,
            kind: NotificationKind::AgreementAccepted,
            title: "Agreement Accepted".to_owned(),
            message: format!(
                "Your agreement #{} has been accepted by the lender.",
                e.agreement_id
            ),
            metadata: metadata.clone(),
        },
        NewNotification {
            user_id: e.lender_id,
            kind: NotificationKind::AgreementAccepted,
            title: "Agreement Accepted".to_owned(),
            message: format!("You have accepted agreement #{}.", e.agreement_id),
            metadata,
        },
    ]
}

fn cancelled(e: &AgreementCancelledEvent) -> Vec<NewNotification> {
    let metadata = json!({ "agreement_id": e.agreement_id, "post_id": e.post_id });

    [e.lender_id, e.borrower_id]
        .into_iter()
        .map(|user_id| NewNotification {
            user_id,
            kind: NotificationKind::AgreementCancelled,
            title: "Agreement Cancelled".to_owned(),
            message: format!("Agreement #{} has been cancelled.", e.agreement_id),
            metadata: metadata.clone(),
        })
        .collect()
}

fn reminder(e: &PaymentReminderEvent) -> NewNotification {
    let due_date = e.due_date.format(DATE_FORMAT).to_string();

    NewNotification {
        user_id: e.user_id,
        kind: NotificationKind::PaymentReminder,
        title: "Payment Reminder".to_owned(),
        message: format!(
            "Reminder: Payment of {:.2} {} for agreement #{} is due on {}.",
            e.amount, e.currency, e.agreement_id, due_date
        ),
        metadata: json!({
            "agreement_id": e.agreement_id,
            "due_date": due_date,
            "amount": e.amount,
            "currency": e.currency,
        }),
    }
}

fn overdue(e: &OverdueAlertEvent) -> NewNotification {
    let due_date = e.due_date.format(DATE_FORMAT).to_string();

    NewNotification {
        user_id: e.user_id,
        kind: NotificationKind::OverdueAlert,
        title: "Overdue Payment Alert".to_owned(),
        message: format!(
            "ALERT: Payment of {:.2} {} for agreement #{} is {} days overdue (due date: {}).",
            e.amount, e.currency, e.agreement_id, e.days_overdue, due_date
        ),
        metadata: json!({
            "agreement_id": e.agreement_id,
            "due_date": due_date,
            "amount": e.amount,
            "currency": e.currency,
            "days_overdue": e.days_overdue,
        }),
    }
}
