use std::{sync::Arc, time::Duration};

use chrono::{NaiveDate, Utc};
use tokio::{select, time::interval};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::domain::{
    events::{LendingEvent, OverdueAlertEvent, PaymentReminderEvent},
    models::Agreement,
    ports::{AgreementStore, StoreError},
    services::publisher::EventPublisher,
};

/// Outcome of one sweep over the active agreements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub reminders: usize,
    pub overdue_alerts: usize,
    pub failed: usize,
}

/// Periodically publishes payment reminders and overdue alerts for active agreements.
///
/// Reminders go out while the due date is at most `window_days` ahead (today
/// included); alerts go out every sweep once the due date has passed.
pub struct ReminderService {
    store: Arc<dyn AgreementStore>,
    publisher: Arc<EventPublisher>,
    window_days: i64,
}

impl ReminderService {
    pub fn new(store: Arc<dyn AgreementStore>, publisher: Arc<EventPublisher>, window_days: i64) -> Self {
        Self {
            store,
            publisher,
            window_days,
        }
    }

    /// Publishes the event due for every active agreement as of `today`.
    ///
    /// Publish failures are counted in the report and never abort the sweep.
    ///
    /// # Errors
    /// Returns the store error if the active agreements cannot be listed
    pub async fn sweep(&self, today: NaiveDate) -> Result<SweepReport, StoreError> {
        let mut report = SweepReport::default();

        for agreement in self.store.list_active_agreements().await? {
            let Some(event) = due_event(&agreement, today, self.window_days) else {
                continue;
            };

            match self.publisher.publish_event(&event).await {
                Ok(()) => match event {
                    LendingEvent::OverdueAlert(_) => report.overdue_alerts += 1,
                    _ => report.reminders += 1,
                },
                Err(err) => {
                    error!("reminder for agreement {} not sent: {}", agreement.id, err);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Sweeps immediately, then every `period`, until `cancel` fires.
    pub async fn run(&self, period: Duration, cancel: CancellationToken) {
        let mut ticker = interval(period);

        loop {
            select! {
                _ = cancel.cancelled() => {
                    info!("reminder sweep stopped");
                    return
                },
                _ = ticker.tick() => {
                    match self.sweep(Utc::now().date_naive()).await {
                        Ok(report) => info!(
                            "reminder sweep: {} reminder(s), {} overdue alert(s), {} failed",
                            report.reminders, report.overdue_alerts, report.failed
                        ),
                        Err(err) => error!("reminder sweep failed: {}", err),
                    }
                }
            }
        }
    }
}

/// Event to publish for `agreement` on `today`, if any.
pub fn due_event(agreement: &Agreement, today: NaiveDate, window_days: i64) -> Option<LendingEvent> {
    let days_left = (agreement.due_date - today).num_days();

    if days_left < 0 {
        Some(
            OverdueAlertEvent {
                agreement_id: agreement.id,
                user_id: agreement.borrower_id,
                due_date: agreement.due_date,
                amount: agreement.total_amount,
                currency: agreement.currency.clone(),
                days_overdue: -days_left,
            }
            .into(),
        )
    } else if days_left <= window_days {
        Some(
            PaymentReminderEvent {
                agreement_id: agreement.id,
                user_id: agreement.borrower_id,
                due_date: agreement.due_date,
                amount: agreement.total_amount,
                currency: agreement.currency.clone(),
            }
            .into(),
        )
    } else {
        None
    }
}
