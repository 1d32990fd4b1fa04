//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Process-wide wiring. One store backs the state machine, the notification materializer, the
// notification read side and the reminder sweep, so every component sees the same agreements.
//--------------------------------------------------------------------------------------------------

use std::sync::Arc;

use crate::{
    config::Config,
    domain::{
        ports::MessageTransport,
        services::{
            agreement::AgreementServiceImpl, materializer::NotificationMaterializer,
            notification::NotificationServiceImpl, publisher::EventPublisher,
            reminder::ReminderService,
        },
    },
    outbounds::{InMemoryStore, TextContractGenerator},
};

/// Shared application state
pub struct AppState {
    pub store: Arc<InMemoryStore>,
    pub publisher: Arc<EventPublisher>,
    pub agreements: Arc<AgreementServiceImpl>,
    pub notifications: Arc<NotificationServiceImpl>,
    reminder_window_days: i64,
}

impl AppState {
    pub fn new(store: Arc<InMemoryStore>, transport: Arc<dyn MessageTransport>, config: &Config) -> Self {
        let publisher = Arc::new(EventPublisher::new(transport, config.publish_timeout));
        let agreements = Arc::new(AgreementServiceImpl::new(
            store.clone(),
            publisher.clone(),
            Arc::new(TextContractGenerator::new(config.contracts_dir.clone())),
        ));
        let notifications = Arc::new(NotificationServiceImpl::new(store.clone()));

        Self {
            store,
            publisher,
            agreements,
            notifications,
            reminder_window_days: config.reminder_window_days,
        }
    }

    pub fn materializer(&self) -> NotificationMaterializer {
        NotificationMaterializer::new(self.store.clone())
    }

    pub fn reminders(&self) -> ReminderService {
        ReminderService::new(
            self.store.clone(),
            self.publisher.clone(),
            self.reminder_window_days,
        )
    }
}
