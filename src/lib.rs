// Expose the modules
pub mod app;
pub mod config;
pub mod domain;
pub mod inbounds;
pub mod outbounds;

// Re-export key types for easier usage
pub use app::AppState;
pub use config::{Config, ConfigError};
pub use domain::events::{EventDecodeError, LendingEvent, RoutingKey};
pub use domain::models::{
    Agreement, AgreementStatus, Notification, NotificationKind, PaymentFrequency, PostKind,
    PostSummary,
};
pub use domain::services::{
    ErrorKind,
    agreement::{AgreementError, AgreementService, AgreementServiceImpl, CreateAgreement},
    materializer::NotificationMaterializer,
    notification::{NotificationError, NotificationService, NotificationServiceImpl},
    publisher::{EventPublisher, PublishError, PublishMetrics},
    reminder::{ReminderService, SweepReport},
};
pub use inbounds::consumer::{ConsumerError, ConsumerStats, NotificationConsumer};
