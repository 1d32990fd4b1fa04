/// +----------------------------------------------------------+
/// | MODULES                                                  |
/// +----------+-------+-------+------------------------------+
/// | Exports:                                                 |
/// |   - agreement (AgreementService, AgreementServiceImpl)   |
/// |   - publisher (EventPublisher, PublishMetrics)           |
/// |   - materializer (NotificationMaterializer)              |
/// |   - notification (NotificationService)                   |
/// |   - reminder (ReminderService)                           |
/// |   - ErrorKind                                            |
/// +----------------------------------------------------------+
pub mod agreement;
pub mod materializer;
pub mod notification;
pub mod publisher;
pub mod reminder;

/// Caller-facing classification of service errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    Internal,
}
