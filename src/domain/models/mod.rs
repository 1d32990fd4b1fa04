/// +----------------------------------------------------------+
/// | MODULES                                                  |
/// +----------+-------+-------+------------------------------+
/// | Exports:                                                 |
/// |   - agreement (Agreement, statuses, terms)               |
/// |   - notification (Notification, NotificationKind)       |
/// |   - post (PostSummary, PostKind)                         |
/// +----------------------------------------------------------+
pub mod agreement;
pub mod notification;
pub mod post;

pub use agreement::{
    Agreement, AgreementStatus, NewAgreement, ParseEnumError, PartyRole, PaymentFrequency,
    StatusUpdate, Transition, DEFAULT_CURRENCY,
};
pub use notification::{NewNotification, Notification, NotificationKind};
pub use post::{PostKind, PostSummary};

pub type UserId = i64;
pub type AgreementId = i64;
pub type PostId = i64;
pub type NotificationId = i64;
