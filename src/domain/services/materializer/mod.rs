//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Turns delivered events into per-user notification rows. `agreement.created` notifies the
// lender, `agreement.accepted` and `agreement.cancelled` notify both parties, and the two
// reminder kinds notify the user named in the payload.
//--------------------------------------------------------------------------------------------------

pub mod notification_materializer;

use thiserror::Error;

use crate::domain::{
    events::EventDecodeError,
    models::UserId,
    ports::StoreError,
};

pub use notification_materializer::NotificationMaterializer;

/// Failure of a handler. The consumer answers every variant with a nack.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("cannot decode event: {0}")]
    Decode(#[from] EventDecodeError),

    /// Inserts before the failing one are kept.
    #[error("failed to store notification for user {user_id}: {source}")]
    Store {
        user_id: UserId,
        #[source]
        source: StoreError,
    },
}
