//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Event envelope and topic registry. The set of event kinds is closed: every routing key maps to
// exactly one payload type and to one `LendingEvent` variant, and consumers dispatch with an
// exhaustive match instead of string lookups.
//--------------------------------------------------------------------------------------------------

mod payloads;

use std::{fmt, str::FromStr};

use serde::Serialize;
use thiserror::Error;

pub use payloads::{
    AgreementAcceptedEvent, AgreementCancelledEvent, AgreementCreatedEvent, OverdueAlertEvent,
    PaymentReminderEvent,
};

/// +----------------------------------------------------------+
/// | STRUCTS | TRAITS | ENUMS | FUNCTIONS                     |
/// +----------+-------+-------+------------------------------+
/// | Enums:                                                   |
/// |   - RoutingKey                                           |
/// |   - LendingEvent                                         |
/// |   - EventDecodeError                                     |
/// +----------------------------------------------------------+

/// Routing keys of the topic exchange, one per event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoutingKey {
    AgreementCreated,
    AgreementAccepted,
    AgreementCancelled,
    PaymentReminder,
    OverdueAlert,
}

impl RoutingKey {
    /// Every key the notification queue is bound with.
    pub const ALL: [RoutingKey; 5] = [
        RoutingKey::AgreementCreated,
        RoutingKey::AgreementAccepted,
        RoutingKey::AgreementCancelled,
        RoutingKey::PaymentReminder,
        RoutingKey::OverdueAlert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgreementCreated => "agreement.created",
            Self::AgreementAccepted => "agreement.accepted",
            Self::AgreementCancelled => "agreement.cancelled",
            Self::PaymentReminder => "notification.payment_reminder",
            Self::OverdueAlert => "notification.overdue_alert",
        }
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingKey {
    type Err = EventDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoutingKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| EventDecodeError::UnknownRoutingKey(s.to_owned()))
    }
}

/// Closed sum over the five event kinds.
///
/// Serializes as the bare payload object; the kind travels as the routing key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LendingEvent {
    AgreementCreated(AgreementCreatedEvent),
    AgreementAccepted(AgreementAcceptedEvent),
    AgreementCancelled(AgreementCancelledEvent),
    PaymentReminder(PaymentReminderEvent),
    OverdueAlert(OverdueAlertEvent),
}

impl LendingEvent {
    pub fn routing_key(&self) -> RoutingKey {
        match self {
            Self::AgreementCreated(_) => RoutingKey::AgreementCreated,
            Self::AgreementAccepted(_) => RoutingKey::AgreementAccepted,
            Self::AgreementCancelled(_) => RoutingKey::AgreementCancelled,
            Self::PaymentReminder(_) => RoutingKey::PaymentReminder,
            Self::OverdueAlert(_) => RoutingKey::OverdueAlert,
        }
    }

    /// Decodes a delivery body according to its routing key.
    ///
    /// # Errors
    /// * `UnknownRoutingKey` - the key is not in the registry
    /// * `Malformed` - the body does not deserialize into the key's payload
    pub fn decode(routing_key: &str, body: &[u8]) -> Result<Self, EventDecodeError> {
        let key: RoutingKey = routing_key.parse()?;
        let malformed = |source: serde_json::Error| EventDecodeError::Malformed {
            routing_key: key.as_str(),
            source,
        };

        let event = match key {
            RoutingKey::AgreementCreated => {
                Self::AgreementCreated(serde_json::from_slice(body).map_err(malformed)?)
            }
            RoutingKey::AgreementAccepted => {
                Self::AgreementAccepted(serde_json::from_slice(body).map_err(malformed)?)
            }
            RoutingKey::AgreementCancelled => {
                Self::AgreementCancelled(serde_json::from_slice(body).map_err(malformed)?)
            }
            RoutingKey::PaymentReminder => {
                Self::PaymentReminder(serde_json::from_slice(body).map_err(malformed)?)
            }
            RoutingKey::OverdueAlert => {
                Self::OverdueAlert(serde_json::from_slice(body).map_err(malformed)?)
            }
        };

        Ok(event)
    }
}

impl From<AgreementCreatedEvent> for LendingEvent {
    fn from(event: AgreementCreatedEvent) -> Self {
        Self::AgreementCreated(event)
    }
}

impl From<AgreementAcceptedEvent> for LendingEvent {
    fn from(event: AgreementAcceptedEvent) -> Self {
        Self::AgreementAccepted(event)
    }
}

impl From<AgreementCancelledEvent> for LendingEvent {
    fn from(event: AgreementCancelledEvent) -> Self {
        Self::AgreementCancelled(event)
    }
}

impl From<PaymentReminderEvent> for LendingEvent {
    fn from(event: PaymentReminderEvent) -> Self {
        Self::PaymentReminder(event)
    }
}

impl From<OverdueAlertEvent> for LendingEvent {
    fn from(event: OverdueAlertEvent) -> Self {
        Self::OverdueAlert(event)
    }
}

#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("unknown routing key: {0}")]
    UnknownRoutingKey(String),

    #[error("malformed {routing_key} payload: {source}")]
    Malformed {
        routing_key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn routing_keys_parse_back() {
        for key in RoutingKey::ALL {
            assert_eq!(key.as_str().parse::<RoutingKey>().unwrap(), key);
        }
        assert!(matches!(
            "agreement.deleted".parse::<RoutingKey>(),
            Err(EventDecodeError::UnknownRoutingKey(key)) if key == "agreement.deleted"
        ));
    }

    #[test]
    fn decode_dispatches_on_routing_key() {
        let body = br#"{
            "agreement_id": 7,
            "user_id": 2,
            "due_date": "2030-01-15",
            "amount": 1100.0,
            "currency": "KZT",
            "days_overdue": 4
        }"#;

        let event = LendingEvent::decode("notification.overdue_alert", body).unwrap();
        let LendingEvent::OverdueAlert(alert) = event else {
            panic!("expected overdue alert");
        };
        assert_eq!(alert.agreement_id, 7);
        assert_eq!(alert.days_overdue, 4);
        assert_eq!(alert.amount, dec!(1100));
        assert_eq!(alert.due_date, NaiveDate::from_ymd_opt(2030, 1, 15).unwrap());
    }

    #[test]
    fn malformed_body_is_rejected() {
        let err = LendingEvent::decode("agreement.created", b"{not json").unwrap_err();
        assert!(matches!(
            err,
            EventDecodeError::Malformed { routing_key: "agreement.created", .. }
        ));
    }

    #[test]
    fn body_of_another_kind_is_malformed() {
        let body = br#"{"agreement_id":1,"lender_id":1,"borrower_id":2,"post_id":3,"status":"cancelled"}"#;
        assert!(LendingEvent::decode("agreement.cancelled", body).is_ok());
        assert!(matches!(
            LendingEvent::decode("agreement.accepted", body),
            Err(EventDecodeError::Malformed { .. })
        ));
    }

    #[test]
    fn serializes_bare_payload() {
        let event = LendingEvent::from(AgreementCancelledEvent {
            agreement_id: 1,
            lender_id: 1,
            borrower_id: 2,
            post_id: 3,
            status: crate::domain::models::AgreementStatus::Cancelled,
        });

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["agreement_id"], 1);
        assert_eq!(json["status"], "cancelled");
        assert!(json.get("AgreementCancelled").is_none());
    }
}
