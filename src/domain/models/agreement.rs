//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Core data types of a lending agreement: the record itself, its status machine and the
// enumerations of its terms.
//
// | Section            | Description                                                      |
// |--------------------|------------------------------------------------------------------|
// | ENUMS              | AgreementStatus, PaymentFrequency, PartyRole, Transition         |
// | STRUCTS            | Agreement, NewAgreement, StatusUpdate                            |
// | ERRORS             | ParseEnumError                                                   |
// | TESTS              | Unit tests for the transition table and derived amounts          |
//--------------------------------------------------------------------------------------------------

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AgreementId, PostId, UserId};

/// The single supported currency code.
pub const DEFAULT_CURRENCY: &str = "KZT";

//--------------------------------------------------------------------------------------------------
//  ENUMS
//--------------------------------------------------------------------------------------------------
// | Name             | Description                                          |
// |------------------|------------------------------------------------------|
// | AgreementStatus  | Lifecycle state of an agreement.                     |
// | PaymentFrequency | How often the borrower repays.                       |
// | PartyRole        | Side of the agreement a user is on.                  |
// | Transition       | Status-changing operations.                          |
//--------------------------------------------------------------------------------------------------

/// Lifecycle state of an agreement.
///
/// ```text
/// pending --accept--> active
/// pending --cancel--> cancelled
/// ```
/// `completed` is reserved for full settlement and is never entered by the
/// operations in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgreementStatus {
    Pending,
    Active,
    Cancelled,
    Completed,
}

impl AgreementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    /// Status reached by applying `transition`, if it is allowed from `self`.
    pub fn apply(&self, transition: Transition) -> Option<AgreementStatus> {
        match (self, transition) {
            (Self::Pending, Transition::Accept) => Some(Self::Active),
            (Self::Pending, Transition::Cancel) => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgreementStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => Err(ParseEnumError::new("status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentFrequency {
    OneTime,
    Weekly,
    Biweekly,
    Monthly,
}

impl PaymentFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "one_time",
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for PaymentFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentFrequency {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_time" => Ok(Self::OneTime),
            "weekly" => Ok(Self::Weekly),
            "biweekly" => Ok(Self::Biweekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(ParseEnumError::new("payment_frequency", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    Lender,
    Borrower,
}

impl FromStr for PartyRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lender" => Ok(Self::Lender),
            "borrower" => Ok(Self::Borrower),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Accept,
    Cancel,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => f.write_str("accept"),
            Self::Cancel => f.write_str("cancel"),
        }
    }
}

//--------------------------------------------------------------------------------------------------
//  STRUCTS
//--------------------------------------------------------------------------------------------------

/// A binding loan contract between a lender and a borrower, opened from a lend post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: AgreementId,
    pub lender_id: UserId,
    pub borrower_id: UserId,
    pub post_id: PostId,
    pub principal_amount: Decimal,
    pub interest_rate: Decimal,
    /// `principal_amount * (1 + interest_rate)`, fixed at creation
    pub total_amount: Decimal,
    pub currency: String,
    pub payment_frequency: PaymentFrequency,
    pub number_of_payments: i32,
    pub status: AgreementStatus,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: NaiveDate,
    pub completed_at: Option<DateTime<Utc>>,
    pub contract_url: Option<String>,
    pub contract_hash: Option<String>,
}

impl Agreement {
    /// Principal plus interest, `None` when it does not fit in a `Decimal`.
    pub fn total_for(principal_amount: Decimal, interest_rate: Decimal) -> Option<Decimal> {
        Decimal::ONE
            .checked_add(interest_rate)
            .and_then(|factor| principal_amount.checked_mul(factor))
    }

    pub fn role_of(&self, user_id: UserId) -> Option<PartyRole> {
        if user_id == self.lender_id {
            Some(PartyRole::Lender)
        } else if user_id == self.borrower_id {
            Some(PartyRole::Borrower)
        } else {
            None
        }
    }

    pub fn is_party(&self, user_id: UserId) -> bool {
        self.role_of(user_id).is_some()
    }

    /// Copies the fields written by a status update onto this snapshot.
    pub fn apply_update(&mut self, update: &StatusUpdate) {
        self.status = update.status;
        if update.accepted_at.is_some() {
            self.accepted_at = update.accepted_at;
        }
        if update.start_date.is_some() {
            self.start_date = update.start_date;
        }
    }
}

/// Fields of an agreement before persistence assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAgreement {
    pub lender_id: UserId,
    pub borrower_id: UserId,
    pub post_id: PostId,
    pub principal_amount: Decimal,
    pub interest_rate: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub payment_frequency: PaymentFrequency,
    pub number_of_payments: i32,
    pub due_date: NaiveDate,
}

impl NewAgreement {
    pub fn into_agreement(self, id: AgreementId, created_at: DateTime<Utc>) -> Agreement {
        Agreement {
            id,
            lender_id: self.lender_id,
            borrower_id: self.borrower_id,
            post_id: self.post_id,
            principal_amount: self.principal_amount,
            interest_rate: self.interest_rate,
            total_amount: self.total_amount,
            currency: self.currency,
            payment_frequency: self.payment_frequency,
            number_of_payments: self.number_of_payments,
            status: AgreementStatus::Pending,
            created_at,
            accepted_at: None,
            start_date: None,
            due_date: self.due_date,
            completed_at: None,
            contract_url: None,
            contract_hash: None,
        }
    }
}

/// Fields written by a guarded status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: AgreementStatus,
    pub accepted_at: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    /// Acceptance stamps `accepted_at` and `start_date` with the same instant.
    pub fn accepted(at: DateTime<Utc>) -> Self {
        Self {
            status: AgreementStatus::Active,
            accepted_at: Some(at),
            start_date: Some(at),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: AgreementStatus::Cancelled,
            accepted_at: None,
            start_date: None,
        }
    }
}

//--------------------------------------------------------------------------------------------------
//  ERRORS
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {field} value: {value}")]
pub struct ParseEnumError {
    pub field: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_owned(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
//  TESTS
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn only_pending_agreements_transition() {
        assert_eq!(
            AgreementStatus::Pending.apply(Transition::Accept),
            Some(AgreementStatus::Active)
        );
        assert_eq!(
            AgreementStatus::Pending.apply(Transition::Cancel),
            Some(AgreementStatus::Cancelled)
        );

        for status in [
            AgreementStatus::Active,
            AgreementStatus::Cancelled,
            AgreementStatus::Completed,
        ] {
            assert_eq!(status.apply(Transition::Accept), None);
            assert_eq!(status.apply(Transition::Cancel), None);
        }
    }

    #[test]
    fn total_includes_interest() {
        assert_eq!(Agreement::total_for(dec!(1000), dec!(0.1)), Some(dec!(1100)));
        assert_eq!(Agreement::total_for(dec!(250.50), dec!(0)), Some(dec!(250.50)));
        assert_eq!(Agreement::total_for(Decimal::MAX / Decimal::TWO, dec!(1.5)), None);
        assert_eq!(Agreement::total_for(dec!(1), Decimal::MAX), None);
    }

    #[test]
    fn frequency_parses_wire_names() {
        assert_eq!("one_time".parse(), Ok(PaymentFrequency::OneTime));
        assert_eq!("biweekly".parse(), Ok(PaymentFrequency::Biweekly));
        assert!("yearly".parse::<PaymentFrequency>().is_err());
        assert_eq!(
            serde_json::to_string(&PaymentFrequency::OneTime).unwrap(),
            "\"one_time\""
        );
    }

    #[test]
    fn terminal_states() {
        assert!(AgreementStatus::Cancelled.is_terminal());
        assert!(AgreementStatus::Completed.is_terminal());
        assert!(!AgreementStatus::Active.is_terminal());
    }
}
