use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::models::{
    Agreement, AgreementId, AgreementStatus, PaymentFrequency, PostId, UserId,
};

/// Published on `agreement.created`; notifies the lender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementCreatedEvent {
    pub agreement_id: AgreementId,
    pub lender_id: UserId,
    pub borrower_id: UserId,
    pub post_id: PostId,
    pub principal_amount: Decimal,
    pub interest_rate: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub due_date: NaiveDate,
    pub payment_frequency: PaymentFrequency,
    pub number_of_payments: i32,
    pub status: AgreementStatus,
}

impl From<&Agreement> for AgreementCreatedEvent {
    fn from(agreement: &Agreement) -> Self {
        Self {
            agreement_id: agreement.id,
            lender_id: agreement.lender_id,
            borrower_id: agreement.borrower_id,
            post_id: agreement.post_id,
            principal_amount: agreement.principal_amount,
            interest_rate: agreement.interest_rate,
            total_amount: agreement.total_amount,
            currency: agreement.currency.clone(),
            due_date: agreement.due_date,
            payment_frequency: agreement.payment_frequency,
            number_of_payments: agreement.number_of_payments,
            status: agreement.status,
        }
    }
}

/// Published on `agreement.accepted`; notifies both parties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementAcceptedEvent {
    pub agreement_id: AgreementId,
    pub lender_id: UserId,
    pub borrower_id: UserId,
    pub post_id: PostId,
    pub status: AgreementStatus,
    pub accepted_at: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: NaiveDate,
}

impl From<&Agreement> for AgreementAcceptedEvent {
    fn from(agreement: &Agreement) -> Self {
        Self {
            agreement_id: agreement.id,
            lender_id: agreement.lender_id,
            borrower_id: agreement.borrower_id,
            post_id: agreement.post_id,
            status: agreement.status,
            accepted_at: agreement.accepted_at,
            start_date: agreement.start_date,
            due_date: agreement.due_date,
        }
    }
}

/// Published on `agreement.cancelled`; notifies both parties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementCancelledEvent {
    pub agreement_id: AgreementId,
    pub lender_id: UserId,
    pub borrower_id: UserId,
    pub post_id: PostId,
    pub status: AgreementStatus,
}

impl From<&Agreement> for AgreementCancelledEvent {
    fn from(agreement: &Agreement) -> Self {
        Self {
            agreement_id: agreement.id,
            lender_id: agreement.lender_id,
            borrower_id: agreement.borrower_id,
            post_id: agreement.post_id,
            status: agreement.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReminderEvent {
    pub agreement_id: AgreementId,
    pub user_id: UserId,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverdueAlertEvent {
    pub agreement_id: AgreementId,
    pub user_id: UserId,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub days_overdue: i64,
}
