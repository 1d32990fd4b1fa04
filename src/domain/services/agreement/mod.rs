//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// The agreement state machine: validated creation and the guarded `pending -> active` and
// `pending -> cancelled` transitions, plus contract metadata and party-scoped reads. Each
// committed state change publishes its event; a failed publish is logged and never rolls the
// state change back.
//--------------------------------------------------------------------------------------------------

pub mod agreement_service;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{
    models::{Agreement, AgreementId, AgreementStatus, PartyRole, PostId, Transition, UserId},
    ports::{ContractError, StoreError},
};

use super::ErrorKind;

pub use agreement_service::AgreementServiceImpl;

/// +----------------------------------------------------------+
/// | STRUCTS | TRAITS | ENUMS | FUNCTIONS                     |
/// +----------+-------+-------+------------------------------+
/// | Traits:                                                  |
/// |   - AgreementService                                     |
/// | Structs:                                                 |
/// |   - CreateAgreement, AgreementFilter                     |
/// | Enums:                                                   |
/// |   - AgreementError                                       |
/// +----------------------------------------------------------+

/// Unvalidated terms of a new agreement, as received from the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateAgreement {
    pub post_id: PostId,
    pub principal_amount: Decimal,
    pub interest_rate: Decimal,
    /// Calendar date, `YYYY-MM-DD`
    pub due_date: String,
    pub payment_frequency: String,
    pub number_of_payments: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgreementFilter {
    pub status: Option<AgreementStatus>,
    pub role: Option<PartyRole>,
}

/// Operations on agreements, all on behalf of an authenticated requester.
#[async_trait]
pub trait AgreementService: Send + Sync {
    /// Creates a pending agreement on a lend post; the requester becomes the borrower.
    ///
    /// # Errors
    /// Checked in order: post exists and is a lend post, principal > 0, rate >= 0,
    /// total amount fits, due date is a `YYYY-MM-DD` date after today, at least one
    /// payment, known payment frequency, requester is not the post author.
    async fn create(
        &self,
        requester_id: UserId,
        request: CreateAgreement,
    ) -> Result<Agreement, AgreementError>;

    /// `pending -> active`, lender only.
    async fn accept(&self, id: AgreementId, requester_id: UserId) -> Result<Agreement, AgreementError>;

    /// `pending -> cancelled`, either party.
    async fn cancel(&self, id: AgreementId, requester_id: UserId) -> Result<Agreement, AgreementError>;

    /// Stores a manually produced contract, lender only. No status change.
    async fn attach_contract(
        &self,
        id: AgreementId,
        requester_id: UserId,
        contract_url: &str,
        contract_hash: &str,
    ) -> Result<Agreement, AgreementError>;

    /// Renders the contract of an active agreement, either party. No status change.
    async fn generate_contract(
        &self,
        id: AgreementId,
        requester_id: UserId,
    ) -> Result<Agreement, AgreementError>;

    async fn get(&self, id: AgreementId, requester_id: UserId) -> Result<Agreement, AgreementError>;

    /// Agreements the requester is a party of, newest first.
    async fn list_for_user(
        &self,
        requester_id: UserId,
        filter: AgreementFilter,
    ) -> Result<Vec<Agreement>, AgreementError>;
}

/// Rejections of agreement operations.
#[derive(Debug, Error)]
pub enum AgreementError {
    #[error("post not found")]
    PostNotFound,

    #[error("can only create agreements for lend posts")]
    NotALendPost,

    #[error("principal_amount must be greater than 0")]
    NonPositivePrincipal,

    #[error("interest_rate cannot be negative")]
    NegativeInterestRate,

    /// Principal plus interest overflows the amount range.
    #[error("principal_amount is too large")]
    AmountOutOfRange,

    #[error("invalid due_date format, use YYYY-MM-DD")]
    InvalidDueDate,

    #[error("due_date must be in the future")]
    DueDateNotInFuture,

    #[error("number_of_payments must be greater than 0")]
    InvalidNumberOfPayments,

    #[error("number_of_payments is too large")]
    TooManyPayments,

    #[error("invalid payment_frequency")]
    InvalidPaymentFrequency,

    #[error("cannot create agreement with your own post")]
    SelfDealing,

    #[error("agreement not found")]
    AgreementNotFound,

    #[error("only lender can accept the agreement")]
    OnlyLenderCanAccept,

    #[error("not authorized to cancel this agreement")]
    NotAuthorizedToCancel,

    /// The agreement is not `pending`, or stopped being so before the write landed.
    #[error("can only {0} pending agreements")]
    InvalidTransition(Transition),

    #[error("contract_url is required")]
    ContractUrlRequired,

    #[error("only lender can update contract")]
    OnlyLenderCanUpdateContract,

    #[error("not authorized to generate contract for this agreement")]
    NotAuthorizedToGenerateContract,

    #[error("contract generation is available only for active agreements")]
    ContractRequiresActiveAgreement,

    #[error("not authorized to view this agreement")]
    NotAuthorizedToView,

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("contract generation failed: {0}")]
    Contract(#[from] ContractError),
}

impl AgreementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PostNotFound | Self::AgreementNotFound => ErrorKind::NotFound,
            Self::OnlyLenderCanAccept
            | Self::NotAuthorizedToCancel
            | Self::OnlyLenderCanUpdateContract
            | Self::NotAuthorizedToGenerateContract
            | Self::NotAuthorizedToView => ErrorKind::Authorization,
            Self::NotALendPost
            | Self::NonPositivePrincipal
            | Self::NegativeInterestRate
            | Self::AmountOutOfRange
            | Self::InvalidDueDate
            | Self::DueDateNotInFuture
            | Self::InvalidNumberOfPayments
            | Self::TooManyPayments
            | Self::InvalidPaymentFrequency
            | Self::SelfDealing
            | Self::InvalidTransition(_)
            | Self::ContractUrlRequired
            | Self::ContractRequiresActiveAgreement => ErrorKind::Validation,
            Self::Store(_) | Self::Contract(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
use mockall::*;

#[cfg(test)]
mock! {
    pub AgreementService {}

    #[async_trait]
    impl AgreementService for AgreementService {
        async fn create(&self, requester_id: UserId, request: CreateAgreement) -> Result<Agreement, AgreementError>;
        async fn accept(&self, id: AgreementId, requester_id: UserId) -> Result<Agreement, AgreementError>;
        async fn cancel(&self, id: AgreementId, requester_id: UserId) -> Result<Agreement, AgreementError>;
        async fn attach_contract(&self, id: AgreementId, requester_id: UserId, contract_url: &str, contract_hash: &str) -> Result<Agreement, AgreementError>;
        async fn generate_contract(&self, id: AgreementId, requester_id: UserId) -> Result<Agreement, AgreementError>;
        async fn get(&self, id: AgreementId, requester_id: UserId) -> Result<Agreement, AgreementError>;
        async fn list_for_user(&self, requester_id: UserId, filter: AgreementFilter) -> Result<Vec<Agreement>, AgreementError>;
    }
}
