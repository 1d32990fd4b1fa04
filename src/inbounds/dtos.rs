use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    models::{AgreementStatus, PartyRole, PostId},
    services::agreement::{AgreementFilter, CreateAgreement},
};

use super::api_error::ApiError;

/// +----------------------------------------------------------+
/// | STRUCTS | TRAITS | ENUMS | FUNCTIONS                     |
/// +----------+-------+-------+------------------------------+
/// | Structs:                                                 |
/// |   - CreateAgreementRequest                               |
/// |   - AttachContractRequest                                |
/// |   - ListAgreementsQuery                                  |
/// |   - ListNotificationsQuery                               |
/// |   - MarkAllReadResponse                                  |
/// | Implementations:                                         |
/// |   - From<CreateAgreementRequest> for CreateAgreement     |
/// |   - TryFrom<ListAgreementsQuery> for AgreementFilter     |
/// +----------------------------------------------------------+

/// Body of a create-agreement request. The requester becomes the borrower.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAgreementRequest {
    /// Lend post the agreement is opened on.
    pub post_id: PostId,

    pub principal_amount: Decimal,

    /// Fraction, `0.1` is ten percent.
    pub interest_rate: Decimal,

    /// Calendar date, `YYYY-MM-DD`.
    pub due_date: String,

    /// `one_time`, `weekly`, `biweekly` or `monthly`.
    pub payment_frequency: String,

    pub number_of_payments: i64,
}

impl From<CreateAgreementRequest> for CreateAgreement {
    fn from(request: CreateAgreementRequest) -> Self {
        CreateAgreement {
            post_id: request.post_id,
            principal_amount: request.principal_amount,
            interest_rate: request.interest_rate,
            due_date: request.due_date,
            payment_frequency: request.payment_frequency,
            number_of_payments: request.number_of_payments,
        }
    }
}

/// Body of a manual contract upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttachContractRequest {
    #[serde(default)]
    pub contract_url: String,

    #[serde(default)]
    pub contract_hash: String,
}

/// Query parameters of the agreement listing. Empty values mean no filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListAgreementsQuery {
    #[serde(default)]
    pub status: Option<String>,

    /// `lender` or `borrower`.
    #[serde(default)]
    pub role: Option<String>,
}

impl TryFrom<ListAgreementsQuery> for AgreementFilter {
    type Error = ApiError;

    fn try_from(query: ListAgreementsQuery) -> Result<Self, Self::Error> {
        let status = non_empty(query.status)
            .map(|s| s.parse::<AgreementStatus>())
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let role = non_empty(query.role)
            .map(|r| r.parse::<PartyRole>())
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        Ok(AgreementFilter { status, role })
    }
}

/// Query parameters of the notification listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListNotificationsQuery {
    /// `"true"` or `"false"`; anything else lists everything.
    #[serde(default)]
    pub read: Option<String>,
}

impl ListNotificationsQuery {
    pub fn read_filter(&self) -> Option<bool> {
        match self.read.as_deref() {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn create_request_from_json() {
        let body = r#"{
            "post_id": 1,
            "principal_amount": 1000,
            "interest_rate": 0.1,
            "due_date": "2030-01-31",
            "payment_frequency": "monthly",
            "number_of_payments": 12
        }"#;

        let request: CreateAgreementRequest = serde_json::from_str(body).unwrap();
        let command = CreateAgreement::from(request);

        assert_eq!(command.post_id, 1);
        assert_eq!(command.principal_amount, dec!(1000));
        assert_eq!(command.interest_rate, dec!(0.1));
        assert_eq!(command.due_date, "2030-01-31");
        assert_eq!(command.number_of_payments, 12);
    }

    #[test]
    fn agreement_filter_from_query() {
        let filter = AgreementFilter::try_from(ListAgreementsQuery {
            status: Some("active".to_owned()),
            role: Some(String::new()),
        })
        .unwrap();
        assert_eq!(filter.status, Some(AgreementStatus::Active));
        assert_eq!(filter.role, None);

        let err = AgreementFilter::try_from(ListAgreementsQuery {
            status: None,
            role: Some("broker".to_owned()),
        })
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn read_filter_ignores_unknown_values() {
        let query = |read: &str| ListNotificationsQuery {
            read: Some(read.to_owned()),
        };

        assert_eq!(query("true").read_filter(), Some(true));
        assert_eq!(query("false").read_filter(), Some(false));
        assert_eq!(query("yes").read_filter(), None);
        assert_eq!(ListNotificationsQuery::default().read_filter(), None);
    }
}
