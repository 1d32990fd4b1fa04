use std::sync::Arc;

use tracing::{error, info};

use crate::domain::{
    models::{Agreement, AgreementId, UserId},
    services::agreement::{AgreementError, AgreementFilter, AgreementService},
};

use super::super::{
    api_error::ApiError,
    dtos::{AttachContractRequest, CreateAgreementRequest, ListAgreementsQuery},
};

/// +----------------------------------------------------------+
/// | STRUCTS | TRAITS | ENUMS | FUNCTIONS                     |
/// +----------+-------+-------+------------------------------+
/// | Functions:                                               |
/// |   - handle_create_request                                |
/// |   - handle_accept_request                                |
/// |   - handle_cancel_request                                |
/// |   - handle_attach_contract_request                       |
/// |   - handle_generate_contract_request                     |
/// |   - handle_get_request                                   |
/// |   - handle_list_request                                  |
/// +----------------------------------------------------------+

/// Processes a create-agreement request from a JSON payload.
///
/// # Arguments
///
/// * `request` - The raw JSON body containing a `CreateAgreementRequest`
/// * `requester_id` - Authenticated user, becomes the borrower
/// * `agreements` - The agreement state machine
///
/// # Error Handling
///
/// * Deserialization errors are converted to `ApiError::BadRequest`
/// * Service rejections are logged and mapped by their kind
pub async fn handle_create_request(
    request: Vec<u8>,
    requester_id: UserId,
    agreements: Arc<dyn AgreementService>,
) -> Result<Agreement, ApiError> {
    let create_request: CreateAgreementRequest = serde_json::from_slice(&request)
        .map_err(|e| ApiError::BadRequest(format!("Invalid create request: {}", e)))?;

    info!(
        "Creating agreement on post {} for borrower {}",
        create_request.post_id, requester_id
    );

    agreements
        .create(requester_id, create_request.into())
        .await
        .map_err(log_rejection)
}

pub async fn handle_accept_request(
    id: AgreementId,
    requester_id: UserId,
    agreements: Arc<dyn AgreementService>,
) -> Result<Agreement, ApiError> {
    info!("Accepting agreement {} by user {}", id, requester_id);
    agreements
        .accept(id, requester_id)
        .await
        .map_err(log_rejection)
}

pub async fn handle_cancel_request(
    id: AgreementId,
    requester_id: UserId,
    agreements: Arc<dyn AgreementService>,
) -> Result<Agreement, ApiError> {
    info!("Cancelling agreement {} by user {}", id, requester_id);
    agreements
        .cancel(id, requester_id)
        .await
        .map_err(log_rejection)
}

/// Stores a manually produced contract from a JSON `AttachContractRequest`.
pub async fn handle_attach_contract_request(
    id: AgreementId,
    requester_id: UserId,
    request: Vec<u8>,
    agreements: Arc<dyn AgreementService>,
) -> Result<Agreement, ApiError> {
    let attach_request: AttachContractRequest = serde_json::from_slice(&request)
        .map_err(|e| ApiError::BadRequest(format!("Invalid contract request: {}", e)))?;

    agreements
        .attach_contract(
            id,
            requester_id,
            &attach_request.contract_url,
            &attach_request.contract_hash,
        )
        .await
        .map_err(log_rejection)
}

pub async fn handle_generate_contract_request(
    id: AgreementId,
    requester_id: UserId,
    agreements: Arc<dyn AgreementService>,
) -> Result<Agreement, ApiError> {
    agreements
        .generate_contract(id, requester_id)
        .await
        .map_err(log_rejection)
}

pub async fn handle_get_request(
    id: AgreementId,
    requester_id: UserId,
    agreements: Arc<dyn AgreementService>,
) -> Result<Agreement, ApiError> {
    agreements
        .get(id, requester_id)
        .await
        .map_err(log_rejection)
}

pub async fn handle_list_request(
    requester_id: UserId,
    query: ListAgreementsQuery,
    agreements: Arc<dyn AgreementService>,
) -> Result<Vec<Agreement>, ApiError> {
    let filter = AgreementFilter::try_from(query)?;
    agreements
        .list_for_user(requester_id, filter)
        .await
        .map_err(log_rejection)
}

fn log_rejection(err: AgreementError) -> ApiError {
    error!("Agreement request rejected: {err}");
    ApiError::from(err)
}
