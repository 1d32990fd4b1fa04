use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::domain::{
    events::{AgreementAcceptedEvent, AgreementCancelledEvent, AgreementCreatedEvent, LendingEvent},
    models::{
        Agreement, AgreementId, AgreementStatus, NewAgreement, PaymentFrequency, PostKind,
        StatusUpdate, Transition, UserId, DEFAULT_CURRENCY,
    },
    ports::{AgreementStore, ContractGenerator},
    services::publisher::EventPublisher,
};

use super::{AgreementError, AgreementFilter, AgreementService, CreateAgreement};

const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

pub struct AgreementServiceImpl {
    store: Arc<dyn AgreementStore>,
    publisher: Arc<EventPublisher>,
    contracts: Arc<dyn ContractGenerator>,
}

impl AgreementServiceImpl {
    pub fn new(
        store: Arc<dyn AgreementStore>,
        publisher: Arc<EventPublisher>,
        contracts: Arc<dyn ContractGenerator>,
    ) -> Self {
        Self {
            store,
            publisher,
            contracts,
        }
    }

    async fn load(&self, id: AgreementId) -> Result<Agreement, AgreementError> {
        self.store
            .get_agreement(id)
            .await?
            .ok_or(AgreementError::AgreementNotFound)
    }

    /// Checks the transition against the snapshot, then issues the conditional write.
    /// A `false` from the store means a concurrent writer moved the agreement first.
    async fn transition(
        &self,
        agreement: &mut Agreement,
        transition: Transition,
        update: StatusUpdate,
    ) -> Result<(), AgreementError> {
        if agreement.status.apply(transition) != Some(update.status) {
            return Err(AgreementError::InvalidTransition(transition));
        }

        let applied = self
            .store
            .update_agreement_status(agreement.id, agreement.status, update.clone())
            .await?;
        if !applied {
            warn!(
                "agreement {} changed status concurrently, {} rejected",
                agreement.id, transition
            );
            return Err(AgreementError::InvalidTransition(transition));
        }

        agreement.apply_update(&update);
        Ok(())
    }

    /// Best effort: the committed state change stands whatever the outcome.
    async fn notify(&self, event: LendingEvent) {
        if let Err(err) = self.publisher.publish_event(&event).await {
            warn!(
                "state change committed but {} was not published: {}",
                event.routing_key(),
                err
            );
        }
    }
}

#[async_trait]
impl AgreementService for AgreementServiceImpl {
    async fn create(
        &self,
        requester_id: UserId,
        request: CreateAgreement,
    ) -> Result<Agreement, AgreementError> {
        let post = self
            .store
            .get_post_summary(request.post_id)
            .await?
            .ok_or(AgreementError::PostNotFound)?;
        if post.kind != PostKind::Lend {
            return Err(AgreementError::NotALendPost);
        }

        if request.principal_amount <= Decimal::ZERO {
            return Err(AgreementError::NonPositivePrincipal);
        }
        if request.interest_rate < Decimal::ZERO {
            return Err(AgreementError::NegativeInterestRate);
        }
        let total_amount = Agreement::total_for(request.principal_amount, request.interest_rate)
            .ok_or(AgreementError::AmountOutOfRange)?;

        let due_date = NaiveDate::parse_from_str(request.due_date.trim(), DUE_DATE_FORMAT)
            .map_err(|_| AgreementError::InvalidDueDate)?;
        if due_date <= Utc::now().date_naive() {
            return Err(AgreementError::DueDateNotInFuture);
        }

        if request.number_of_payments <= 0 {
            return Err(AgreementError::InvalidNumberOfPayments);
        }
        let number_of_payments = i32::try_from(request.number_of_payments)
            .map_err(|_| AgreementError::TooManyPayments)?;

        let payment_frequency: PaymentFrequency = request
            .payment_frequency
            .parse()
            .map_err(|_| AgreementError::InvalidPaymentFrequency)?;

        if post.author_id == requester_id {
            return Err(AgreementError::SelfDealing);
        }

        let new_agreement = NewAgreement {
            lender_id: post.author_id,
            borrower_id: requester_id,
            post_id: post.id,
            principal_amount: request.principal_amount,
            interest_rate: request.interest_rate,
            total_amount,
            currency: DEFAULT_CURRENCY.to_owned(),
            payment_frequency,
            number_of_payments,
            due_date,
        };

        let (id, created_at) = self.store.insert_agreement(new_agreement.clone()).await?;
        let agreement = new_agreement.into_agreement(id, created_at);
        info!(
            "agreement {} created on post {} (lender {}, borrower {})",
            agreement.id, agreement.post_id, agreement.lender_id, agreement.borrower_id
        );

        self.notify(AgreementCreatedEvent::from(&agreement).into())
            .await;
        Ok(agreement)
    }

    async fn accept(&self, id: AgreementId, requester_id: UserId) -> Result<Agreement, AgreementError> {
        let mut agreement = self.load(id).await?;
        if agreement.lender_id != requester_id {
            return Err(AgreementError::OnlyLenderCanAccept);
        }

        self.transition(&mut agreement, Transition::Accept, StatusUpdate::accepted(Utc::now()))
            .await?;
        info!("agreement {} accepted by lender {}", id, requester_id);

        self.notify(AgreementAcceptedEvent::from(&agreement).into())
            .await;
        Ok(agreement)
    }

    async fn cancel(&self, id: AgreementId, requester_id: UserId) -> Result<Agreement, AgreementError> {
        let mut agreement = self.load(id).await?;
        if !agreement.is_party(requester_id) {
            return Err(AgreementError::NotAuthorizedToCancel);
        }

        self.transition(&mut agreement, Transition::Cancel, StatusUpdate::cancelled())
            .await?;
        info!("agreement {} cancelled by user {}", id, requester_id);

        self.notify(AgreementCancelledEvent::from(&agreement).into())
            .await;
        Ok(agreement)
    }

    async fn attach_contract(
        &self,
        id: AgreementId,
        requester_id: UserId,
        contract_url: &str,
        contract_hash: &str,
    ) -> Result<Agreement, AgreementError> {
        let contract_url = contract_url.trim();
        if contract_url.is_empty() {
            return Err(AgreementError::ContractUrlRequired);
        }

        let mut agreement = self.load(id).await?;
        if agreement.lender_id != requester_id {
            return Err(AgreementError::OnlyLenderCanUpdateContract);
        }

        let contract_hash = Some(contract_hash.trim())
            .filter(|hash| !hash.is_empty())
            .map(str::to_owned);
        self.store
            .set_contract(id, contract_url.to_owned(), contract_hash.clone())
            .await?;

        agreement.contract_url = Some(contract_url.to_owned());
        agreement.contract_hash = contract_hash;
        Ok(agreement)
    }

    async fn generate_contract(
        &self,
        id: AgreementId,
        requester_id: UserId,
    ) -> Result<Agreement, AgreementError> {
        let mut agreement = self.load(id).await?;
        if !agreement.is_party(requester_id) {
            return Err(AgreementError::NotAuthorizedToGenerateContract);
        }
        if agreement.status != AgreementStatus::Active {
            return Err(AgreementError::ContractRequiresActiveAgreement);
        }

        let contract = self.contracts.generate(&agreement).await?;
        self.store
            .set_contract(
                id,
                contract.location.clone(),
                Some(contract.content_hash.clone()),
            )
            .await?;
        info!("contract for agreement {} stored at {}", id, contract.location);

        agreement.contract_url = Some(contract.location);
        agreement.contract_hash = Some(contract.content_hash);
        Ok(agreement)
    }

    async fn get(&self, id: AgreementId, requester_id: UserId) -> Result<Agreement, AgreementError> {
        let agreement = self.load(id).await?;
        if !agreement.is_party(requester_id) {
            return Err(AgreementError::NotAuthorizedToView);
        }
        Ok(agreement)
    }

    async fn list_for_user(
        &self,
        requester_id: UserId,
        filter: AgreementFilter,
    ) -> Result<Vec<Agreement>, AgreementError> {
        let agreements = self.store.list_agreements_for_user(requester_id).await?;

        Ok(agreements
            .into_iter()
            .filter(|a| filter.status.is_none_or(|status| a.status == status))
            .filter(|a| filter.role.is_none_or(|role| a.role_of(requester_id) == Some(role)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{Days, TimeZone};
    use mockall::predicate::{always, eq};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::{
        models::PostSummary,
        ports::{
            GeneratedContract, MockAgreementStore, MockContractGenerator, MockMessageTransport,
            StoreError, TransportError,
        },
        services::ErrorKind,
    };

    const LENDER: UserId = 1;
    const BORROWER: UserId = 2;

    fn lend_post() -> PostSummary {
        PostSummary {
            id: 1,
            author_id: LENDER,
            kind: PostKind::Lend,
        }
    }

    fn in_days(days: u64) -> String {
        (Utc::now().date_naive() + Days::new(days))
            .format(DUE_DATE_FORMAT)
            .to_string()
    }

    fn request() -> CreateAgreement {
        CreateAgreement {
            post_id: 1,
            principal_amount: dec!(1000),
            interest_rate: dec!(0.1),
            due_date: in_days(30),
            payment_frequency: "monthly".to_owned(),
            number_of_payments: 12,
        }
    }

    fn pending_agreement() -> Agreement {
        NewAgreement {
            lender_id: LENDER,
            borrower_id: BORROWER,
            post_id: 1,
            principal_amount: dec!(1000),
            interest_rate: dec!(0.1),
            total_amount: dec!(1100),
            currency: DEFAULT_CURRENCY.to_owned(),
            payment_frequency: PaymentFrequency::Monthly,
            number_of_payments: 12,
            due_date: Utc::now().date_naive() + Days::new(30),
        }
        .into_agreement(5, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
    }

    fn accepting_transport() -> MockMessageTransport {
        let mut transport = MockMessageTransport::new();
        transport.expect_send().returning(|_, _| Ok(()));
        transport
    }

    fn service(store: MockAgreementStore, transport: MockMessageTransport) -> AgreementServiceImpl {
        service_with_contracts(store, transport, MockContractGenerator::new())
    }

    fn service_with_contracts(
        store: MockAgreementStore,
        transport: MockMessageTransport,
        contracts: MockContractGenerator,
    ) -> AgreementServiceImpl {
        let publisher = EventPublisher::new(Arc::new(transport), Duration::from_secs(1));
        AgreementServiceImpl::new(Arc::new(store), Arc::new(publisher), Arc::new(contracts))
    }

    fn store_with_post(post: Option<PostSummary>) -> MockAgreementStore {
        let mut store = MockAgreementStore::new();
        store
            .expect_get_post_summary()
            .returning(move |_| Ok(post.clone()));
        store
    }

    #[tokio::test]
    async fn create_derives_parties_and_total() {
        let mut store = store_with_post(Some(lend_post()));
        store
            .expect_insert_agreement()
            .withf(|new| {
                new.lender_id == LENDER
                    && new.borrower_id == BORROWER
                    && new.total_amount == dec!(1100)
                    && new.currency == "KZT"
            })
            .times(1)
            .returning(|_| Ok((5, Utc::now())));

        let mut transport = MockMessageTransport::new();
        transport
            .expect_send()
            .with(eq("agreement.created"), always())
            .times(1)
            .returning(|_, _| Ok(()));

        let agreement = service(store, transport)
            .create(BORROWER, request())
            .await
            .unwrap();

        assert_eq!(agreement.id, 5);
        assert_eq!(agreement.status, AgreementStatus::Pending);
        assert_eq!(agreement.payment_frequency, PaymentFrequency::Monthly);
        assert!(agreement.accepted_at.is_none());
    }

    #[tokio::test]
    async fn create_rejects_invalid_terms_in_order() {
        let cases: Vec<(CreateAgreement, &str)> = vec![
            (
                CreateAgreement {
                    principal_amount: dec!(0),
                    interest_rate: dec!(-1),
                    ..request()
                },
                "principal_amount must be greater than 0",
            ),
            (
                CreateAgreement {
                    interest_rate: dec!(-0.01),
                    due_date: "soon".to_owned(),
                    ..request()
                },
                "interest_rate cannot be negative",
            ),
            (
                CreateAgreement {
                    due_date: "15/01/2030".to_owned(),
                    number_of_payments: 0,
                    ..request()
                },
                "invalid due_date format, use YYYY-MM-DD",
            ),
            (
                CreateAgreement {
                    principal_amount: Decimal::MAX / Decimal::TWO,
                    interest_rate: dec!(1.5),
                    due_date: "soon".to_owned(),
                    ..request()
                },
                "principal_amount is too large",
            ),
            (
                CreateAgreement {
                    due_date: in_days(0),
                    ..request()
                },
                "due_date must be in the future",
            ),
            (
                CreateAgreement {
                    due_date: (Utc::now().date_naive() - Days::new(1))
                        .format(DUE_DATE_FORMAT)
                        .to_string(),
                    ..request()
                },
                "due_date must be in the future",
            ),
            (
                CreateAgreement {
                    number_of_payments: 0,
                    payment_frequency: "yearly".to_owned(),
                    ..request()
                },
                "number_of_payments must be greater than 0",
            ),
            (
                CreateAgreement {
                    number_of_payments: i64::from(i32::MAX) + 1,
                    payment_frequency: "yearly".to_owned(),
                    ..request()
                },
                "number_of_payments is too large",
            ),
            (
                CreateAgreement {
                    payment_frequency: "yearly".to_owned(),
                    ..request()
                },
                "invalid payment_frequency",
            ),
        ];

        for (request, expected) in cases {
            let mut store = store_with_post(Some(lend_post()));
            store.expect_insert_agreement().never();

            let err = service(store, MockMessageTransport::new())
                .create(BORROWER, request)
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), expected);
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[tokio::test]
    async fn create_requires_an_existing_lend_post() {
        let err = service(store_with_post(None), MockMessageTransport::new())
            .create(BORROWER, request())
            .await
            .unwrap_err();
        assert!(matches!(err, AgreementError::PostNotFound));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let borrow_post = PostSummary {
            kind: PostKind::Borrow,
            ..lend_post()
        };
        let err = service(store_with_post(Some(borrow_post)), MockMessageTransport::new())
            .create(BORROWER, request())
            .await
            .unwrap_err();
        assert!(matches!(err, AgreementError::NotALendPost));
    }

    #[tokio::test]
    async fn create_rejects_self_dealing_for_any_terms() {
        for (principal, rate, days) in [
            (dec!(1), dec!(0), 1),
            (dec!(1000), dec!(0.1), 30),
            (dec!(999999.99), dec!(2.5), 365),
        ] {
            let mut store = store_with_post(Some(lend_post()));
            store.expect_insert_agreement().never();

            let request = CreateAgreement {
                principal_amount: principal,
                interest_rate: rate,
                due_date: in_days(days),
                ..request()
            };
            let err = service(store, MockMessageTransport::new())
                .create(LENDER, request)
                .await
                .unwrap_err();
            assert!(matches!(err, AgreementError::SelfDealing));
        }
    }

    #[tokio::test]
    async fn accept_is_lender_only() {
        let mut store = MockAgreementStore::new();
        store
            .expect_get_agreement()
            .returning(|_| Ok(Some(pending_agreement())));
        store.expect_update_agreement_status().never();

        let err = service(store, MockMessageTransport::new())
            .accept(5, BORROWER)
            .await
            .unwrap_err();
        assert!(matches!(err, AgreementError::OnlyLenderCanAccept));
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[tokio::test]
    async fn accept_stamps_start_and_acceptance_together() {
        let mut store = MockAgreementStore::new();
        store
            .expect_get_agreement()
            .returning(|_| Ok(Some(pending_agreement())));
        store
            .expect_update_agreement_status()
            .with(eq(5), eq(AgreementStatus::Pending), always())
            .times(1)
            .returning(|_, _, _| Ok(true));

        let agreement = service(store, accepting_transport())
            .accept(5, LENDER)
            .await
            .unwrap();

        assert_eq!(agreement.status, AgreementStatus::Active);
        assert!(agreement.accepted_at.is_some());
        assert_eq!(agreement.accepted_at, agreement.start_date);
    }

    #[tokio::test]
    async fn lost_conditional_write_is_a_transition_conflict() {
        let mut store = MockAgreementStore::new();
        store
            .expect_get_agreement()
            .returning(|_| Ok(Some(pending_agreement())));
        store
            .expect_update_agreement_status()
            .returning(|_, _, _| Ok(false));

        let mut transport = MockMessageTransport::new();
        transport.expect_send().never();

        let err = service(store, transport).cancel(5, BORROWER).await.unwrap_err();
        assert_eq!(err.to_string(), "can only cancel pending agreements");
    }

    #[tokio::test]
    async fn publish_failure_keeps_the_state_change() {
        let mut store = MockAgreementStore::new();
        store
            .expect_get_agreement()
            .returning(|_| Ok(Some(pending_agreement())));
        store
            .expect_update_agreement_status()
            .times(1)
            .returning(|_, _, _| Ok(true));

        let mut transport = MockMessageTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_, _| Err(TransportError("broker unreachable".to_owned())));

        let service = service(store, transport);
        let agreement = service.cancel(5, LENDER).await.unwrap();

        assert_eq!(agreement.status, AgreementStatus::Cancelled);
        assert_eq!(service.publisher.metrics().errors("agreement.cancelled"), 1);
    }

    #[tokio::test]
    async fn cancel_rejects_outsiders_and_active_agreements() {
        let mut store = MockAgreementStore::new();
        store.expect_get_agreement().returning(|_| {
            let mut agreement = pending_agreement();
            agreement.status = AgreementStatus::Active;
            Ok(Some(agreement))
        });
        store.expect_update_agreement_status().never();
        let service = service(store, MockMessageTransport::new());

        let err = service.cancel(5, 99).await.unwrap_err();
        assert!(matches!(err, AgreementError::NotAuthorizedToCancel));

        let err = service.cancel(5, BORROWER).await.unwrap_err();
        assert!(matches!(err, AgreementError::InvalidTransition(Transition::Cancel)));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn store_failures_are_internal() {
        let mut store = MockAgreementStore::new();
        store
            .expect_get_agreement()
            .returning(|_| Err(StoreError::Unavailable("connection reset".to_owned())));

        let err = service(store, MockMessageTransport::new())
            .get(5, LENDER)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn attach_contract_validates_url_then_lender() {
        let mut store = MockAgreementStore::new();
        store
            .expect_get_agreement()
            .returning(|_| Ok(Some(pending_agreement())));
        store
            .expect_set_contract()
            .with(eq(5), eq("https://docs/c.pdf".to_owned()), eq(None::<String>))
            .times(1)
            .returning(|_, _, _| Ok(()));
        let service = service(store, MockMessageTransport::new());

        let err = service.attach_contract(5, LENDER, "   ", "abc").await.unwrap_err();
        assert!(matches!(err, AgreementError::ContractUrlRequired));

        let err = service
            .attach_contract(5, BORROWER, "https://docs/c.pdf", "")
            .await
            .unwrap_err();
        assert!(matches!(err, AgreementError::OnlyLenderCanUpdateContract));

        let agreement = service
            .attach_contract(5, LENDER, " https://docs/c.pdf ", "  ")
            .await
            .unwrap();
        assert_eq!(agreement.contract_url.as_deref(), Some("https://docs/c.pdf"));
        assert_eq!(agreement.contract_hash, None);
        assert_eq!(agreement.status, AgreementStatus::Pending);
    }

    #[tokio::test]
    async fn generate_contract_requires_active_agreement() {
        let mut store = MockAgreementStore::new();
        store
            .expect_get_agreement()
            .returning(|_| Ok(Some(pending_agreement())));
        let mut contracts = MockContractGenerator::new();
        contracts.expect_generate().never();

        let err = service_with_contracts(store, MockMessageTransport::new(), contracts)
            .generate_contract(5, BORROWER)
            .await
            .unwrap_err();
        assert!(matches!(err, AgreementError::ContractRequiresActiveAgreement));
    }

    #[tokio::test]
    async fn generate_contract_persists_location_and_hash() {
        let mut store = MockAgreementStore::new();
        store.expect_get_agreement().returning(|_| {
            let mut agreement = pending_agreement();
            agreement.status = AgreementStatus::Active;
            Ok(Some(agreement))
        });
        store
            .expect_set_contract()
            .with(
                eq(5),
                eq("contracts/agreements/5/contract.txt".to_owned()),
                eq(Some("deadbeef".to_owned())),
            )
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut contracts = MockContractGenerator::new();
        contracts.expect_generate().times(1).returning(|_| {
            Ok(GeneratedContract {
                location: "contracts/agreements/5/contract.txt".to_owned(),
                content_hash: "deadbeef".to_owned(),
            })
        });

        let agreement = service_with_contracts(store, MockMessageTransport::new(), contracts)
            .generate_contract(5, BORROWER)
            .await
            .unwrap();
        assert_eq!(agreement.contract_hash.as_deref(), Some("deadbeef"));
        assert_eq!(agreement.status, AgreementStatus::Active);
    }

    #[tokio::test]
    async fn list_filters_on_status_and_role() {
        let mut as_lender = pending_agreement();
        as_lender.id = 1;
        let mut as_borrower = pending_agreement();
        as_borrower.id = 2;
        as_borrower.lender_id = 7;
        as_borrower.borrower_id = LENDER;
        as_borrower.status = AgreementStatus::Active;

        let mut store = MockAgreementStore::new();
        store
            .expect_list_agreements_for_user()
            .with(eq(LENDER))
            .returning(move |_| Ok(vec![as_lender.clone(), as_borrower.clone()]));
        let service = service(store, MockMessageTransport::new());

        let all = service
            .list_for_user(LENDER, AgreementFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let borrowing = service
            .list_for_user(
                LENDER,
                AgreementFilter {
                    role: Some(crate::domain::models::PartyRole::Borrower),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(borrowing.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2]);

        let pending = service
            .list_for_user(
                LENDER,
                AgreementFilter {
                    status: Some(AgreementStatus::Pending),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(pending.iter().map(|a| a.id).collect::<Vec<_>>(), vec![1]);
    }
}
