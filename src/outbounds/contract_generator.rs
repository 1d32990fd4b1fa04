use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::info;

use crate::domain::{
    models::Agreement,
    ports::{ContractError, ContractGenerator, GeneratedContract},
};

/// Writes a plain-text contract to `<root>/agreements/<id>/contract.txt`.
pub struct TextContractGenerator {
    root: PathBuf,
}

impl TextContractGenerator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn render(agreement: &Agreement) -> String {
        let mut lines = vec![
            format!("LOAN AGREEMENT #{}", agreement.id),
            String::new(),
            format!("Lender:              user #{}", agreement.lender_id),
            format!("Borrower:            user #{}", agreement.borrower_id),
            format!("Post:                #{}", agreement.post_id),
            format!(
                "Principal:           {:.2} {}",
                agreement.principal_amount, agreement.currency
            ),
            format!("Interest rate:       {}", agreement.interest_rate),
            format!(
                "Total to repay:      {:.2} {}",
                agreement.total_amount, agreement.currency
            ),
            format!(
                "Repayment:           {} payment(s), {}",
                agreement.number_of_payments, agreement.payment_frequency
            ),
        ];
        if let Some(start_date) = agreement.start_date {
            lines.push(format!("Start date:          {}", start_date.format("%Y-%m-%d")));
        }
        lines.push(format!("Due date:            {}", agreement.due_date.format("%Y-%m-%d")));
        lines.push(format!("Status:              {}", agreement.status));

        let mut document = lines.join("\n");
        document.push('\n');
        document
    }
}

#[async_trait]
impl ContractGenerator for TextContractGenerator {
    async fn generate(&self, agreement: &Agreement) -> Result<GeneratedContract, ContractError> {
        let document = Self::render(agreement);
        let content_hash = hex::encode(Sha256::digest(document.as_bytes()));

        let dir = self
            .root
            .join("agreements")
            .join(agreement.id.to_string());
        fs::create_dir_all(&dir).await?;
        let path = dir.join("contract.txt");
        fs::write(&path, document.as_bytes()).await?;

        info!("contract for agreement {} written to {}", agreement.id, path.display());
        Ok(GeneratedContract {
            location: path.to_string_lossy().into_owned(),
            content_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::models::{
        AgreementStatus, NewAgreement, PaymentFrequency, StatusUpdate, DEFAULT_CURRENCY,
    };

    fn active_agreement() -> Agreement {
        let mut agreement = NewAgreement {
            lender_id: 1,
            borrower_id: 2,
            post_id: 1,
            principal_amount: dec!(1000),
            interest_rate: dec!(0.1),
            total_amount: dec!(1100),
            currency: DEFAULT_CURRENCY.to_owned(),
            payment_frequency: PaymentFrequency::Monthly,
            number_of_payments: 12,
            due_date: NaiveDate::from_ymd_opt(2030, 1, 31).unwrap(),
        }
        .into_agreement(42, Utc::now());
        agreement.apply_update(&StatusUpdate::accepted(Utc::now()));
        agreement
    }

    #[tokio::test]
    async fn writes_contract_and_hashes_its_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let generator = TextContractGenerator::new(dir.path());
        let agreement = active_agreement();
        assert_eq!(agreement.status, AgreementStatus::Active);

        let contract = generator.generate(&agreement).await.unwrap();

        let expected_path = dir.path().join("agreements").join("42").join("contract.txt");
        assert_eq!(contract.location, expected_path.to_string_lossy());

        let written = std::fs::read(&expected_path).unwrap();
        assert_eq!(contract.content_hash, hex::encode(Sha256::digest(&written)));
        assert_eq!(contract.content_hash.len(), 64);

        let text = String::from_utf8(written).unwrap();
        assert!(text.starts_with("LOAN AGREEMENT #42"));
        assert!(text.contains("Total to repay:      1100.00 KZT"));
        assert!(text.contains("Due date:            2030-01-31"));
    }

    #[tokio::test]
    async fn same_agreement_renders_same_hash() {
        let dir = tempfile::tempdir().unwrap();
        let generator = TextContractGenerator::new(dir.path());
        let agreement = active_agreement();

        let first = generator.generate(&agreement).await.unwrap();
        let second = generator.generate(&agreement).await.unwrap();
        assert_eq!(first.content_hash, second.content_hash);
    }
}
