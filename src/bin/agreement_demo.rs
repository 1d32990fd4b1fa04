//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Drives one agreement through its lifecycle against the in-memory store and publishes every
// event, either to the configured RabbitMQ exchange or to an in-process broker whose queue is
// then drained into notifications after a reminder sweep.
//--------------------------------------------------------------------------------------------------
// To accept against a broker: cargo run --bin agreement_demo -- accept
// To cancel without a broker: cargo run --bin agreement_demo -- --local cancel
// Custom terms: cargo run --bin agreement_demo -- --local --principal 250 --rate 0.05 --payments 4 --frequency weekly accept

use std::sync::Arc;

use chrono::{Days, Utc};
use clap::{Parser, Subcommand};
use lending_notifications::{
    AgreementService, AppState, Config, ConsumerError, CreateAgreement, EventPublisher,
    NotificationConsumer, PostKind, PostSummary,
    domain::models::UserId,
    outbounds::{AmqpTransport, InMemoryBroker, InMemoryStore},
};
use rabbitmq::RabbitMQBuilder;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LENDER: UserId = 1;
const BORROWER: UserId = 2;
const LEND_POST: i64 = 1;

#[derive(Parser, Debug)]
#[command(name = "agreement_demo", about = "Runs an agreement through its lifecycle")]
struct Cli {
    #[command(subcommand)]
    flow: Flow,

    /// Publish to an in-process broker and print the resulting notifications
    #[arg(long)]
    local: bool,

    #[arg(long, default_value = "1000")]
    principal: Decimal,

    #[arg(long, default_value = "0.1")]
    rate: Decimal,

    #[arg(long, default_value_t = 30)]
    due_in_days: u64,

    #[arg(long, default_value = "monthly")]
    frequency: String,

    #[arg(long, default_value_t = 12)]
    payments: i64,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Flow {
    /// Create, accept, then try the transitions an active agreement refuses
    Accept,
    /// Create, then cancel as the borrower
    Cancel,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let store = Arc::new(InMemoryStore::with_posts([PostSummary {
        id: LEND_POST,
        author_id: LENDER,
        kind: PostKind::Lend,
    }]));

    if cli.local {
        let broker = InMemoryBroker::new(config.delivery_limit);
        let state = AppState::new(store.clone(), Arc::new(broker.clone()), &config);

        run_flow(&cli, state.agreements.as_ref()).await?;

        // Sweep as of the day before the due date
        let sweep_day = Utc::now().date_naive() + Days::new(cli.due_in_days.saturating_sub(1));
        let report = state.reminders().sweep(sweep_day).await?;
        info!(
            "Reminder sweep for {}: {} reminders, {} overdue alerts",
            sweep_day, report.reminders, report.overdue_alerts
        );
        log_metrics(&state.publisher);

        broker.close();
        let mut consumer = NotificationConsumer::new(broker.consumer(), state.materializer());
        match consumer.run(CancellationToken::new()).await {
            Ok(_) | Err(ConsumerError::StreamClosed) => {}
            Err(err) => return Err(err.into()),
        }

        for notification in store.all_notifications() {
            info!(
                "user {} <- [{}] {}: {}",
                notification.user_id, notification.kind, notification.title, notification.message
            );
        }
    } else {
        info!("Publishing to {} at {}", config.exchange, config.rabbitmq_url);
        let rabbit = RabbitMQBuilder::new(&config.rabbitmq_url, &config.app_id)
            .publisher(&config.exchange)
            .build()
            .await?;
        let transport = Arc::new(AmqpTransport::new(rabbit.get_dispatcher()));
        let state = AppState::new(store, transport, &config);

        run_flow(&cli, state.agreements.as_ref()).await?;
        log_metrics(&state.publisher);
        rabbit.close().await?;
    }

    Ok(())
}

async fn run_flow(cli: &Cli, agreements: &dyn AgreementService) -> anyhow::Result<()> {
    let due_date = Utc::now().date_naive() + Days::new(cli.due_in_days);

    let agreement = agreements
        .create(
            BORROWER,
            CreateAgreement {
                post_id: LEND_POST,
                principal_amount: cli.principal,
                interest_rate: cli.rate,
                due_date: due_date.format("%Y-%m-%d").to_string(),
                payment_frequency: cli.frequency.clone(),
                number_of_payments: cli.payments,
            },
        )
        .await?;
    info!(
        "Created agreement #{}: {} -> {} total {:.2} {} ({})",
        agreement.id,
        agreement.lender_id,
        agreement.borrower_id,
        agreement.total_amount,
        agreement.currency,
        agreement.status
    );

    match cli.flow {
        Flow::Accept => {
            let active = agreements.accept(agreement.id, LENDER).await?;
            info!("Accepted agreement #{} at {:?}", active.id, active.accepted_at);

            if let Err(err) = agreements.accept(agreement.id, LENDER).await {
                info!("Second accept rejected: {}", err);
            }
            if let Err(err) = agreements.cancel(agreement.id, BORROWER).await {
                info!("Cancel of an active agreement rejected: {}", err);
            }

            let with_contract = agreements.generate_contract(agreement.id, BORROWER).await?;
            info!(
                "Contract at {} (sha256 {})",
                with_contract.contract_url.unwrap_or_default(),
                with_contract.contract_hash.unwrap_or_default()
            );
        }
        Flow::Cancel => {
            let cancelled = agreements.cancel(agreement.id, BORROWER).await?;
            info!("Agreement #{} is now {}", cancelled.id, cancelled.status);
        }
    }

    Ok(())
}

fn log_metrics(publisher: &EventPublisher) {
    for (routing_key, counters) in publisher.metrics().snapshot() {
        info!(
            "{}: {} published, {} errors",
            routing_key, counters.published, counters.errors
        );
    }
}
