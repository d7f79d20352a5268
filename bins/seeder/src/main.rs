//! Development seeder for Liquida.
//!
//! Drives one sample settlement from draft to settled against the in-memory
//! store, including a deposit captured through the partner search and one
//! correction round, then logs the resulting revision history.
//!
//! Usage: cargo run --bin seeder

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use liquida_core::invoice::{InvoiceInput, InvoicePatch};
use liquida_core::payment::{LookupOutcome, RawPaymentInput, StaticPartnerDirectory};
use liquida_core::settlement::{CreateSettlementInput, InMemorySettlementStore, Settlement};
use liquida_core::workflow::{
    Actor, CorrectableField, DisbursementConfirmation, Role, TransitionOutcome,
};
use liquida_core::SettlementService;
use liquida_shared::AppConfig;
use liquida_shared::types::{BudgetId, UserId};

/// Authorization codes used when none are configured.
const DEMO_AUTHORIZATION_CODES: [&str; 3] = ["AUT-001", "AUT-002", "AUT-003"];

type Service = SettlementService<InMemorySettlementStore, StaticPartnerDirectory>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log.filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.settlement.authorization_codes.is_empty() {
        info!("No authorization codes configured, using demo catalog");
        config.settlement.authorization_codes =
            DEMO_AUTHORIZATION_CODES.iter().map(ToString::to_string).collect();
    }

    let store = Arc::new(InMemorySettlementStore::new());
    let service = SettlementService::new(&config.settlement, store, Arc::new(demo_directory()))?;
    info!(currency = %service.currency(), "Seeding sample settlement");

    let owner = Actor::new(UserId::new(), Role::Requester);
    let reviewer = Actor::new(UserId::new(), Role::Reviewer);
    let authorizer = Actor::new(UserId::new(), Role::Authorizer);

    let authorization = config.settlement.authorization_codes[0].clone();
    let actors = [owner, reviewer, authorizer];
    let settlement = seed_settlement(&service, &actors, &authorization).await?;

    info!(
        settlement_id = %settlement.id,
        state = %settlement.state,
        version = settlement.version,
        "Seeding complete"
    );
    for entry in service.get_history(settlement.id).await? {
        info!(
            sequence = entry.sequence,
            event = %entry.event,
            from = %entry.prior_state,
            to = %entry.new_state,
            changes = entry.changes.len(),
            comment = entry.comment.as_deref().unwrap_or(""),
            "Revision"
        );
    }

    Ok(())
}

fn demo_directory() -> StaticPartnerDirectory {
    StaticPartnerDirectory::new()
        .with_partner(
            "SOC-0001",
            "Maria Choc",
            &[("3001-22", "AHORRO"), ("3001-23", "APORTACIONES")],
        )
        .with_partner("SOC-0002", "Mario Tzul", &[("4100-01", "AHORRO")])
}

/// Runs the sample lifecycle. `actors` are owner, reviewer and authorizer.
async fn seed_settlement(
    service: &Service,
    [owner, reviewer, authorizer]: &[Actor; 3],
    authorization: &str,
) -> anyhow::Result<Settlement> {
    let invoice = |document: &str, amount: &str| InvoiceInput {
        document_number: Some(document.to_string()),
        issue_date: Some("2026-03-02".to_string()),
        authorization_number: Some(authorization.to_string()),
        issuer_name: Some("Hotel y Restaurante Los Altos".to_string()),
        total_amount: Some(amount.to_string()),
        currency: None,
    };

    let s = service
        .create_settlement(
            owner,
            CreateSettlementInput {
                budget_id: BudgetId::new(),
                declared_total: Decimal::new(85_000, 2),
                description: Some("Capacitacion regional Quetzaltenango".to_string()),
            },
        )
        .await?;
    info!(settlement_id = %s.id, "Settlement created");

    let s = service
        .add_invoice(s.id, owner, s.version, &invoice("FAC-2026-0101", "600.00"))
        .await?;
    let s = service
        .add_invoice(s.id, owner, s.version, &invoice("FAC-2026-0102", "250.00"))
        .await?;

    let search = service.deposit_search();
    let LookupOutcome::Ready(partners) = search.search("maria").await? else {
        bail!("Partner search did not complete");
    };
    info!(found = partners.len(), "Partners found");
    search.select_partner("SOC-0001").await?;
    search.choose_account("3001-22").await?;
    let s = service
        .capture_deposit_payment(
            s.id,
            owner,
            s.version,
            &search,
            &RawPaymentInput::with_amount("850.00").note("Reintegro de viaticos"),
        )
        .await?;

    let s = applied(service.submit(s.id, owner, s.version).await?)?;
    let s = applied(service.begin_review(s.id, reviewer, s.version).await?)?;
    let s = applied(
        service
            .request_correction(
                s.id,
                reviewer,
                s.version,
                "El monto de FAC-2026-0102 no coincide con el documento",
                BTreeSet::from([CorrectableField::InvoiceAmount, CorrectableField::Invoices]),
            )
            .await?,
    )?;

    let hotel = s
        .invoices
        .iter()
        .find(|i| i.document_number == "FAC-2026-0102")
        .map(|i| i.id)
        .context("Seeded invoice missing")?;
    let s = service
        .amend_invoice(
            s.id,
            owner,
            s.version,
            hotel,
            &InvoicePatch {
                total_amount: Some("200.00".to_string()),
                ..InvoicePatch::default()
            },
        )
        .await?;
    let s = service
        .add_invoice(s.id, owner, s.version, &invoice("FAC-2026-0140", "50.00"))
        .await?;

    let s = applied(
        service
            .resubmit(s.id, owner, s.version, Some("Monto corregido"))
            .await?,
    )?;
    let s = applied(service.begin_review(s.id, reviewer, s.version).await?)?;
    let s = applied(service.approve(s.id, authorizer, s.version, None).await?)?;
    applied(
        service
            .settle(
                s.id,
                authorizer,
                s.version,
                DisbursementConfirmation {
                    reference: "TRX-2026-55120".to_string(),
                    confirmed_at: Utc::now(),
                },
            )
            .await?,
    )
}

fn applied(outcome: TransitionOutcome) -> anyhow::Result<Settlement> {
    match outcome {
        TransitionOutcome::Applied { settlement, .. } => Ok(settlement),
        TransitionOutcome::NoChange { settlement } => {
            bail!("Settlement {} was already {}", settlement.id, settlement.state)
        }
    }
}
