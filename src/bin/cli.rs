use anyhow::Result;
use chrono::{Duration, Utc};
use colored::*;
use covwatch::adverse::NewAdverseEvent;
use covwatch::core::{CovenantBackend, CovenantEngine, EngineConfig, EngineProviders};
use covwatch::extraction::{JobPriority, JobStatus, RawCandidate};
use covwatch::model::{
    AdverseEventType, CheckFrequency, ComparisonOperator, Covenant, CovenantType,
    FinancialSnapshot, PeriodType,
};
use covwatch::providers::memory::{
    CannedEventRisk, CannedExtraction, CannedNarrative, InMemoryAdverseEvents, InMemoryAlertSink,
    InMemoryCovenantStore, InMemoryFinancials,
};
use covwatch::providers::CovenantStore;
use std::sync::Arc;
use structopt::StructOpt;
use uuid::Uuid;

#[derive(StructOpt)]
#[structopt(name = "covwatch-cli", about = "Covenant compliance engine demo")]
enum Command {
    /// Evaluate every covenant of the demo borrower
    Evaluate,
    /// Aggregate the demo borrower's adverse-event risk
    Risk,
    /// Run a contract-text extraction through the local queue
    Extract,
    /// Show extraction queue statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let command = Command::from_args();

    let config = EngineConfig::from_env()?;
    let fixtures = seed().await?;
    let engine = CovenantEngine::new(config, fixtures.providers);

    match command {
        Command::Evaluate => {
            let batch = engine.recalculate_borrower(fixtures.borrower_id).await?;
            for outcome in &batch.evaluated {
                let status = outcome.health.status.to_string();
                let colored_status = match outcome.health.status {
                    covwatch::model::ComplianceStatus::Compliant => status.green(),
                    covwatch::model::ComplianceStatus::Warning => status.yellow(),
                    covwatch::model::ComplianceStatus::Breached => status.red(),
                };
                println!(
                    "{}  covenant {}  value {:?}  trend {}",
                    colored_status,
                    outcome.health.covenant_id,
                    outcome.health.current_value,
                    outcome.health.trend
                );
                if let Some(alert) = &outcome.alert {
                    println!("  {} {}", "ALERT".red().bold(), alert.title);
                }
            }
            for (covenant_id, error) in &batch.failures {
                println!("{}  covenant {}: {}", "unavailable".dimmed(), covenant_id, error);
            }
        }
        Command::Risk => {
            engine
                .ingest_adverse_event(NewAdverseEvent {
                    borrower_id: fixtures.borrower_id,
                    event_type: AdverseEventType::RatingAction,
                    headline: "Agency downgrade to B-".to_string(),
                    description: "Outlook negative on refinancing risk".to_string(),
                    source: "demo".to_string(),
                    event_date: Utc::now().date_naive(),
                })
                .await?;
            let aggregation = engine.aggregate_borrower_risk(fixtures.borrower_id).await?;
            println!(
                "aggregate risk {:.1}/10 over {} events, trend {:?}",
                aggregation.aggregate_risk_score, aggregation.event_count, aggregation.trend
            );
            for factor in &aggregation.risk_factors {
                println!("  - {}", factor);
            }
        }
        Command::Extract => {
            let outcome = engine
                .enqueue_extraction(
                    Uuid::new_v4(),
                    fixtures.borrower_id,
                    "Borrower shall maintain Debt/EBITDA below 3.0x".to_string(),
                    JobPriority::Normal,
                )
                .await;
            let job_id = outcome.job_id();
            println!("queued extraction job {}", job_id);

            loop {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                match engine.job_status(job_id).await {
                    Some(job) if job.status.is_terminal() => {
                        match job.status {
                            JobStatus::Completed => println!(
                                "{}: {} covenants extracted",
                                "completed".green(),
                                job.covenants_extracted
                            ),
                            _ => println!(
                                "{}: {}",
                                "failed".red(),
                                job.error.unwrap_or_default()
                            ),
                        }
                        break;
                    }
                    Some(_) => continue,
                    None => break,
                }
            }
        }
        Command::Stats => {
            let stats = engine.queue_stats().await;
            println!(
                "pending {}  processing {}  completed {}  failed {}",
                stats.pending, stats.processing, stats.completed, stats.failed
            );
        }
    }
    Ok(())
}

struct Fixtures {
    providers: EngineProviders,
    borrower_id: Uuid,
}

/// Seed a borrower with four quarters of figures and one leverage covenant.
async fn seed() -> Result<Fixtures> {
    let borrower_id = Uuid::new_v4();
    let financials = Arc::new(InMemoryFinancials::new());
    let today = Utc::now().date_naive();
    for (quarters_ago, debt, ebitda) in [
        (3i64, 5_000_000.0, 2_000_000.0),
        (2, 5_400_000.0, 1_950_000.0),
        (1, 5_800_000.0, 1_900_000.0),
        (0, 6_200_000.0, 1_850_000.0),
    ] {
        financials
            .add_snapshot(FinancialSnapshot {
                borrower_id,
                period_date: today - Duration::days(quarters_ago * 90),
                period_type: PeriodType::Quarterly,
                source: "demo".to_string(),
                debt_total: Some(debt),
                ebitda: Some(ebitda),
                revenue: Some(10_000_000.0),
                net_income: Some(800_000.0),
                operating_cash_flow: Some(1_200_000.0),
                capex: Some(400_000.0),
                interest_expense: Some(300_000.0),
                equity: Some(4_000_000.0),
                current_assets: Some(3_000_000.0),
                current_liabilities: Some(2_000_000.0),
            })
            .await;
    }

    let covenants = Arc::new(InMemoryCovenantStore::new());
    covenants
        .save_covenant(Covenant {
            id: Uuid::new_v4(),
            contract_id: Uuid::new_v4(),
            borrower_id,
            name: "Maximum Leverage".to_string(),
            covenant_type: CovenantType::Financial,
            metric: "debt_to_ebitda".to_string(),
            operator: ComparisonOperator::Lte,
            threshold: 3.0,
            unit: Some("x".to_string()),
            check_frequency: CheckFrequency::Quarterly,
        })
        .await?;

    let candidates = vec![RawCandidate {
        name: "Maximum Leverage".to_string(),
        clause_text: "Debt/EBITDA shall not exceed 3.0x".to_string(),
        metric: "debt_to_ebitda".to_string(),
        operator: "<=".to_string(),
        threshold: 3.0,
        unit: Some("x".to_string()),
        check_frequency: "quarterly".to_string(),
        confidence: 0.9,
    }];

    Ok(Fixtures {
        providers: EngineProviders {
            financials,
            covenants,
            alerts: Arc::new(InMemoryAlertSink::new()),
            adverse_events: Arc::new(InMemoryAdverseEvents::new()),
            narrative: Arc::new(CannedNarrative),
            extraction: Arc::new(CannedExtraction { candidates }),
            event_risk: Arc::new(CannedEventRisk),
            dispatcher: None,
        },
        borrower_id,
    })
}
