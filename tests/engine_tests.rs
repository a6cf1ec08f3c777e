use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use covwatch::adverse::NewAdverseEvent;
use covwatch::core::{CovenantBackend, CovenantEngine, EngineConfig, EngineProviders};
use covwatch::error::{EngineError, EngineResult};
use covwatch::extraction::{DispatchOutcome, JobPriority, JobStatus, RawCandidate};
use covwatch::model::{
    AdverseEventType, AlertSeverity, AlertType, CheckFrequency, ComparisonOperator,
    ComplianceStatus, Covenant, CovenantHealth, CovenantType, FinancialSnapshot, PeriodType,
    TrendDirection,
};
use covwatch::providers::memory::{
    CannedEventRisk, CannedExtraction, CannedNarrative, InMemoryAdverseEvents, InMemoryAlertSink,
    InMemoryCovenantStore, InMemoryFinancials,
};
use covwatch::providers::{
    CovenantStore, EventRiskAssessment, EventRiskService, ExtractionOutcome, ExtractionService,
    JobDispatcher, NarrativeRequest, NarrativeService, RiskAssessment,
};

struct TestWorld {
    financials: Arc<InMemoryFinancials>,
    covenants: Arc<InMemoryCovenantStore>,
    alerts: Arc<InMemoryAlertSink>,
    adverse_events: Arc<InMemoryAdverseEvents>,
    borrower_id: Uuid,
}

impl TestWorld {
    fn new() -> Self {
        TestWorld {
            financials: Arc::new(InMemoryFinancials::new()),
            covenants: Arc::new(InMemoryCovenantStore::new()),
            alerts: Arc::new(InMemoryAlertSink::new()),
            adverse_events: Arc::new(InMemoryAdverseEvents::new()),
            borrower_id: Uuid::new_v4(),
        }
    }

    fn engine_with(
        &self,
        config: EngineConfig,
        narrative: Arc<dyn NarrativeService>,
        extraction: Arc<dyn ExtractionService>,
        event_risk: Arc<dyn EventRiskService>,
        dispatcher: Option<Arc<dyn JobDispatcher>>,
    ) -> CovenantEngine {
        CovenantEngine::new(
            config,
            EngineProviders {
                financials: Arc::clone(&self.financials) as _,
                covenants: Arc::clone(&self.covenants) as _,
                alerts: Arc::clone(&self.alerts) as _,
                adverse_events: Arc::clone(&self.adverse_events) as _,
                narrative,
                extraction,
                event_risk,
                dispatcher,
            },
        )
    }

    fn engine(&self, config: EngineConfig) -> CovenantEngine {
        self.engine_with(
            config,
            Arc::new(CannedNarrative),
            Arc::new(CannedExtraction { candidates: vec![] }),
            Arc::new(CannedEventRisk),
            None,
        )
    }

    async fn seed_snapshot(&self, quarters_ago: i64, debt: f64, ebitda: f64) {
        let mut snapshot = FinancialSnapshot::empty(
            self.borrower_id,
            Utc::now().date_naive() - Duration::days(quarters_ago * 90),
        );
        snapshot.period_type = PeriodType::Quarterly;
        snapshot.source = "test".to_string();
        snapshot.debt_total = Some(debt);
        snapshot.ebitda = Some(ebitda);
        self.financials.add_snapshot(snapshot).await;
    }

    async fn seed_covenant(&self, metric: &str, threshold: f64) -> Covenant {
        let covenant = Covenant {
            id: Uuid::new_v4(),
            contract_id: Uuid::new_v4(),
            borrower_id: self.borrower_id,
            name: "Maximum Leverage".to_string(),
            covenant_type: CovenantType::Financial,
            metric: metric.to_string(),
            operator: ComparisonOperator::Lte,
            threshold,
            unit: Some("x".to_string()),
            check_frequency: CheckFrequency::Quarterly,
        };
        self.covenants.save_covenant(covenant.clone()).await.unwrap();
        covenant
    }
}

fn candidate(name: &str, confidence: f64) -> RawCandidate {
    RawCandidate {
        name: name.to_string(),
        clause_text: "Debt/EBITDA shall not exceed 3.0x".to_string(),
        metric: "debt_to_ebitda".to_string(),
        operator: "<=".to_string(),
        threshold: 3.0,
        unit: Some("x".to_string()),
        check_frequency: "quarterly".to_string(),
        confidence,
    }
}

// --- scripted collaborators -------------------------------------------------

struct FailingNarrative;

#[async_trait]
impl NarrativeService for FailingNarrative {
    async fn assess_covenant_risk(&self, _request: NarrativeRequest) -> EngineResult<RiskAssessment> {
        Err(EngineError::external("narrative", "model timed out"))
    }
}

struct AlwaysFailingExtraction {
    attempts: AtomicUsize,
}

#[async_trait]
impl ExtractionService for AlwaysFailingExtraction {
    async fn extract_covenants(&self, _text: &str) -> EngineResult<ExtractionOutcome> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(EngineError::external("extraction", "model unavailable"))
    }
}

struct TrackingExtraction {
    current: AtomicUsize,
    peak: AtomicUsize,
    order: Mutex<Vec<String>>,
}

impl TrackingExtraction {
    fn new() -> Self {
        TrackingExtraction {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            order: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ExtractionService for TrackingExtraction {
    async fn extract_covenants(&self, text: &str) -> EngineResult<ExtractionOutcome> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.order.lock().await.push(text.to_string());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(ExtractionOutcome {
            covenants: vec![],
            summary: String::new(),
            processing_time_ms: 20,
        })
    }
}

struct SevereEventRisk;

#[async_trait]
impl EventRiskService for SevereEventRisk {
    async fn score_adverse_event(
        &self,
        _event_type: &str,
        _headline: &str,
        _description: &str,
    ) -> EngineResult<EventRiskAssessment> {
        Ok(EventRiskAssessment {
            risk_score: 9.5,
            impact_assessment: "severe".to_string(),
            affected_covenants: vec![],
            recommended_actions: vec![],
        })
    }
}

struct DownDispatcher;

#[async_trait]
impl JobDispatcher for DownDispatcher {
    async fn dispatch(&self, _contract_id: Uuid, _text: &str) -> EngineResult<Uuid> {
        Err(EngineError::external("dispatcher", "orchestration backend unreachable"))
    }
}

async fn wait_terminal(engine: &CovenantEngine, job_id: Uuid) -> covwatch::extraction::ExtractionJob {
    for _ in 0..2000 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        if let Some(job) = engine.job_status(job_id).await {
            if job.status.is_terminal() {
                return job;
            }
        }
    }
    panic!("job {} never reached a terminal state", job_id);
}

// --- orchestrator -----------------------------------------------------------

#[tokio::test]
async fn evaluating_a_missing_covenant_is_not_found() {
    let world = TestWorld::new();
    let engine = world.engine(EngineConfig::default());
    let err = engine.evaluate_covenant(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[tokio::test]
async fn unknown_metric_fails_loudly() {
    let world = TestWorld::new();
    let covenant = world.seed_covenant("mystery_metric", 1.0).await;
    let engine = world.engine(EngineConfig::default());
    let err = engine.evaluate_covenant(covenant.id).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownMetric(_)));
}

#[tokio::test]
async fn missing_financial_data_fails_open_and_persists() {
    let world = TestWorld::new();
    let covenant = world.seed_covenant("debt_to_ebitda", 3.0).await;
    let engine = world.engine(EngineConfig::default());

    let outcome = engine.evaluate_covenant(covenant.id).await.unwrap();
    assert_eq!(outcome.health.status, ComplianceStatus::Compliant);
    assert_eq!(outcome.health.current_value, None);
    assert!(outcome.alert.is_none());
    assert!(world
        .covenants
        .latest_health(covenant.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn worsening_leverage_produces_breach_alert_and_projection() {
    let world = TestWorld::new();
    world.seed_snapshot(3, 5_000_000.0, 2_000_000.0).await;
    world.seed_snapshot(2, 5_600_000.0, 1_900_000.0).await;
    world.seed_snapshot(1, 6_200_000.0, 1_800_000.0).await;
    world.seed_snapshot(0, 6_800_000.0, 1_700_000.0).await;
    let covenant = world.seed_covenant("debt_to_ebitda", 3.0).await;

    // Previous record says compliant, so landing breached must alert.
    world
        .covenants
        .save_health(CovenantHealth {
            covenant_id: covenant.id,
            current_value: Some(2.5),
            status: ComplianceStatus::Compliant,
            buffer_percent: Some(16.7),
            trend: TrendDirection::Stable,
            trend_confidence: 0.5,
            days_to_breach: None,
            narrative: String::new(),
            narrative_confidence: 0.5,
            last_calculated: Utc::now(),
        })
        .await
        .unwrap();

    let engine = world.engine(EngineConfig::default());
    let outcome = engine.evaluate_covenant(covenant.id).await.unwrap();

    // 6.8M / 1.7M = 4.0 against <= 3.0: buffer ≈ -33%
    assert_eq!(outcome.health.status, ComplianceStatus::Breached);
    assert_eq!(outcome.health.trend, TrendDirection::Deteriorating);
    assert!(outcome.health.days_to_breach.is_some());

    let alert = outcome.alert.expect("breach transition must alert");
    assert_eq!(alert.alert_type, AlertType::Breach);
    assert_eq!(alert.severity, AlertSeverity::Critical);
    assert_eq!(world.alerts.alerts().await.len(), 1);
}

#[tokio::test]
async fn steady_breach_does_not_realert() {
    let world = TestWorld::new();
    world.seed_snapshot(0, 6_800_000.0, 1_700_000.0).await;
    let covenant = world.seed_covenant("debt_to_ebitda", 3.0).await;
    let engine = world.engine(EngineConfig::default());

    let first = engine.evaluate_covenant(covenant.id).await.unwrap();
    assert!(first.alert.is_some());

    let second = engine.evaluate_covenant(covenant.id).await.unwrap();
    assert_eq!(second.health.status, ComplianceStatus::Breached);
    assert!(second.alert.is_none());
    assert_eq!(world.alerts.alerts().await.len(), 1);
}

#[tokio::test]
async fn narrative_failure_degrades_to_default_but_still_persists() {
    let world = TestWorld::new();
    world.seed_snapshot(0, 6_000_000.0, 2_000_000.0).await;
    let covenant = world.seed_covenant("debt_to_ebitda", 3.0).await;

    let engine = world.engine_with(
        EngineConfig::default(),
        Arc::new(FailingNarrative),
        Arc::new(CannedExtraction { candidates: vec![] }),
        Arc::new(CannedEventRisk),
        None,
    );

    let outcome = engine.evaluate_covenant(covenant.id).await.unwrap();
    assert!(outcome.health.narrative.contains("unavailable"));
    assert!((outcome.health.narrative_confidence - 0.2).abs() < 1e-9);
    assert!(world
        .covenants
        .latest_health(covenant.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn borrower_batch_isolates_per_covenant_failures() {
    let world = TestWorld::new();
    world.seed_snapshot(0, 6_000_000.0, 2_000_000.0).await;
    world.seed_covenant("debt_to_ebitda", 3.5).await;
    world.seed_covenant("not_a_metric", 1.0).await;

    let engine = world.engine(EngineConfig::default());
    let batch = engine.recalculate_borrower(world.borrower_id).await.unwrap();
    assert_eq!(batch.evaluated.len(), 1);
    assert_eq!(batch.failures.len(), 1);
    assert!(batch.failures[0].1.contains("unknown covenant metric"));
}

// --- adverse events ---------------------------------------------------------

#[tokio::test]
async fn high_risk_event_fans_out_to_exposed_covenants() {
    let world = TestWorld::new();
    world.seed_covenant("debt_to_ebitda", 3.0).await;

    let engine = world.engine_with(
        EngineConfig::default(),
        Arc::new(CannedNarrative),
        Arc::new(CannedExtraction { candidates: vec![] }),
        Arc::new(SevereEventRisk),
        None,
    );

    let event = engine
        .ingest_adverse_event(NewAdverseEvent {
            borrower_id: world.borrower_id,
            event_type: AdverseEventType::RatingAction,
            headline: "Downgrade to CCC".to_string(),
            description: String::new(),
            source: "test".to_string(),
            event_date: Utc::now().date_naive(),
        })
        .await
        .unwrap();
    assert!(event.risk_score >= 9.0);

    // financial covenant x rating action weighs 0.8: alert expected
    let alerts = world.alerts.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, AlertSeverity::Critical);

    let aggregation = engine.aggregate_borrower_risk(world.borrower_id).await.unwrap();
    assert!(aggregation.aggregate_risk_score >= 7.0);
    assert!(aggregation.aggregate_risk_score <= 10.0);
    assert_eq!(aggregation.event_count, 1);
}

#[tokio::test]
async fn empty_event_history_aggregates_to_zero() {
    let world = TestWorld::new();
    let engine = world.engine(EngineConfig::default());
    let aggregation = engine.aggregate_borrower_risk(world.borrower_id).await.unwrap();
    assert_eq!(aggregation.aggregate_risk_score, 0.0);
    assert_eq!(aggregation.event_count, 0);
}

// --- extraction queue -------------------------------------------------------

#[tokio::test]
async fn completed_job_persists_only_confident_candidates() {
    let world = TestWorld::new();
    let engine = world.engine_with(
        EngineConfig::default(),
        Arc::new(CannedNarrative),
        Arc::new(CannedExtraction {
            candidates: vec![candidate("Strong", 0.9), candidate("Weak", 0.1)],
        }),
        Arc::new(CannedEventRisk),
        None,
    );

    let outcome = engine
        .enqueue_extraction(
            Uuid::new_v4(),
            world.borrower_id,
            "contract text".to_string(),
            JobPriority::Normal,
        )
        .await;
    let job = wait_terminal(&engine, outcome.job_id()).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress_percent, 100);
    assert_eq!(job.covenants_extracted, 1);
    // seeded none, extracted one
    assert_eq!(world.covenants.covenant_count().await, 1);
}

#[tokio::test]
async fn always_failing_job_terminates_after_exactly_max_retries_attempts() {
    let world = TestWorld::new();
    let extraction = Arc::new(AlwaysFailingExtraction {
        attempts: AtomicUsize::new(0),
    });
    let engine = world.engine_with(
        EngineConfig {
            max_job_retries: 3,
            ..EngineConfig::default()
        },
        Arc::new(CannedNarrative),
        Arc::clone(&extraction) as _,
        Arc::new(CannedEventRisk),
        None,
    );

    let outcome = engine
        .enqueue_extraction(
            Uuid::new_v4(),
            world.borrower_id,
            "contract text".to_string(),
            JobPriority::High,
        )
        .await;
    let job = wait_terminal(&engine, outcome.job_id()).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 3);
    assert_eq!(extraction.attempts.load(Ordering::SeqCst), 3);
    assert!(job.error.as_deref().unwrap().contains("model unavailable"));
    assert!(matches!(
        job.failure(),
        Some(EngineError::RetriesExhausted { attempts: 3, .. })
    ));
}

#[tokio::test]
async fn processing_never_exceeds_the_concurrency_cap() {
    let world = TestWorld::new();
    let extraction = Arc::new(TrackingExtraction::new());
    let engine = world.engine_with(
        EngineConfig {
            max_concurrent_jobs: 3,
            ..EngineConfig::default()
        },
        Arc::new(CannedNarrative),
        Arc::clone(&extraction) as _,
        Arc::new(CannedEventRisk),
        None,
    );

    let mut job_ids = Vec::new();
    for i in 0..10 {
        let outcome = engine
            .enqueue_extraction(
                Uuid::new_v4(),
                world.borrower_id,
                format!("contract {}", i),
                JobPriority::Normal,
            )
            .await;
        job_ids.push(outcome.job_id());
    }

    let stats = engine.queue_stats().await;
    assert!(stats.processing <= 3);

    for job_id in job_ids {
        wait_terminal(&engine, job_id).await;
    }
    assert!(extraction.peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(engine.queue_stats().await.completed, 10);
}

#[tokio::test]
async fn priority_beats_fifo_once_capacity_frees_up() {
    let world = TestWorld::new();
    let extraction = Arc::new(TrackingExtraction::new());
    let engine = world.engine_with(
        EngineConfig {
            max_concurrent_jobs: 1,
            ..EngineConfig::default()
        },
        Arc::new(CannedNarrative),
        Arc::clone(&extraction) as _,
        Arc::new(CannedEventRisk),
        None,
    );

    // first job occupies the only slot; the rest queue up
    let mut job_ids = Vec::new();
    for (text, priority) in [
        ("first", JobPriority::Normal),
        ("low", JobPriority::Low),
        ("normal", JobPriority::Normal),
        ("high", JobPriority::High),
    ] {
        let outcome = engine
            .enqueue_extraction(Uuid::new_v4(), world.borrower_id, text.to_string(), priority)
            .await;
        job_ids.push(outcome.job_id());
    }
    for job_id in job_ids {
        wait_terminal(&engine, job_id).await;
    }

    let order = extraction.order.lock().await.clone();
    assert_eq!(order, vec!["first", "high", "normal", "low"]);
}

#[tokio::test]
async fn unreachable_dispatcher_falls_back_to_the_local_queue() {
    let world = TestWorld::new();
    let engine = world.engine_with(
        EngineConfig::default(),
        Arc::new(CannedNarrative),
        Arc::new(CannedExtraction {
            candidates: vec![candidate("Leverage", 0.9)],
        }),
        Arc::new(CannedEventRisk),
        Some(Arc::new(DownDispatcher)),
    );

    let outcome = engine
        .enqueue_extraction(
            Uuid::new_v4(),
            world.borrower_id,
            "contract text".to_string(),
            JobPriority::Normal,
        )
        .await;
    let job_id = match &outcome {
        DispatchOutcome::Fallback { job_id, reason } => {
            assert!(reason.contains("unreachable"));
            *job_id
        }
        DispatchOutcome::Dispatched(_) => panic!("dispatcher is down, expected fallback"),
    };

    let job = wait_terminal(&engine, job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
async fn terminal_jobs_are_purged_after_retention() {
    use covwatch::extraction::{ExtractionQueue, QueueConfig};

    let world = TestWorld::new();
    let queue = ExtractionQueue::new(
        QueueConfig::default(),
        Arc::new(CannedExtraction { candidates: vec![] }),
        Arc::clone(&world.covenants) as _,
        None,
    );

    let outcome = queue
        .enqueue(
            Uuid::new_v4(),
            world.borrower_id,
            "contract text".to_string(),
            JobPriority::Normal,
        )
        .await;
    let job_id = outcome.job_id();
    for _ in 0..200 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        if let Some(job) = queue.job_status(job_id).await {
            if job.status.is_terminal() {
                break;
            }
        }
    }

    // still inside the 24h retention window
    assert_eq!(queue.purge_expired(Utc::now()).await, 0);
    assert!(queue.job_status(job_id).await.is_some());

    // a day later the completed job is swept
    assert_eq!(queue.purge_expired(Utc::now() + Duration::hours(25)).await, 1);
    assert!(queue.job_status(job_id).await.is_none());
    assert_eq!(queue.stats().await.total, 0);
}
