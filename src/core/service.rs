use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::config::EngineConfig;
use super::types::CovenantBackend;
use crate::adverse::{NewAdverseEvent, RiskAggregator};
use crate::alerts::{self, AlertDraft};
use crate::error::EngineResult;
use crate::extraction::{
    DispatchOutcome, ExtractionJob, ExtractionQueue, JobPriority, QueueConfig, QueueStats,
};
use crate::health::{BorrowerRecalculation, EvaluationOutcome, HealthOrchestrator};
use crate::model::{AdverseEvent, ComplianceStatus, Covenant, RiskAggregation};
use crate::providers::{
    AdverseEventStore, AlertSink, CovenantStore, EventRiskService, ExtractionService,
    FinancialDataReader, JobDispatcher, NarrativeService,
};

/// External collaborators the engine is wired with.
pub struct EngineProviders {
    pub financials: Arc<dyn FinancialDataReader>,
    pub covenants: Arc<dyn CovenantStore>,
    pub alerts: Arc<dyn AlertSink>,
    pub adverse_events: Arc<dyn AdverseEventStore>,
    pub narrative: Arc<dyn NarrativeService>,
    pub extraction: Arc<dyn ExtractionService>,
    pub event_risk: Arc<dyn EventRiskService>,
    pub dispatcher: Option<Arc<dyn JobDispatcher>>,
}

/// The covenant compliance engine: health orchestration, adverse-event risk
/// aggregation and the extraction queue behind one injected instance.
pub struct CovenantEngine {
    orchestrator: HealthOrchestrator,
    aggregator: RiskAggregator,
    queue: ExtractionQueue,
}

impl CovenantEngine {
    pub fn new(config: EngineConfig, providers: EngineProviders) -> Self {
        let orchestrator = HealthOrchestrator::new(
            Arc::clone(&providers.financials),
            Arc::clone(&providers.covenants),
            Arc::clone(&providers.alerts),
            Arc::clone(&providers.narrative),
            config.history_depth,
        );
        let aggregator = RiskAggregator::new(
            Arc::clone(&providers.adverse_events),
            Arc::clone(&providers.covenants),
            Arc::clone(&providers.alerts),
            Arc::clone(&providers.event_risk),
        );
        let queue = ExtractionQueue::new(
            QueueConfig {
                max_concurrent: config.max_concurrent_jobs,
                max_retries: config.max_job_retries,
                min_confidence: config.min_candidate_confidence,
                retention: Duration::hours(config.job_retention_hours),
            },
            Arc::clone(&providers.extraction),
            Arc::clone(&providers.covenants),
            providers.dispatcher,
        );
        CovenantEngine {
            orchestrator,
            aggregator,
            queue,
        }
    }
}

#[async_trait]
impl CovenantBackend for CovenantEngine {
    async fn evaluate_covenant(&self, covenant_id: Uuid) -> EngineResult<EvaluationOutcome> {
        self.orchestrator.evaluate(covenant_id).await
    }

    async fn recalculate_borrower(
        &self,
        borrower_id: Uuid,
    ) -> EngineResult<BorrowerRecalculation> {
        self.orchestrator.recalculate_for_borrower(borrower_id).await
    }

    fn on_covenant_health_changed(
        &self,
        previous: ComplianceStatus,
        new: ComplianceStatus,
        covenant: &Covenant,
        current_value: Option<f64>,
        buffer_percent: Option<f64>,
    ) -> Option<AlertDraft> {
        alerts::on_status_change(previous, new, covenant, current_value, buffer_percent)
    }

    async fn aggregate_borrower_risk(&self, borrower_id: Uuid) -> EngineResult<RiskAggregation> {
        self.aggregator.aggregate(borrower_id).await
    }

    async fn ingest_adverse_event(&self, event: NewAdverseEvent) -> EngineResult<AdverseEvent> {
        self.aggregator.ingest(event).await
    }

    async fn enqueue_extraction(
        &self,
        contract_id: Uuid,
        borrower_id: Uuid,
        contract_text: String,
        priority: JobPriority,
    ) -> DispatchOutcome {
        self.queue
            .enqueue(contract_id, borrower_id, contract_text, priority)
            .await
    }

    async fn job_status(&self, job_id: Uuid) -> Option<ExtractionJob> {
        self.queue.job_status(job_id).await
    }

    async fn queue_stats(&self) -> QueueStats {
        self.queue.stats().await
    }

    async fn purge_expired_jobs(&self) -> usize {
        self.queue.purge_expired(Utc::now()).await
    }
}
