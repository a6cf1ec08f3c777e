use async_trait::async_trait;
use uuid::Uuid;

use crate::adverse::NewAdverseEvent;
use crate::alerts::AlertDraft;
use crate::error::EngineResult;
use crate::extraction::{DispatchOutcome, ExtractionJob, JobPriority, QueueStats};
use crate::health::{BorrowerRecalculation, EvaluationOutcome};
use crate::model::{AdverseEvent, ComplianceStatus, Covenant, RiskAggregation};

/// The engine surface exposed to the UI/API layer.
#[async_trait]
pub trait CovenantBackend: Send + Sync {
    async fn evaluate_covenant(&self, covenant_id: Uuid) -> EngineResult<EvaluationOutcome>;

    async fn recalculate_borrower(&self, borrower_id: Uuid)
        -> EngineResult<BorrowerRecalculation>;

    /// Pure transition watcher: which alert, if any, a status change earns.
    fn on_covenant_health_changed(
        &self,
        previous: ComplianceStatus,
        new: ComplianceStatus,
        covenant: &Covenant,
        current_value: Option<f64>,
        buffer_percent: Option<f64>,
    ) -> Option<AlertDraft>;

    async fn aggregate_borrower_risk(&self, borrower_id: Uuid) -> EngineResult<RiskAggregation>;

    async fn ingest_adverse_event(&self, event: NewAdverseEvent) -> EngineResult<AdverseEvent>;

    async fn enqueue_extraction(
        &self,
        contract_id: Uuid,
        borrower_id: Uuid,
        contract_text: String,
        priority: JobPriority,
    ) -> DispatchOutcome;

    async fn job_status(&self, job_id: Uuid) -> Option<ExtractionJob>;

    async fn queue_stats(&self) -> QueueStats;

    /// Drop terminal extraction jobs past the retention window.
    async fn purge_expired_jobs(&self) -> usize;
}
