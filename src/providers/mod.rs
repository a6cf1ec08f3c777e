use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alerts::AlertDraft;
use crate::error::EngineResult;
use crate::extraction::RawCandidate;
use crate::model::{
    AdverseEvent, Alert, Covenant, CovenantHealth, FinancialSnapshot,
};

pub mod memory;

pub use memory::{
    InMemoryAdverseEvents, InMemoryAlertSink, InMemoryCovenantStore, InMemoryFinancials,
};

/// Read access to a borrower's reported financials.
#[async_trait]
pub trait FinancialDataReader: Send + Sync {
    async fn latest_snapshot(&self, borrower_id: Uuid) -> EngineResult<Option<FinancialSnapshot>>;

    /// Up to `count` prior snapshots, newest first.
    async fn historical_snapshots(
        &self,
        borrower_id: Uuid,
        count: usize,
    ) -> EngineResult<Vec<FinancialSnapshot>>;
}

/// Covenant definitions and their health records.
#[async_trait]
pub trait CovenantStore: Send + Sync {
    async fn covenant(&self, id: Uuid) -> EngineResult<Option<Covenant>>;

    /// Covenants across all of the borrower's contracts.
    async fn covenants_for_borrower(&self, borrower_id: Uuid) -> EngineResult<Vec<Covenant>>;

    async fn save_covenant(&self, covenant: Covenant) -> EngineResult<Covenant>;

    async fn latest_health(&self, covenant_id: Uuid) -> EngineResult<Option<CovenantHealth>>;

    /// Overwrites any prior health record for the same covenant.
    async fn save_health(&self, health: CovenantHealth) -> EngineResult<CovenantHealth>;
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn create_alert(&self, draft: AlertDraft) -> EngineResult<Alert>;
}

/// A borrower's scored adverse-event records.
#[async_trait]
pub trait AdverseEventStore: Send + Sync {
    async fn events_for_borrower(&self, borrower_id: Uuid) -> EngineResult<Vec<AdverseEvent>>;

    async fn save_event(&self, event: AdverseEvent) -> EngineResult<AdverseEvent>;
}

/// Context handed to the narrative model alongside the computed figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeRequest {
    pub covenant_name: String,
    pub metric: String,
    pub current_value: Option<f64>,
    pub threshold: f64,
    pub status: String,
    pub trend: String,
    pub borrower_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub risk_factors: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub summary: String,
    pub confidence: f64,
}

/// Hosted model producing a covenant risk narrative. Fallible and possibly
/// slow; callers substitute a default assessment on failure.
#[async_trait]
pub trait NarrativeService: Send + Sync {
    async fn assess_covenant_risk(&self, request: NarrativeRequest) -> EngineResult<RiskAssessment>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub covenants: Vec<RawCandidate>,
    pub summary: String,
    pub processing_time_ms: u64,
}

/// Hosted model turning contract text into covenant candidates. Failures
/// are retryable at the job level.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract_covenants(&self, contract_text: &str) -> EngineResult<ExtractionOutcome>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRiskAssessment {
    pub risk_score: f64,
    pub impact_assessment: String,
    pub affected_covenants: Vec<String>,
    pub recommended_actions: Vec<String>,
}

#[async_trait]
pub trait EventRiskService: Send + Sync {
    async fn score_adverse_event(
        &self,
        event_type: &str,
        headline: &str,
        description: &str,
    ) -> EngineResult<EventRiskAssessment>;
}

/// External orchestration path for extraction jobs. Optional: when absent or
/// failing, jobs run on the local in-process queue instead.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, contract_id: Uuid, contract_text: &str) -> EngineResult<Uuid>;
}
