use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AdverseEventStore, AlertSink, CovenantStore, EventRiskAssessment, EventRiskService,
    ExtractionOutcome, ExtractionService, FinancialDataReader, NarrativeRequest,
    NarrativeService, RiskAssessment,
};
use crate::alerts::AlertDraft;
use crate::error::EngineResult;
use crate::extraction::RawCandidate;
use crate::model::{
    AdverseEvent, Alert, AlertStatus, Covenant, CovenantHealth, FinancialSnapshot,
};

/// In-memory financial data, keyed by borrower. Snapshots are kept sorted
/// newest first, matching the retrieval convention of the real reader.
#[derive(Default)]
pub struct InMemoryFinancials {
    snapshots: RwLock<HashMap<Uuid, Vec<FinancialSnapshot>>>,
}

impl InMemoryFinancials {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_snapshot(&self, snapshot: FinancialSnapshot) {
        let mut map = self.snapshots.write().await;
        let series = map.entry(snapshot.borrower_id).or_default();
        series.push(snapshot);
        series.sort_by(|a, b| b.period_date.cmp(&a.period_date));
    }
}

#[async_trait]
impl FinancialDataReader for InMemoryFinancials {
    async fn latest_snapshot(&self, borrower_id: Uuid) -> EngineResult<Option<FinancialSnapshot>> {
        let map = self.snapshots.read().await;
        Ok(map.get(&borrower_id).and_then(|s| s.first().cloned()))
    }

    async fn historical_snapshots(
        &self,
        borrower_id: Uuid,
        count: usize,
    ) -> EngineResult<Vec<FinancialSnapshot>> {
        let map = self.snapshots.read().await;
        Ok(map
            .get(&borrower_id)
            .map(|s| s.iter().take(count).cloned().collect())
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryCovenantStore {
    covenants: RwLock<HashMap<Uuid, Covenant>>,
    health: RwLock<HashMap<Uuid, CovenantHealth>>,
}

impl InMemoryCovenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn covenant_count(&self) -> usize {
        self.covenants.read().await.len()
    }
}

#[async_trait]
impl CovenantStore for InMemoryCovenantStore {
    async fn covenant(&self, id: Uuid) -> EngineResult<Option<Covenant>> {
        Ok(self.covenants.read().await.get(&id).cloned())
    }

    async fn covenants_for_borrower(&self, borrower_id: Uuid) -> EngineResult<Vec<Covenant>> {
        Ok(self
            .covenants
            .read()
            .await
            .values()
            .filter(|c| c.borrower_id == borrower_id)
            .cloned()
            .collect())
    }

    async fn save_covenant(&self, covenant: Covenant) -> EngineResult<Covenant> {
        self.covenants
            .write()
            .await
            .insert(covenant.id, covenant.clone());
        Ok(covenant)
    }

    async fn latest_health(&self, covenant_id: Uuid) -> EngineResult<Option<CovenantHealth>> {
        Ok(self.health.read().await.get(&covenant_id).cloned())
    }

    async fn save_health(&self, health: CovenantHealth) -> EngineResult<CovenantHealth> {
        self.health
            .write()
            .await
            .insert(health.covenant_id, health.clone());
        Ok(health)
    }
}

#[derive(Default)]
pub struct InMemoryAlertSink {
    alerts: RwLock<Vec<Alert>>,
}

impl InMemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.alerts.read().await.clone()
    }
}

#[async_trait]
impl AlertSink for InMemoryAlertSink {
    async fn create_alert(&self, draft: AlertDraft) -> EngineResult<Alert> {
        let alert = Alert {
            id: Uuid::new_v4(),
            covenant_id: draft.covenant_id,
            contract_id: draft.contract_id,
            borrower_id: draft.borrower_id,
            alert_type: draft.alert_type,
            severity: draft.severity,
            title: draft.title,
            description: draft.description,
            trigger_value: draft.trigger_value,
            threshold_value: draft.threshold_value,
            status: AlertStatus::New,
            created_at: Utc::now(),
        };
        self.alerts.write().await.push(alert.clone());
        Ok(alert)
    }
}

#[derive(Default)]
pub struct InMemoryAdverseEvents {
    events: RwLock<HashMap<Uuid, Vec<AdverseEvent>>>,
}

impl InMemoryAdverseEvents {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AdverseEventStore for InMemoryAdverseEvents {
    async fn events_for_borrower(&self, borrower_id: Uuid) -> EngineResult<Vec<AdverseEvent>> {
        Ok(self
            .events
            .read()
            .await
            .get(&borrower_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_event(&self, event: AdverseEvent) -> EngineResult<AdverseEvent> {
        self.events
            .write()
            .await
            .entry(event.borrower_id)
            .or_default()
            .push(event.clone());
        Ok(event)
    }
}

/// Deterministic stand-in for the hosted narrative model, used by the demo
/// CLI and tests that are not exercising narrative failure.
pub struct CannedNarrative;

#[async_trait]
impl NarrativeService for CannedNarrative {
    async fn assess_covenant_risk(&self, request: NarrativeRequest) -> EngineResult<RiskAssessment> {
        let risk_score = match request.status.as_str() {
            "breached" => 9.0,
            "warning" => 6.0,
            _ => 2.0,
        };
        Ok(RiskAssessment {
            risk_score,
            risk_factors: vec![format!("{} trend: {}", request.metric, request.trend)],
            recommended_actions: vec!["review with relationship manager".to_string()],
            summary: format!(
                "{} is {} against a threshold of {:.2}",
                request.covenant_name, request.status, request.threshold
            ),
            confidence: 0.8,
        })
    }
}

/// Extraction stand-in that replays a fixed candidate list.
pub struct CannedExtraction {
    pub candidates: Vec<RawCandidate>,
}

#[async_trait]
impl ExtractionService for CannedExtraction {
    async fn extract_covenants(&self, _contract_text: &str) -> EngineResult<ExtractionOutcome> {
        Ok(ExtractionOutcome {
            covenants: self.candidates.clone(),
            summary: format!("{} candidate covenants", self.candidates.len()),
            processing_time_ms: 0,
        })
    }
}

/// Event-risk stand-in scoring by a few headline keywords.
pub struct CannedEventRisk;

#[async_trait]
impl EventRiskService for CannedEventRisk {
    async fn score_adverse_event(
        &self,
        event_type: &str,
        headline: &str,
        _description: &str,
    ) -> EngineResult<EventRiskAssessment> {
        let lower = headline.to_lowercase();
        let risk_score = if lower.contains("default") || lower.contains("bankruptcy") {
            9.0
        } else if lower.contains("downgrade") || lower.contains("lawsuit") {
            7.0
        } else {
            4.0
        };
        Ok(EventRiskAssessment {
            risk_score,
            impact_assessment: format!("{} event: {}", event_type, headline),
            affected_covenants: Vec::new(),
            recommended_actions: Vec::new(),
        })
    }
}
