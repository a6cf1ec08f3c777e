use chrono::Utc;
use futures::{stream, StreamExt};
use std::sync::Arc;
use uuid::Uuid;

use crate::alerts;
use crate::compliance;
use crate::error::{EngineError, EngineResult};
use crate::metrics::MetricKind;
use crate::model::{Alert, Covenant, CovenantHealth, FinancialSnapshot};
use crate::providers::{
    AlertSink, CovenantStore, FinancialDataReader, NarrativeRequest, NarrativeService,
    RiskAssessment,
};
use crate::ratios;
use crate::trend::{self, TrendPoint};

/// Historical snapshots consulted per evaluation.
pub const DEFAULT_HISTORY_DEPTH: usize = 4;

/// Concurrent evaluations per borrower batch, bounding load on the data and
/// narrative collaborators.
const BATCH_FAN_OUT: usize = 5;

#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub health: CovenantHealth,
    pub alert: Option<Alert>,
}

/// Result of a borrower-wide recalculation. One covenant's failure never
/// aborts its siblings; failures ride along for operator display.
#[derive(Debug, Clone, Default)]
pub struct BorrowerRecalculation {
    pub evaluated: Vec<EvaluationOutcome>,
    pub failures: Vec<(Uuid, String)>,
}

/// Composes ratio derivation, compliance evaluation and trend analysis per
/// covenant, then persists the health record and watches for alerting
/// transitions.
pub struct HealthOrchestrator {
    financials: Arc<dyn FinancialDataReader>,
    covenants: Arc<dyn CovenantStore>,
    alerts: Arc<dyn AlertSink>,
    narrative: Arc<dyn NarrativeService>,
    history_depth: usize,
}

impl HealthOrchestrator {
    pub fn new(
        financials: Arc<dyn FinancialDataReader>,
        covenants: Arc<dyn CovenantStore>,
        alerts: Arc<dyn AlertSink>,
        narrative: Arc<dyn NarrativeService>,
        history_depth: usize,
    ) -> Self {
        HealthOrchestrator {
            financials,
            covenants,
            alerts,
            narrative,
            history_depth,
        }
    }

    /// Evaluate one covenant end to end. Missing financial data is a valid
    /// state (fail-open compliance applies); a missing covenant or an
    /// unmapped metric name is not.
    pub async fn evaluate(&self, covenant_id: Uuid) -> EngineResult<EvaluationOutcome> {
        let covenant = self
            .covenants
            .covenant(covenant_id)
            .await?
            .ok_or_else(|| EngineError::not_found("covenant", covenant_id.to_string()))?;

        let metric = MetricKind::resolve(&covenant.metric)?;

        let latest = self
            .financials
            .latest_snapshot(covenant.borrower_id)
            .await?
            .unwrap_or_else(|| {
                FinancialSnapshot::empty(covenant.borrower_id, Utc::now().date_naive())
            });
        let history = self
            .financials
            .historical_snapshots(covenant.borrower_id, self.history_depth)
            .await?;

        let latest_ratios = ratios::calculate_ratios(&latest)?;
        let current_value = metric.extract(&latest_ratios, &latest);

        let outcome = compliance::evaluate(current_value, Some(covenant.threshold), covenant.operator);

        // Readers return newest first; trend math wants chronological order.
        let series = metric_series(metric, history.iter().rev());
        let trend_result = trend::analyze(&series, metric.lower_is_better());
        let days_to_breach = current_value
            .and_then(|value| trend::project_days_to_breach(&series, value, covenant.threshold));

        let assessment = self.request_narrative(&covenant, current_value, &outcome, &trend_result).await;

        let previous_status = self
            .covenants
            .latest_health(covenant_id)
            .await?
            .map(|h| h.status);

        let health = self
            .covenants
            .save_health(CovenantHealth {
                covenant_id,
                current_value,
                status: outcome.status,
                buffer_percent: outcome.buffer_percent,
                trend: trend_result.direction,
                trend_confidence: trend_result.confidence,
                days_to_breach,
                narrative: assessment.summary,
                narrative_confidence: assessment.confidence,
                last_calculated: Utc::now(),
            })
            .await?;

        // A covenant with no prior record transitions from a compliant
        // baseline, so a first evaluation that lands breached still alerts.
        let previous = previous_status.unwrap_or(crate::model::ComplianceStatus::Compliant);
        let alert = match alerts::on_status_change(
            previous,
            health.status,
            &covenant,
            current_value,
            health.buffer_percent,
        ) {
            Some(draft) => Some(self.alerts.create_alert(draft).await?),
            None => None,
        };

        log::debug!(
            "covenant {} evaluated: status={} trend={}",
            covenant_id,
            health.status,
            health.trend
        );
        Ok(EvaluationOutcome { health, alert })
    }

    async fn request_narrative(
        &self,
        covenant: &Covenant,
        current_value: Option<f64>,
        outcome: &compliance::ComplianceOutcome,
        trend_result: &trend::TrendResult,
    ) -> RiskAssessment {
        let request = NarrativeRequest {
            covenant_name: covenant.name.clone(),
            metric: covenant.metric.clone(),
            current_value,
            threshold: covenant.threshold,
            status: outcome.status.to_string(),
            trend: trend_result.direction.to_string(),
            borrower_name: None,
        };
        match self.narrative.assess_covenant_risk(request).await {
            Ok(assessment) => assessment,
            Err(e) => {
                // The evaluation still completes and persists; the narrative
                // degrades to a fixed low-confidence baseline.
                log::warn!(
                    "narrative service failed for covenant {}, using default assessment: {}",
                    covenant.id,
                    e
                );
                default_assessment(outcome)
            }
        }
    }

    /// Evaluate every covenant across the borrower's contracts, reporting
    /// partial success rather than failing the batch.
    pub async fn recalculate_for_borrower(
        &self,
        borrower_id: Uuid,
    ) -> EngineResult<BorrowerRecalculation> {
        let covenants = self.covenants.covenants_for_borrower(borrower_id).await?;
        log::debug!(
            "recalculating {} covenants for borrower {}",
            covenants.len(),
            borrower_id
        );

        let results: Vec<(Uuid, EngineResult<EvaluationOutcome>)> =
            stream::iter(covenants.into_iter().map(|covenant| {
                let id = covenant.id;
                async move { (id, self.evaluate(id).await) }
            }))
            .buffer_unordered(BATCH_FAN_OUT)
            .collect()
            .await;

        let mut batch = BorrowerRecalculation::default();
        for (covenant_id, result) in results {
            match result {
                Ok(outcome) => batch.evaluated.push(outcome),
                Err(e) => {
                    log::warn!("covenant {} evaluation failed: {}", covenant_id, e);
                    batch.failures.push((covenant_id, e.to_string()));
                }
            }
        }
        Ok(batch)
    }
}

fn metric_series<'a>(
    metric: MetricKind,
    snapshots: impl Iterator<Item = &'a FinancialSnapshot>,
) -> Vec<TrendPoint> {
    snapshots
        .filter_map(|snapshot| match ratios::calculate_ratios(snapshot) {
            Ok(r) => metric.extract(&r, snapshot).map(|value| TrendPoint {
                value,
                data_confidence: r.data_confidence,
            }),
            Err(e) => {
                log::warn!(
                    "skipping snapshot {} in trend series: {}",
                    snapshot.period_date,
                    e
                );
                None
            }
        })
        .collect()
}

fn default_assessment(outcome: &compliance::ComplianceOutcome) -> RiskAssessment {
    let risk_score = match outcome.status {
        crate::model::ComplianceStatus::Breached => 8.0,
        crate::model::ComplianceStatus::Warning => 5.0,
        crate::model::ComplianceStatus::Compliant => 2.0,
    };
    RiskAssessment {
        risk_score,
        risk_factors: Vec::new(),
        recommended_actions: Vec::new(),
        summary: "Automated narrative unavailable; low-confidence baseline assessment".to_string(),
        confidence: 0.2,
    }
}
