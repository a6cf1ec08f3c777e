use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::alerts::AlertDraft;
use crate::error::EngineResult;
use crate::model::{
    AdverseEvent, AdverseEventType, AlertSeverity, AlertType, CovenantType, RiskAggregation,
    RiskTrend,
};
use crate::providers::{AdverseEventStore, AlertSink, CovenantStore, EventRiskService};

/// Events scored at or above this fan alerts out to exposed covenants.
pub const HIGH_RISK_THRESHOLD: f64 = 7.0;

/// Recency weighting horizon in days.
const RECENCY_HORIZON_DAYS: f64 = 90.0;

/// Bucket boundary for the trend comparison.
const RECENT_BUCKET_DAYS: i64 = 30;

/// A signal about a borrower before the risk model has scored it.
#[derive(Debug, Clone)]
pub struct NewAdverseEvent {
    pub borrower_id: Uuid,
    pub event_type: AdverseEventType,
    pub headline: String,
    pub description: String,
    pub source: String,
    pub event_date: NaiveDate,
}

/// Scores incoming adverse events and folds a borrower's event history into
/// one recency- and severity-weighted risk figure.
pub struct RiskAggregator {
    events: Arc<dyn AdverseEventStore>,
    covenants: Arc<dyn CovenantStore>,
    alerts: Arc<dyn AlertSink>,
    scorer: Arc<dyn EventRiskService>,
}

impl RiskAggregator {
    pub fn new(
        events: Arc<dyn AdverseEventStore>,
        covenants: Arc<dyn CovenantStore>,
        alerts: Arc<dyn AlertSink>,
        scorer: Arc<dyn EventRiskService>,
    ) -> Self {
        RiskAggregator {
            events,
            covenants,
            alerts,
            scorer,
        }
    }

    /// Score one incoming event, persist it, and raise alerts against the
    /// borrower's exposed covenants when the score is high risk.
    pub async fn ingest(&self, input: NewAdverseEvent) -> EngineResult<AdverseEvent> {
        let assessment = self
            .scorer
            .score_adverse_event(
                &input.event_type.to_string(),
                &input.headline,
                &input.description,
            )
            .await?;

        let event = AdverseEvent {
            id: Uuid::new_v4(),
            borrower_id: input.borrower_id,
            event_type: input.event_type,
            headline: input.headline,
            description: input.description,
            source: input.source,
            event_date: input.event_date,
            risk_score: assessment.risk_score.clamp(1.0, 10.0),
        };
        let event = self.events.save_event(event).await?;

        if event.risk_score >= HIGH_RISK_THRESHOLD {
            self.raise_event_alerts(&event).await?;
        }
        Ok(event)
    }

    async fn raise_event_alerts(&self, event: &AdverseEvent) -> EngineResult<()> {
        let covenants = self
            .covenants
            .covenants_for_borrower(event.borrower_id)
            .await?;

        for covenant in covenants {
            if impact_weight(covenant.covenant_type, event.event_type) < 0.5 {
                continue;
            }
            let (alert_type, severity) = if event.risk_score >= 9.0 {
                (AlertType::Breach, AlertSeverity::Critical)
            } else {
                (AlertType::Warning, AlertSeverity::High)
            };
            let draft = AlertDraft {
                covenant_id: Some(covenant.id),
                contract_id: Some(covenant.contract_id),
                borrower_id: event.borrower_id,
                alert_type,
                severity,
                title: format!("Adverse event may impact {}", covenant.name),
                description: format!(
                    "{} event scored {:.1}/10: {}",
                    event.event_type, event.risk_score, event.headline
                ),
                trigger_value: Some(event.risk_score),
                threshold_value: Some(HIGH_RISK_THRESHOLD),
            };
            self.alerts.create_alert(draft).await?;
            log::info!(
                "high-risk {} event raised alert on covenant {}",
                event.event_type,
                covenant.id
            );
        }
        Ok(())
    }

    /// Recompute the borrower's aggregate risk from its stored events.
    pub async fn aggregate(&self, borrower_id: Uuid) -> EngineResult<RiskAggregation> {
        let events = self.events.events_for_borrower(borrower_id).await?;
        Ok(aggregate_events(
            borrower_id,
            &events,
            Utc::now().date_naive(),
        ))
    }
}

/// Fixed exposure table: how strongly an event category bears on a covenant
/// category. Values in [0, 1]; fan-out happens at >= 0.5.
pub fn impact_weight(covenant_type: CovenantType, event_type: AdverseEventType) -> f64 {
    use AdverseEventType::*;
    use CovenantType::*;
    match (covenant_type, event_type) {
        (Financial, News) => 0.4,
        (Financial, Litigation) => 0.6,
        (Financial, RatingAction) => 0.8,
        (Financial, Regulatory) => 0.5,
        (Financial, Management) => 0.3,
        (Operational, News) => 0.3,
        (Operational, Litigation) => 0.7,
        (Operational, RatingAction) => 0.4,
        (Operational, Regulatory) => 0.8,
        (Operational, Management) => 0.6,
        (Reporting, News) => 0.2,
        (Reporting, Litigation) => 0.5,
        (Reporting, RatingAction) => 0.3,
        (Reporting, Regulatory) => 0.7,
        (Reporting, Management) => 0.4,
        (Other, Litigation) => 0.3,
        (Other, _) => 0.2,
    }
}

/// Pure aggregation over a borrower's scored events as of `today`.
pub fn aggregate_events(
    borrower_id: Uuid,
    events: &[AdverseEvent],
    today: NaiveDate,
) -> RiskAggregation {
    if events.is_empty() {
        return RiskAggregation {
            borrower_id,
            aggregate_risk_score: 0.0,
            risk_factors: Vec::new(),
            highest_risk_event: None,
            trend: RiskTrend::Stable,
            event_count: 0,
        };
    }

    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for event in events {
        let days_since = (today - event.event_date).num_days().max(0) as f64;
        let recency = (1.0 - days_since / RECENCY_HORIZON_DAYS).max(0.1);
        let severity = event.risk_score / 10.0;
        let weight = recency * (0.5 + 0.5 * severity);
        weighted_sum += weight * event.risk_score;
        weight_sum += weight;
    }
    let count_bonus = (1.0 + (events.len() as f64 - 1.0) * 0.1).min(1.5);
    let aggregate = (weighted_sum / weight_sum * count_bonus).clamp(1.0, 10.0);

    let highest = events
        .iter()
        .max_by(|a, b| {
            a.risk_score
                .partial_cmp(&b.risk_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned();

    let mut risk_factors: Vec<String> = events
        .iter()
        .filter(|e| e.risk_score >= 5.0)
        .map(|e| e.headline.clone())
        .collect();
    risk_factors.dedup();

    RiskAggregation {
        borrower_id,
        aggregate_risk_score: aggregate,
        risk_factors,
        highest_risk_event: highest,
        trend: trend(events, today),
        event_count: events.len(),
    }
}

/// Compare the last 30 days against everything older. A one-sided history
/// forces the trend toward the populated bucket instead of comparing
/// against an undefined average.
fn trend(events: &[AdverseEvent], today: NaiveDate) -> RiskTrend {
    let (mut recent, mut older) = (Vec::new(), Vec::new());
    for event in events {
        let days_since = (today - event.event_date).num_days();
        if days_since <= RECENT_BUCKET_DAYS {
            recent.push(event.risk_score);
        } else {
            older.push(event.risk_score);
        }
    }

    match (recent.is_empty(), older.is_empty()) {
        (true, true) => RiskTrend::Stable,
        (false, true) => RiskTrend::Increasing,
        (true, false) => RiskTrend::Decreasing,
        (false, false) => {
            let recent_avg = recent.iter().sum::<f64>() / recent.len() as f64;
            let older_avg = older.iter().sum::<f64>() / older.len() as f64;
            let diff = recent_avg - older_avg;
            if diff > 1.0 {
                RiskTrend::Increasing
            } else if diff < -1.0 {
                RiskTrend::Decreasing
            } else {
                RiskTrend::Stable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use strum::IntoEnumIterator;

    fn event(days_ago: i64, score: f64, today: NaiveDate) -> AdverseEvent {
        AdverseEvent {
            id: Uuid::new_v4(),
            borrower_id: Uuid::new_v4(),
            event_type: AdverseEventType::News,
            headline: format!("event {} days ago", days_ago),
            description: String::new(),
            source: "wire".to_string(),
            event_date: today - Duration::days(days_ago),
            risk_score: score,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 30).unwrap()
    }

    #[test]
    fn empty_history_scores_zero_and_stable() {
        let agg = aggregate_events(Uuid::new_v4(), &[], today());
        assert_eq!(agg.aggregate_risk_score, 0.0);
        assert_eq!(agg.trend, RiskTrend::Stable);
        assert_eq!(agg.event_count, 0);
    }

    #[test]
    fn recent_severe_event_dominates_a_stale_mild_one() {
        let events = vec![event(0, 9.0, today()), event(85, 3.0, today())];
        let agg = aggregate_events(Uuid::new_v4(), &events, today());
        assert!(agg.aggregate_risk_score > 7.0, "got {}", agg.aggregate_risk_score);
        assert_eq!(agg.trend, RiskTrend::Increasing);
        assert_eq!(agg.highest_risk_event.unwrap().risk_score, 9.0);
    }

    #[test]
    fn aggregate_stays_in_bounds_under_count_bonus() {
        let events: Vec<AdverseEvent> = (0..20).map(|i| event(i, 10.0, today())).collect();
        let agg = aggregate_events(Uuid::new_v4(), &events, today());
        assert!(agg.aggregate_risk_score <= 10.0);
        assert!(agg.aggregate_risk_score >= 1.0);
    }

    #[test]
    fn low_scores_clamp_up_to_one() {
        let events = vec![event(89, 1.0, today())];
        let agg = aggregate_events(Uuid::new_v4(), &events, today());
        assert!((agg.aggregate_risk_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn only_old_events_forces_decreasing_trend() {
        let events = vec![event(60, 5.0, today()), event(80, 6.0, today())];
        let agg = aggregate_events(Uuid::new_v4(), &events, today());
        assert_eq!(agg.trend, RiskTrend::Decreasing);
    }

    #[test]
    fn comparable_buckets_within_a_point_are_stable() {
        let events = vec![event(5, 5.5, today()), event(45, 5.0, today())];
        let agg = aggregate_events(Uuid::new_v4(), &events, today());
        assert_eq!(agg.trend, RiskTrend::Stable);
    }

    #[test]
    fn risk_factors_collect_material_headlines() {
        let events = vec![event(1, 8.0, today()), event(2, 2.0, today())];
        let agg = aggregate_events(Uuid::new_v4(), &events, today());
        assert_eq!(agg.risk_factors.len(), 1);
    }

    #[test]
    fn impact_table_covers_every_pair() {
        for covenant_type in CovenantType::iter() {
            for event_type in AdverseEventType::iter() {
                let w = impact_weight(covenant_type, event_type);
                assert!((0.0..=1.0).contains(&w));
            }
        }
    }

    #[test]
    fn rating_actions_bear_hardest_on_financial_covenants() {
        assert!(impact_weight(CovenantType::Financial, AdverseEventType::RatingAction) >= 0.5);
        assert!(impact_weight(CovenantType::Other, AdverseEventType::News) < 0.5);
    }
}
