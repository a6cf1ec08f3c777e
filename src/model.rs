use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use strum::EnumIter;
use uuid::Uuid;

/// One reporting period of raw figures for one borrower. Immutable once
/// ingested; a later snapshot for the same period supersedes it only via
/// explicit update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub borrower_id: Uuid,
    pub period_date: NaiveDate,
    pub period_type: PeriodType,
    pub source: String,
    pub debt_total: Option<f64>,
    pub ebitda: Option<f64>,
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub operating_cash_flow: Option<f64>,
    pub capex: Option<f64>,
    pub interest_expense: Option<f64>,
    pub equity: Option<f64>,
    pub current_assets: Option<f64>,
    pub current_liabilities: Option<f64>,
}

impl FinancialSnapshot {
    pub fn empty(borrower_id: Uuid, period_date: NaiveDate) -> Self {
        FinancialSnapshot {
            borrower_id,
            period_date,
            period_type: PeriodType::Quarterly,
            source: String::new(),
            debt_total: None,
            ebitda: None,
            revenue: None,
            net_income: None,
            operating_cash_flow: None,
            capex: None,
            interest_expense: None,
            equity: None,
            current_assets: None,
            current_liabilities: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Monthly,
    Quarterly,
    Annual,
}

/// Derived ratios for one snapshot. Every ratio is `None` (never zero) when
/// a required input is missing or its denominator is zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinancialRatios {
    pub debt_to_ebitda: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub current_ratio: Option<f64>,
    pub interest_coverage: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub data_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Covenant {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub borrower_id: Uuid,
    pub name: String,
    pub covenant_type: CovenantType,
    pub metric: String,
    pub operator: ComparisonOperator,
    pub threshold: f64,
    pub unit: Option<String>,
    pub check_frequency: CheckFrequency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum CovenantType {
    Financial,
    Operational,
    Reporting,
    Other,
}

impl fmt::Display for CovenantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CovenantType::Financial => write!(f, "financial"),
            CovenantType::Operational => write!(f, "operational"),
            CovenantType::Reporting => write!(f, "reporting"),
            CovenantType::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
pub enum ComparisonOperator {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
}

impl ComparisonOperator {
    /// True when a smaller metric value is the safer side of the threshold.
    pub fn upper_bound(&self) -> bool {
        matches!(self, ComparisonOperator::Lt | ComparisonOperator::Lte)
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Lte => "<=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Gte => ">=",
            ComparisonOperator::Eq => "=",
            ComparisonOperator::Neq => "!=",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ComparisonOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "<" => Ok(ComparisonOperator::Lt),
            "<=" => Ok(ComparisonOperator::Lte),
            ">" => Ok(ComparisonOperator::Gt),
            ">=" => Ok(ComparisonOperator::Gte),
            "=" | "==" => Ok(ComparisonOperator::Eq),
            "!=" => Ok(ComparisonOperator::Neq),
            other => Err(format!("unknown comparison operator: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckFrequency {
    Monthly,
    Quarterly,
    Annually,
    OnDemand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceStatus {
    Compliant,
    Warning,
    Breached,
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplianceStatus::Compliant => write!(f, "compliant"),
            ComplianceStatus::Warning => write!(f, "warning"),
            ComplianceStatus::Breached => write!(f, "breached"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Stable,
    Deteriorating,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Improving => write!(f, "improving"),
            TrendDirection::Stable => write!(f, "stable"),
            TrendDirection::Deteriorating => write!(f, "deteriorating"),
        }
    }
}

/// Latest evaluation of a covenant against data. One current record per
/// covenant, overwritten on each recalculation and versioned only by
/// `last_calculated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovenantHealth {
    pub covenant_id: Uuid,
    pub current_value: Option<f64>,
    pub status: ComplianceStatus,
    pub buffer_percent: Option<f64>,
    pub trend: TrendDirection,
    pub trend_confidence: f64,
    pub days_to_breach: Option<f64>,
    pub narrative: String,
    pub narrative_confidence: f64,
    pub last_calculated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Warning,
    Critical,
    Breach,
    ReportingDue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Low => write!(f, "low"),
            AlertSeverity::Medium => write!(f, "medium"),
            AlertSeverity::High => write!(f, "high"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    New,
    Acknowledged,
    Escalated,
    Resolved,
}

/// Immutable alert event. Created only by the transition watcher or the
/// adverse-event path; lifecycle mutations happen outside this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub covenant_id: Option<Uuid>,
    pub contract_id: Option<Uuid>,
    pub borrower_id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub description: String,
    pub trigger_value: Option<f64>,
    pub threshold_value: Option<f64>,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum AdverseEventType {
    News,
    Litigation,
    RatingAction,
    Regulatory,
    Management,
}

impl fmt::Display for AdverseEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdverseEventType::News => write!(f, "news"),
            AdverseEventType::Litigation => write!(f, "litigation"),
            AdverseEventType::RatingAction => write!(f, "rating_action"),
            AdverseEventType::Regulatory => write!(f, "regulatory"),
            AdverseEventType::Management => write!(f, "management"),
        }
    }
}

/// A single external signal about a borrower, immutable once scored.
/// `risk_score` lives in [1, 10].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdverseEvent {
    pub id: Uuid,
    pub borrower_id: Uuid,
    pub event_type: AdverseEventType,
    pub headline: String,
    pub description: String,
    pub source: String,
    pub event_date: NaiveDate,
    pub risk_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTrend {
    Increasing,
    Stable,
    Decreasing,
}

/// Recomputed-on-demand view over all of a borrower's adverse events.
/// Never persisted as its own entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAggregation {
    pub borrower_id: Uuid,
    pub aggregate_risk_score: f64,
    pub risk_factors: Vec<String>,
    pub highest_risk_event: Option<AdverseEvent>,
    pub trend: RiskTrend,
    pub event_count: usize,
}
