use std::{fmt, str::FromStr};
use strum::EnumIter;

use crate::error::EngineError;
use crate::model::{FinancialRatios, FinancialSnapshot};

/// The metrics a covenant may declare. Every variant maps to exactly one
/// derived ratio or raw snapshot field; an unknown declared name is a
/// configuration error and surfaces as `UnknownMetric` at evaluation time,
/// never a silent zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum MetricKind {
    DebtToEbitda,
    DebtToEquity,
    CurrentRatio,
    InterestCoverage,
    ReturnOnEquity,
    ReturnOnAssets,
    Ebitda,
    Revenue,
    NetIncome,
    OperatingCashFlow,
    Equity,
}

impl MetricKind {
    /// Whether a smaller value is the healthier one (leverage-type metrics).
    pub fn lower_is_better(&self) -> bool {
        matches!(self, MetricKind::DebtToEbitda | MetricKind::DebtToEquity)
    }

    /// Pull this metric's current value out of the derived ratios or the raw
    /// snapshot. `None` means the underlying data is unavailable, which is a
    /// valid state for evaluation (fail-open compliance applies).
    pub fn extract(&self, ratios: &FinancialRatios, snapshot: &FinancialSnapshot) -> Option<f64> {
        match self {
            MetricKind::DebtToEbitda => ratios.debt_to_ebitda,
            MetricKind::DebtToEquity => ratios.debt_to_equity,
            MetricKind::CurrentRatio => ratios.current_ratio,
            MetricKind::InterestCoverage => ratios.interest_coverage,
            MetricKind::ReturnOnEquity => ratios.return_on_equity,
            MetricKind::ReturnOnAssets => ratios.return_on_assets,
            MetricKind::Ebitda => snapshot.ebitda,
            MetricKind::Revenue => snapshot.revenue,
            MetricKind::NetIncome => snapshot.net_income,
            MetricKind::OperatingCashFlow => snapshot.operating_cash_flow,
            MetricKind::Equity => snapshot.equity,
        }
    }

    /// Resolve a covenant's declared metric name. Names arrive from
    /// extraction or manual entry in a handful of spellings.
    pub fn resolve(name: &str) -> Result<Self, EngineError> {
        name.parse::<MetricKind>()
            .map_err(|_| EngineError::UnknownMetric(name.to_string()))
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-', '/'], "_");
        match normalized.as_str() {
            "debt_to_ebitda" | "debt_ebitda" | "leverage_ratio" => Ok(MetricKind::DebtToEbitda),
            "debt_to_equity" | "debt_equity" => Ok(MetricKind::DebtToEquity),
            "current_ratio" => Ok(MetricKind::CurrentRatio),
            "interest_coverage" | "interest_coverage_ratio" => Ok(MetricKind::InterestCoverage),
            "return_on_equity" | "roe" => Ok(MetricKind::ReturnOnEquity),
            "return_on_assets" | "roa" => Ok(MetricKind::ReturnOnAssets),
            "ebitda" => Ok(MetricKind::Ebitda),
            "revenue" => Ok(MetricKind::Revenue),
            "net_income" => Ok(MetricKind::NetIncome),
            "operating_cash_flow" | "ocf" => Ok(MetricKind::OperatingCashFlow),
            "equity" | "net_worth" => Ok(MetricKind::Equity),
            other => Err(format!("unknown metric: {}", other)),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetricKind::DebtToEbitda => "debt_to_ebitda",
            MetricKind::DebtToEquity => "debt_to_equity",
            MetricKind::CurrentRatio => "current_ratio",
            MetricKind::InterestCoverage => "interest_coverage",
            MetricKind::ReturnOnEquity => "return_on_equity",
            MetricKind::ReturnOnAssets => "return_on_assets",
            MetricKind::Ebitda => "ebitda",
            MetricKind::Revenue => "revenue",
            MetricKind::NetIncome => "net_income",
            MetricKind::OperatingCashFlow => "operating_cash_flow",
            MetricKind::Equity => "equity",
        };
        write!(f, "{}", s)
    }
}
