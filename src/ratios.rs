use crate::error::{EngineError, EngineResult};
use crate::model::{FinancialRatios, FinancialSnapshot};

/// Derive standard financial ratios from one snapshot.
///
/// A ratio is computed only when every input is present and the denominator
/// is non-zero; otherwise it stays `None`. Zero is a valid computed value
/// and must never stand in for "unavailable".
pub fn calculate_ratios(snapshot: &FinancialSnapshot) -> EngineResult<FinancialRatios> {
    validate_snapshot(snapshot)?;

    let total_assets = match (snapshot.debt_total, snapshot.equity) {
        (Some(debt), Some(equity)) => Some(debt + equity),
        _ => None,
    };

    Ok(FinancialRatios {
        debt_to_ebitda: divide(snapshot.debt_total, snapshot.ebitda),
        debt_to_equity: divide(snapshot.debt_total, snapshot.equity),
        current_ratio: divide(snapshot.current_assets, snapshot.current_liabilities),
        interest_coverage: divide(snapshot.ebitda, snapshot.interest_expense),
        return_on_equity: divide(snapshot.net_income, snapshot.equity).map(|r| r * 100.0),
        return_on_assets: divide(snapshot.net_income, total_assets).map(|r| r * 100.0),
        data_confidence: data_confidence(snapshot),
    })
}

fn divide(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

/// Heuristic completeness score in [0, 1]: 0.5 base, up to +0.3 for the five
/// key metrics, +0.1 for the current-assets/liabilities pair, +0.1 for the
/// revenue/net-income pair.
fn data_confidence(snapshot: &FinancialSnapshot) -> f64 {
    let key_metrics = [
        snapshot.debt_total,
        snapshot.ebitda,
        snapshot.revenue,
        snapshot.net_income,
        snapshot.equity,
    ];
    let present = key_metrics.iter().filter(|m| m.is_some()).count();

    let mut confidence = 0.5 + 0.3 * (present as f64 / key_metrics.len() as f64);
    if snapshot.current_assets.is_some() && snapshot.current_liabilities.is_some() {
        confidence += 0.1;
    }
    if snapshot.revenue.is_some() && snapshot.net_income.is_some() {
        confidence += 0.1;
    }
    confidence.clamp(0.0, 1.0)
}

fn validate_snapshot(snapshot: &FinancialSnapshot) -> EngineResult<()> {
    // Net income, OCF and interest expense may legitimately be negative.
    let non_negative = [
        ("debt_total", snapshot.debt_total),
        ("ebitda", snapshot.ebitda),
        ("revenue", snapshot.revenue),
        ("equity", snapshot.equity),
        ("current_assets", snapshot.current_assets),
        ("current_liabilities", snapshot.current_liabilities),
        ("capex", snapshot.capex),
    ];
    for (field, value) in non_negative {
        if let Some(v) = value {
            if v < 0.0 {
                return Err(EngineError::validation(format!(
                    "{} cannot be negative: {}",
                    field, v
                )));
            }
        }
    }

    let all = [
        snapshot.debt_total,
        snapshot.ebitda,
        snapshot.revenue,
        snapshot.net_income,
        snapshot.operating_cash_flow,
        snapshot.capex,
        snapshot.interest_expense,
        snapshot.equity,
        snapshot.current_assets,
        snapshot.current_liabilities,
    ];
    if all.iter().flatten().any(|v| !v.is_finite()) {
        return Err(EngineError::validation(
            "snapshot contains a non-finite figure",
        ));
    }
    Ok(())
}
