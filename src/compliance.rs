use crate::model::{ComparisonOperator, ComplianceStatus};

/// Tolerance applied to `=`/`!=` comparisons on floating-point figures.
pub const EQUALITY_TOLERANCE: f64 = 0.01;

/// A failed check within this many buffer points of the threshold is a
/// `warning` rather than a `breached`. Fixed policy, not per-covenant.
pub const WARNING_BUFFER_PERCENT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplianceOutcome {
    pub status: ComplianceStatus,
    /// Signed distance from threshold in percent, normalized so that
    /// positive always means "safer". `None` when either figure is absent.
    pub buffer_percent: Option<f64>,
}

/// Evaluate one covenant check. Absent data defaults to `compliant`
/// (fail-open policy: missing figures must not by themselves raise alerts).
pub fn evaluate(
    current: Option<f64>,
    threshold: Option<f64>,
    operator: ComparisonOperator,
) -> ComplianceOutcome {
    let (current, threshold) = match (current, threshold) {
        (Some(c), Some(t)) => (c, t),
        _ => {
            return ComplianceOutcome {
                status: ComplianceStatus::Compliant,
                buffer_percent: None,
            }
        }
    };

    let buffer = buffer_percent(current, threshold, operator);

    if condition_holds(current, threshold, operator) {
        return ComplianceOutcome {
            status: ComplianceStatus::Compliant,
            buffer_percent: Some(buffer),
        };
    }

    let status = if buffer.abs() <= WARNING_BUFFER_PERCENT {
        ComplianceStatus::Warning
    } else {
        ComplianceStatus::Breached
    };
    ComplianceOutcome {
        status,
        buffer_percent: Some(buffer),
    }
}

fn condition_holds(current: f64, threshold: f64, operator: ComparisonOperator) -> bool {
    match operator {
        ComparisonOperator::Lt => current < threshold,
        ComparisonOperator::Lte => current <= threshold,
        ComparisonOperator::Gt => current > threshold,
        ComparisonOperator::Gte => current >= threshold,
        ComparisonOperator::Eq => (current - threshold).abs() <= EQUALITY_TOLERANCE,
        ComparisonOperator::Neq => (current - threshold).abs() > EQUALITY_TOLERANCE,
    }
}

/// `(current - threshold) / |threshold| * 100`, sign-flipped for
/// upper-bound operators so positive is always the safe side. A zero
/// threshold divides by 1 to keep the figure finite.
pub fn buffer_percent(current: f64, threshold: f64, operator: ComparisonOperator) -> f64 {
    let denominator = if threshold == 0.0 { 1.0 } else { threshold.abs() };
    let raw = (current - threshold) / denominator * 100.0;
    if operator.upper_bound() {
        -raw
    } else {
        raw
    }
}
