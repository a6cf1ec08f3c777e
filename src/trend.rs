use crate::model::TrendDirection;

/// Slope magnitudes under this are treated as flat.
const STABLE_SLOPE_THRESHOLD: f64 = 0.05;

/// Projection assumes a quarterly reporting cadence.
const DAYS_PER_PERIOD: f64 = 90.0;

/// One historical observation of a covenant metric, paired with the
/// completeness confidence of the snapshot it came from.
#[derive(Debug, Clone, Copy)]
pub struct TrendPoint {
    pub value: f64,
    pub data_confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendResult {
    pub direction: TrendDirection,
    pub confidence: f64,
    pub slope: f64,
}

/// Estimate the trend of a metric from its chronological series
/// (oldest first). Ordinary least squares over index vs. value.
pub fn analyze(points: &[TrendPoint], lower_is_better: bool) -> TrendResult {
    if points.len() < 2 {
        return TrendResult {
            direction: TrendDirection::Stable,
            confidence: 0.0,
            slope: 0.0,
        };
    }

    let slope = ols_slope(points);
    let direction = if slope.abs() < STABLE_SLOPE_THRESHOLD {
        TrendDirection::Stable
    } else {
        let falling = slope < 0.0;
        if falling == lower_is_better {
            TrendDirection::Improving
        } else {
            TrendDirection::Deteriorating
        }
    };

    TrendResult {
        direction,
        confidence: confidence(points),
        slope,
    }
}

fn ols_slope(points: &[TrendPoint]) -> f64 {
    let n = points.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = points.iter().map(|p| p.value).sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, p) in points.iter().enumerate() {
        let dx = i as f64 - mean_x;
        numerator += dx * (p.value - mean_y);
        denominator += dx * dx;
    }
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// 0.5 base, up to +0.3 from series length, +0.2 scaled by the average
/// data confidence of the contributing snapshots.
fn confidence(points: &[TrendPoint]) -> f64 {
    let n = points.len();
    let length_bonus = ((n.saturating_sub(2)) as f64 * 0.1).min(0.3);
    let avg_data_confidence =
        points.iter().map(|p| p.data_confidence).sum::<f64>() / n as f64;
    (0.5 + length_bonus + 0.2 * avg_data_confidence).clamp(0.0, 1.0)
}

/// Days until the metric is projected to reach the threshold, assuming it
/// keeps moving at its historical velocity. `None` when the series is too
/// short or flat.
pub fn project_days_to_breach(points: &[TrendPoint], current: f64, threshold: f64) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let first = points.first()?.value;
    let last = points.last()?.value;
    let velocity = (last - first) / (points.len() - 1) as f64;
    if velocity == 0.0 {
        return None;
    }
    let periods_to_breach = (current - threshold).abs() / velocity.abs();
    Some(periods_to_breach * DAYS_PER_PERIOD)
}
