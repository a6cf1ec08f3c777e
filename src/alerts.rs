use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{AlertSeverity, AlertType, ComplianceStatus, Covenant};

/// Alert payload handed to the alert sink, which assigns id/timestamps and
/// the `new` lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertDraft {
    pub covenant_id: Option<Uuid>,
    pub contract_id: Option<Uuid>,
    pub borrower_id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub description: String,
    pub trigger_value: Option<f64>,
    pub threshold_value: Option<f64>,
}

/// Watch a covenant's status transition and decide whether a human should
/// hear about it. Alerts fire only on a worsening transition — a covenant
/// that stays breached does not re-notify.
pub fn on_status_change(
    previous: ComplianceStatus,
    new: ComplianceStatus,
    covenant: &Covenant,
    current_value: Option<f64>,
    buffer_percent: Option<f64>,
) -> Option<AlertDraft> {
    use ComplianceStatus::*;

    let alert_type = match (previous, new) {
        (Compliant, Warning) => AlertType::Warning,
        (Compliant, Breached) | (Warning, Breached) => AlertType::Breach,
        _ => return None,
    };

    let severity = severity_for(new, buffer_percent);
    let value_text = current_value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "n/a".to_string());

    let title = match alert_type {
        AlertType::Breach => format!("Covenant breached: {}", covenant.name),
        _ => format!("Covenant at risk: {}", covenant.name),
    };
    let description = format!(
        "{} ({}) moved from {} to {}: current value {} against threshold {} {:.2}",
        covenant.name, covenant.metric, previous, new, value_text, covenant.operator,
        covenant.threshold,
    );

    Some(AlertDraft {
        covenant_id: Some(covenant.id),
        contract_id: Some(covenant.contract_id),
        borrower_id: covenant.borrower_id,
        alert_type,
        severity,
        title,
        description,
        trigger_value: current_value,
        threshold_value: Some(covenant.threshold),
    })
}

/// Single severity rule for every alerting transition. Any transition into
/// `breached` is `critical`; entering `warning` is graded by how close the
/// value sits to the threshold.
fn severity_for(new: ComplianceStatus, buffer_percent: Option<f64>) -> AlertSeverity {
    match new {
        ComplianceStatus::Breached => AlertSeverity::Critical,
        ComplianceStatus::Warning => {
            let distance = buffer_percent.map(f64::abs).unwrap_or(f64::MAX);
            if distance <= 5.0 {
                AlertSeverity::High
            } else if distance <= 15.0 {
                AlertSeverity::Medium
            } else {
                AlertSeverity::Low
            }
        }
        ComplianceStatus::Compliant => AlertSeverity::Low,
    }
}
