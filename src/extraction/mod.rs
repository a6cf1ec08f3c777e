use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::EngineError;
use crate::model::{CheckFrequency, ComparisonOperator, Covenant, CovenantType};

pub mod queue;

pub use queue::{DispatchOutcome, ExtractionQueue, QueueConfig, QueueStats};

/// Candidates scored under this are discarded before persistence.
pub const MIN_CANDIDATE_CONFIDENCE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    Low,
    Normal,
    High,
}

impl fmt::Display for JobPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobPriority::Low => write!(f, "low"),
            JobPriority::Normal => write!(f, "normal"),
            JobPriority::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One contract-text extraction attempt, owned by the queue for its
/// lifetime and purged after the retention window once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionJob {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub status: JobStatus,
    pub priority: JobPriority,
    pub progress_percent: u8,
    pub retry_count: u32,
    pub max_retries: u32,
    pub error: Option<String>,
    pub covenants_extracted: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExtractionJob {
    /// A terminal failure rendered as an error value, for callers that
    /// surface job outcomes through the engine's error taxonomy.
    pub fn failure(&self) -> Option<EngineError> {
        match self.status {
            JobStatus::Failed => Some(EngineError::RetriesExhausted {
                job_id: self.id,
                attempts: self.retry_count,
                message: self.error.clone().unwrap_or_default(),
            }),
            _ => None,
        }
    }
}

/// A covenant candidate as the extraction model emits it, before any
/// validation or classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCandidate {
    pub name: String,
    pub clause_text: String,
    pub metric: String,
    pub operator: String,
    pub threshold: f64,
    pub unit: Option<String>,
    pub check_frequency: String,
    pub confidence: f64,
}

/// Validate one extracted candidate into a covenant record. Rejection is
/// per-candidate: a bad candidate never fails the job it arrived in.
pub fn validate_candidate(
    candidate: &RawCandidate,
    contract_id: Uuid,
    borrower_id: Uuid,
    min_confidence: f64,
) -> Result<Covenant, String> {
    if candidate.confidence < min_confidence {
        return Err(format!(
            "confidence {:.2} below threshold {:.2}",
            candidate.confidence, min_confidence
        ));
    }
    let operator = candidate
        .operator
        .parse::<ComparisonOperator>()
        .map_err(|e| format!("rejected operator: {}", e))?;
    if !candidate.threshold.is_finite() {
        return Err(format!("non-finite threshold: {}", candidate.threshold));
    }

    Ok(Covenant {
        id: Uuid::new_v4(),
        contract_id,
        borrower_id,
        name: candidate.name.clone(),
        covenant_type: classify(&candidate.name, &candidate.clause_text),
        metric: candidate.metric.clone(),
        operator,
        threshold: candidate.threshold,
        unit: candidate.unit.clone(),
        check_frequency: normalize_frequency(&candidate.check_frequency),
    })
}

const FINANCIAL_KEYWORDS: &[&str] = &[
    "debt", "ebitda", "leverage", "ratio", "coverage", "liquidity", "net worth", "cash flow",
    "interest", "equity", "capital",
];

const REPORTING_KEYWORDS: &[&str] = &[
    "report", "statement", "deliver", "notice", "audit", "certificate", "filing",
];

const OPERATIONAL_KEYWORDS: &[&str] = &[
    "maintain", "insurance", "asset", "disposal", "merger", "operations", "management",
];

/// Classify a candidate by keyword matching over its name and clause text.
/// Financial keywords outrank reporting keywords, which outrank
/// operational ones.
pub fn classify(name: &str, clause_text: &str) -> CovenantType {
    let haystack = format!("{} {}", name, clause_text).to_lowercase();
    if FINANCIAL_KEYWORDS.iter().any(|k| haystack.contains(k)) {
        CovenantType::Financial
    } else if REPORTING_KEYWORDS.iter().any(|k| haystack.contains(k)) {
        CovenantType::Reporting
    } else if OPERATIONAL_KEYWORDS.iter().any(|k| haystack.contains(k)) {
        CovenantType::Operational
    } else {
        CovenantType::Other
    }
}

/// Normalize a free-text check frequency. Quarterly is the default cadence
/// when the text matches nothing recognizable.
pub fn normalize_frequency(text: &str) -> CheckFrequency {
    let lower = text.to_lowercase();
    if lower.contains("month") {
        CheckFrequency::Monthly
    } else if lower.contains("annual") || lower.contains("year") {
        CheckFrequency::Annually
    } else if lower.contains("demand") || lower.contains("request") {
        CheckFrequency::OnDemand
    } else {
        CheckFrequency::Quarterly
    }
}
