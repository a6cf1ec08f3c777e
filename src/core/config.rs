use anyhow::{anyhow, Result};

/// Engine tuning knobs, environment-driven with working defaults.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub max_concurrent_jobs: usize,
    pub max_job_retries: u32,
    pub job_retention_hours: i64,
    pub history_depth: usize,
    pub min_candidate_confidence: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_concurrent_jobs: 3,
            max_job_retries: 3,
            job_retention_hours: 24,
            history_depth: 4,
            min_candidate_confidence: 0.3,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = EngineConfig::default();
        Ok(EngineConfig {
            max_concurrent_jobs: env_or(
                "COVWATCH_MAX_CONCURRENT_JOBS",
                defaults.max_concurrent_jobs,
            )?,
            max_job_retries: env_or("COVWATCH_MAX_JOB_RETRIES", defaults.max_job_retries)?,
            job_retention_hours: env_or(
                "COVWATCH_JOB_RETENTION_HOURS",
                defaults.job_retention_hours,
            )?,
            history_depth: env_or("COVWATCH_HISTORY_DEPTH", defaults.history_depth)?,
            min_candidate_confidence: env_or(
                "COVWATCH_MIN_CANDIDATE_CONFIDENCE",
                defaults.min_candidate_confidence,
            )?,
        })
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| anyhow!("{} is not a valid value for {}", raw, name)),
        Err(_) => Ok(default),
    }
}
