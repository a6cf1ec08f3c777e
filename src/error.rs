use thiserror::Error;

/// Engine-level error taxonomy.
///
/// Pure computational modules raise only `Validation`/`UnknownMetric`.
/// Orchestration absorbs `ExternalService` wherever a sane default exists
/// and only lets it propagate when no fallback is possible.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("unknown covenant metric: {0}")]
    UnknownMetric(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("external service '{service}' failed: {message}")]
    ExternalService { service: &'static str, message: String },

    #[error("extraction job {job_id} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        job_id: uuid::Uuid,
        attempts: u32,
        message: String,
    },
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn external(service: &'static str, message: impl Into<String>) -> Self {
        EngineError::ExternalService {
            service,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
