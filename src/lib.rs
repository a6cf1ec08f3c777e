pub mod adverse;
pub mod alerts;
pub mod compliance;
pub mod core;
pub mod error;
pub mod extraction;
pub mod health;
pub mod metrics;
pub mod model;
pub mod providers;
pub mod ratios;
pub mod trend;

// Re-exports
pub use crate::core::{CovenantBackend, CovenantEngine, EngineConfig, EngineProviders};
pub use error::{EngineError, EngineResult};
