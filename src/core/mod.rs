pub mod config;
pub mod service;
pub mod types;

pub use config::EngineConfig;
pub use service::{CovenantEngine, EngineProviders};
pub use types::CovenantBackend;
