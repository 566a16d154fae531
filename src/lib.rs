pub mod cleaning;
pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod features;
pub mod pipeline;
pub mod records;
pub mod roles;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod streak;
pub mod tables;

pub use config::PipelineConfig;
pub use error::PipelineError;
