pub mod config;
pub mod db;
pub mod errors;
pub mod intelligence;
pub mod ledger;
pub mod metrics;
pub mod models;
pub mod services;
pub mod sources;
pub mod verification;

pub use errors::PipelineError;
pub use services::pipeline::{PipelineConfig, VerificationPipeline};
