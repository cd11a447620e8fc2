pub mod orchestrator;
pub mod registry;

pub use orchestrator::{verify_claim, OrchestratorConfig};
pub use registry::{RegisteredSource, SourceRegistry};
