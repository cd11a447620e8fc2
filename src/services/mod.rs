pub mod jobs;
pub mod pipeline;

pub use jobs::{JobHandle, JobState, JobStatus, JobTracker};
pub use pipeline::{PipelineConfig, VerificationPipeline};
