pub mod application_flow;
pub mod job_ctx;

pub use application_flow::{ApplicationFlow, JobOutcome};
pub use job_ctx::JobCtx;
