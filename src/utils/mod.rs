pub mod logging;

pub use logging::{init_tracing, log_recent_attempts, log_session_end};
