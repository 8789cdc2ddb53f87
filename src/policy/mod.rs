//! 频控层（Rate Policy）
//!
//! ## 职责
//!
//! 守住"像人"这条安全底线：日上限、养号爬坡、随机延迟、疲劳暂停、连错熔断。
//! 本层是纯状态 + 决策逻辑，不碰浏览器、不碰 LLM；日计数的持久化由台账承担。

pub mod rate_limiter;
pub mod sampler;

pub use rate_limiter::{Decision, RateLimiter, RateLimiterOptions, RateStatus, SessionState};
pub use sampler::{DelaySampler, FixedSampler, ThreadRngSampler};
