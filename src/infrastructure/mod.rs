//! 基础设施层
//!
//! 只提供"能力"，不认识业务概念

pub mod js_executor;

pub use js_executor::JsExecutor;
