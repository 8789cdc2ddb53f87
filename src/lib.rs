//! # Auto Job Apply
//!
//! 单操作者的自动化职位投递程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//!
//! ### ② 业务能力层（Services / Policy / Storage）
//! - `services/` - 描述"我能做什么"，只处理单个 Question
//! - `LlmService` - LLM 补全能力
//! - `QuestionResolver` - 表单问题求解（校验 + 一次纠偏重试）
//! - `policy/` - 频控决策（日上限、养号、延迟、疲劳、熔断）
//! - `storage/` - 只追加的投递台账（SQLite）
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个职位"的完整申请流程
//! - `JobCtx` - 上下文封装（job_id + 会话内序号）
//! - `ApplicationFlow` - 流程编排（open → 逐页 resolve/fill → advance）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/session` - 会话主循环，频控的唯一调用方
//! - `orchestrator/app` - 生产装配（浏览器、LLM、台账、档案）
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod services;
pub mod storage;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{connect_to_browser_and_page, FormHandle, JobBoard};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use models::{CandidacyRecord, CandidacyStatus, JobListing, Question};
pub use orchestrator::{App, Session, SessionEnd, SessionStats};
pub use policy::{Decision, RateLimiter};
pub use storage::CandidacyLedger;
pub use workflow::{ApplicationFlow, JobCtx, JobOutcome};
