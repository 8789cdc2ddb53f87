//! 业务能力层
//!
//! 每个服务只提供一种能力，不关心流程顺序：
//! - `llm_service`: LLM API 调用（含可注入的补全抽象）
//! - `prompt_builder`: 按题型构建提示词
//! - `question_resolver`: 表单问题求解（校验 + 一次纠偏重试）

pub mod llm_service;
pub mod prompt_builder;
pub mod question_resolver;

pub use llm_service::{Completion, CompletionProvider, LlmService};
pub use prompt_builder::PromptBuilder;
pub use question_resolver::{QuestionResolver, ResolutionError, ResolutionFailure};
