//! LLM 服务 - 业务能力层
//!
//! 只负责"调用 LLM 拿回一段补全"这一件事，不关心题型和校验
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;

/// 一次补全的结果：文本内容 + 消耗的 token 数
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub tokens: u32,
}

/// 补全提供方抽象
///
/// 求解器只依赖这个 trait，测试时用脚本化的假提供方替换真实 API。
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, system_message: &str, user_message: &str) -> Result<Completion>;
}

/// LLM 服务
///
/// 职责：
/// - 调用 LLM API 获取 JSON 格式的回答
/// - 统计每次调用消耗的 token
/// - 不出现 Question / AnswerKind
/// - 不关心校验与重试
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    max_tokens: u32,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
            max_tokens: 512,
        }
    }
}

#[async_trait]
impl CompletionProvider for LlmService {
    async fn complete(&self, system_message: &str, user_message: &str) -> Result<Completion> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_message)
            .build()?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()?;
        let messages = vec![
            ChatCompletionRequestMessage::System(system_msg),
            ChatCompletionRequestMessage::User(user_msg),
        ];

        // 低温度 + JSON 模式，尽量拿到确定性的结构化输出
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.3)
            .max_tokens(self.max_tokens)
            .response_format(ResponseFormat::JsonObject)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            anyhow::anyhow!("LLM API 调用失败: {}", e)
        })?;

        let tokens = response
            .usage
            .as_ref()
            .map(|usage| usage.total_tokens)
            .unwrap_or(0);

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("LLM 返回内容为空"))?;

        debug!("LLM API 调用成功，消耗 {} tokens", tokens);

        Ok(Completion {
            content: content.trim().to_string(),
            tokens,
        })
    }
}
