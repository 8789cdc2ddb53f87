//! 问题求解器 - 业务能力层
//!
//! 职责：
//! 1. 构建提示词并调用补全提供方
//! 2. 对回答做严格的题型校验（逐字选项、数字、布尔、长度）
//! 3. 校验不通过时做一次纠偏重试，再不通过即失败
//!
//! 凡是进表单的值必须先过校验；模型输出永远当不可信输入对待。
//! 无论成败，token 消耗都如实上报给调用方计账。

use crate::models::{
    AnswerKind, AnswerValue, Confidence, JobListing, Question, ResolvedAnswer,
};
use crate::services::llm_service::CompletionProvider;
use crate::services::prompt_builder::PromptBuilder;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// 求解失败的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionFailure {
    /// 两轮输出都不满足题型约束
    SchemaViolation,
    /// 补全提供方自身出错（网络、配额等）
    ProviderError,
    /// 选项集为空，或回答在大小写归一后命中多个选项
    AmbiguousChoice,
}

impl ResolutionFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionFailure::SchemaViolation => "SCHEMA_VIOLATION",
            ResolutionFailure::ProviderError => "PROVIDER_ERROR",
            ResolutionFailure::AmbiguousChoice => "AMBIGUOUS_CHOICE",
        }
    }
}

/// 求解失败
///
/// 携带已消耗的 token 数，失败的调用同样计入会话账目。
#[derive(Debug, Error)]
#[error("问题求解失败 [{}]: {detail} (已消耗 {tokens_spent} tokens)", reason.as_str())]
pub struct ResolutionError {
    pub reason: ResolutionFailure,
    pub detail: String,
    pub tokens_spent: u32,
}

/// 问题求解器
pub struct QuestionResolver<P: CompletionProvider> {
    provider: P,
    builder: PromptBuilder,
    numeric_pattern: Regex,
}

/// 校验结果：通过得到结构化值，不通过得到可回喂的违例描述
enum Verdict {
    Accepted(AnswerValue),
    Rejected(String),
}

impl<P: CompletionProvider> QuestionResolver<P> {
    pub fn new(provider: P, builder: PromptBuilder) -> Self {
        Self {
            provider,
            builder,
            // 可选小数部分的十进制数
            numeric_pattern: Regex::new(r"^-?\d+(\.\d+)?$")
                .unwrap_or_else(|_| unreachable!("固定正则必然合法")),
        }
    }

    /// 求解单个表单问题
    ///
    /// 首轮输出不合格时，把原始输出和违例原因回喂给模型重试一次；
    /// 第二轮仍不合格即以 SchemaViolation 失败。
    pub async fn resolve(
        &self,
        question: &Question,
        job: &JobListing,
    ) -> Result<ResolvedAnswer, ResolutionError> {
        // 选项集为空的单选题无从选起，不值得浪费一次调用
        if matches!(question.kind, AnswerKind::SingleChoice) && question.choices.is_empty() {
            return Err(ResolutionError {
                reason: ResolutionFailure::AmbiguousChoice,
                detail: "单选题没有任何可选项".to_string(),
                tokens_spent: 0,
            });
        }

        let mut tokens_spent = 0u32;

        let prompt = self.builder.build(question, job);
        let first = self
            .provider
            .complete(self.builder.system_prompt(), &prompt)
            .await
            .map_err(|e| ResolutionError {
                reason: ResolutionFailure::ProviderError,
                detail: e.to_string(),
                tokens_spent,
            })?;
        tokens_spent += first.tokens;

        let violation = match self.evaluate(question, &first.content, tokens_spent)? {
            Verdict::Accepted(value) => {
                return Ok(self.finish(value, &first.content, tokens_spent));
            }
            Verdict::Rejected(violation) => violation,
        };

        warn!("⚠️ 首轮回答不合格，纠偏重试: {}", violation);

        let corrective = self
            .builder
            .build_corrective(question, job, &first.content, &violation);
        let second = self
            .provider
            .complete(self.builder.system_prompt(), &corrective)
            .await
            .map_err(|e| ResolutionError {
                reason: ResolutionFailure::ProviderError,
                detail: e.to_string(),
                tokens_spent,
            })?;
        tokens_spent += second.tokens;

        match self.evaluate(question, &second.content, tokens_spent)? {
            Verdict::Accepted(value) => Ok(self.finish(value, &second.content, tokens_spent)),
            Verdict::Rejected(violation) => Err(ResolutionError {
                reason: ResolutionFailure::SchemaViolation,
                detail: format!("纠偏重试后仍不合格: {}", violation),
                tokens_spent,
            }),
        }
    }

    fn finish(&self, value: AnswerValue, raw: &str, tokens: u32) -> ResolvedAnswer {
        let confidence = parse_confidence(raw);
        debug!("✓ 回答通过校验，累计 {} tokens", tokens);
        ResolvedAnswer {
            value,
            confidence,
            raw_output: raw.to_string(),
            tokens,
        }
    }

    /// 解析并校验一轮输出
    ///
    /// 只有选项歧义会立刻以 Err 短路（重试解决不了歧义的选项集）；
    /// 其余不合格都作为 Rejected 返回，由调用方决定是否还有重试额度。
    fn evaluate(
        &self,
        question: &Question,
        raw: &str,
        tokens_spent: u32,
    ) -> Result<Verdict, ResolutionError> {
        let stripped = strip_code_fences(raw);
        let parsed: Value = match serde_json::from_str(&stripped) {
            Ok(v) => v,
            Err(e) => return Ok(Verdict::Rejected(format!("不是合法 JSON: {}", e))),
        };
        let Some(answer) = parsed.get("answer") else {
            return Ok(Verdict::Rejected("缺少 answer 字段".to_string()));
        };

        match &question.kind {
            AnswerKind::FreeText { max_chars } => {
                let Some(text) = answer.as_str() else {
                    return Ok(Verdict::Rejected("answer 必须是字符串".to_string()));
                };
                let text = text.trim();
                if text.is_empty() {
                    return Ok(Verdict::Rejected("answer 为空".to_string()));
                }
                if text.chars().count() > *max_chars {
                    return Ok(Verdict::Rejected(format!(
                        "answer 超过 {} 字符上限",
                        max_chars
                    )));
                }
                Ok(Verdict::Accepted(AnswerValue::Text(text.to_string())))
            }
            AnswerKind::SingleChoice => {
                let Some(reply) = answer.as_str() else {
                    return Ok(Verdict::Rejected("answer 必须是字符串".to_string()));
                };
                let reply = reply.trim();
                // 逐字命中优先
                if let Some(exact) = question.choices.iter().find(|c| c.as_str() == reply) {
                    return Ok(Verdict::Accepted(AnswerValue::Choice(exact.clone())));
                }
                // 大小写归一后唯一命中则取规范选项文本；多个命中即歧义
                let folded: Vec<&String> = question
                    .choices
                    .iter()
                    .filter(|c| c.eq_ignore_ascii_case(reply))
                    .collect();
                match folded.len() {
                    1 => Ok(Verdict::Accepted(AnswerValue::Choice(folded[0].clone()))),
                    0 => Ok(Verdict::Rejected(format!(
                        "'{}' 不在可选项之内",
                        reply
                    ))),
                    _ => Err(ResolutionError {
                        reason: ResolutionFailure::AmbiguousChoice,
                        detail: format!("'{}' 在大小写归一后命中多个选项", reply),
                        tokens_spent,
                    }),
                }
            }
            AnswerKind::Numeric => {
                if let Some(n) = answer.as_f64() {
                    return Ok(Verdict::Accepted(AnswerValue::Number(n)));
                }
                if let Some(text) = answer.as_str() {
                    let text = text.trim();
                    if self.numeric_pattern.is_match(text) {
                        if let Ok(n) = text.parse::<f64>() {
                            return Ok(Verdict::Accepted(AnswerValue::Number(n)));
                        }
                    }
                }
                Ok(Verdict::Rejected("answer 不是纯数字".to_string()))
            }
            AnswerKind::Boolean => {
                if let Some(b) = answer.as_bool() {
                    return Ok(Verdict::Accepted(AnswerValue::Bool(b)));
                }
                if let Some(text) = answer.as_str() {
                    match text.trim().to_ascii_lowercase().as_str() {
                        "true" | "yes" => return Ok(Verdict::Accepted(AnswerValue::Bool(true))),
                        "false" | "no" => return Ok(Verdict::Accepted(AnswerValue::Bool(false))),
                        _ => {}
                    }
                }
                Ok(Verdict::Rejected("answer 不是布尔值".to_string()))
            }
        }
    }
}

/// 剥掉模型偶尔包裹的 Markdown 代码块标记
fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed.strip_prefix("```") {
        let inner = inner.strip_prefix("json").unwrap_or(inner);
        let inner = inner.strip_suffix("```").unwrap_or(inner);
        return inner.trim().to_string();
    }
    trimmed.to_string()
}

fn parse_confidence(raw: &str) -> Confidence {
    let stripped = strip_code_fences(raw);
    serde_json::from_str::<Value>(&stripped)
        .ok()
        .and_then(|v| {
            v.get("confidence")
                .and_then(|c| c.as_str())
                .map(Confidence::from_str_lenient)
        })
        .unwrap_or(Confidence::Medium)
}
