//! 提示词构建 - 业务能力层
//!
//! 按题型把"档案上下文 + 职位 + 问题 + 输出约束"拼成完整提示词。
//! 所有题型都要求 JSON 输出：`{"answer": ..., "confidence": "high|medium|low"}`，
//! 由求解器负责严格校验。

use crate::models::{AnswerKind, JobListing, KnowledgeProfile, Question};

const SYSTEM_PROMPT: &str = "\
你是一位帮助求职者填写职位申请表单的助手。

你会收到：
1. 求职者档案（简历、个人简介、联系方式）
2. 职位信息
3. 表单中的一个具体问题

要求：
- 只使用档案中真实存在的信息，绝不编造
- 回答专业、直接、简洁
- 必须只输出合法 JSON，不带任何额外文字或代码块标记
- JSON 格式固定为 {\"answer\": ..., \"confidence\": \"high|medium|low\"}
- 没有把握时 confidence 用 low，但 answer 仍须符合格式约束";

/// 提示词构建器
///
/// 持有档案上下文，逐题生成 user prompt。
pub struct PromptBuilder {
    profile_context: String,
}

impl PromptBuilder {
    pub fn new(profile: &KnowledgeProfile) -> Self {
        Self {
            profile_context: profile.context_for_llm(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    /// 按题型构建 user prompt
    pub fn build(&self, question: &Question, job: &JobListing) -> String {
        let mut parts = vec![
            "## 求职者档案".to_string(),
            self.profile_context.clone(),
            "\n## 职位".to_string(),
            format!("公司: {}", job.employer),
            format!("职位: {}", job.title),
        ];
        if let Some(location) = &job.location {
            parts.push(format!("地点: {}", location));
        }
        parts.push("\n## 问题".to_string());
        parts.push(question.prompt.clone());
        parts.push(self.format_constraint(question));
        parts.join("\n")
    }

    /// 在上一轮输出不合格后构建纠偏提示词
    ///
    /// 把原始输出和失败原因喂回去，重申格式约束，只给一次机会。
    pub fn build_corrective(
        &self,
        question: &Question,
        job: &JobListing,
        previous_output: &str,
        violation: &str,
    ) -> String {
        let mut prompt = self.build(question, job);
        prompt.push_str(&format!(
            "\n\n## 上一次回答不合格\n输出: {}\n问题: {}\n\
             请严格按照上面的回答格式重新输出，这是最后一次机会。",
            previous_output, violation
        ));
        prompt
    }

    fn format_constraint(&self, question: &Question) -> String {
        match &question.kind {
            AnswerKind::FreeText { max_chars } => format!(
                "\n## 回答格式\n只输出 JSON: {{\"answer\": \"回答文本\", \"confidence\": \"high|medium|low\"}}\n\
                 answer 不超过 {} 个字符。",
                max_chars
            ),
            AnswerKind::SingleChoice => {
                let options = question
                    .choices
                    .iter()
                    .map(|c| format!("- {}", c))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "\n## 可选项\n{}\n\n## 回答格式\n只输出 JSON: \
                     {{\"answer\": \"与上面某一项逐字一致\", \"confidence\": \"high|medium|low\"}}",
                    options
                )
            }
            AnswerKind::Numeric => "\n## 回答格式\n只输出 JSON: \
                 {\"answer\": 数字, \"confidence\": \"high|medium|low\"}\n\
                 answer 必须是纯数字，不带单位和文字。"
                .to_string(),
            AnswerKind::Boolean => "\n## 回答格式\n只输出 JSON: \
                 {\"answer\": true 或 false, \"confidence\": \"high|medium|low\"}"
                .to_string(),
        }
    }
}
