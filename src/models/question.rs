use serde::{Deserialize, Serialize};

/// 答案类型约束
///
/// 由浏览器协作方在提取表单时判定。数字/文本二义时取更严格的形状：
/// 只有表单控件本身是数字输入框才判定为 Numeric，题面文字不做提升。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerKind {
    /// 自由文本，带长度上限
    FreeText { max_chars: usize },
    /// 单选，答案必须逐字属于 choices
    SingleChoice,
    /// 纯数字（整数或小数，不带单位和多余文字）
    Numeric,
    /// 是/否
    Boolean,
}

/// 单个表单问题（瞬态，随表单提取产生，使用后即丢弃）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// 题面文字
    pub prompt: String,
    #[serde(flatten)]
    pub kind: AnswerKind,
    /// 单选时的候选项，顺序有意义
    #[serde(default)]
    pub choices: Vec<String>,
}

impl Question {
    pub fn free_text(prompt: impl Into<String>, max_chars: usize) -> Self {
        Self {
            prompt: prompt.into(),
            kind: AnswerKind::FreeText { max_chars },
            choices: Vec::new(),
        }
    }

    pub fn single_choice(prompt: impl Into<String>, choices: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            kind: AnswerKind::SingleChoice,
            choices,
        }
    }

    pub fn numeric(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            kind: AnswerKind::Numeric,
            choices: Vec::new(),
        }
    }

    pub fn boolean(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            kind: AnswerKind::Boolean,
            choices: Vec::new(),
        }
    }
}

/// 按答案类型定型后的答案值
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerValue {
    Text(String),
    Choice(String),
    Number(f64),
    Bool(bool),
}

impl AnswerValue {
    /// 渲染为填入表单控件的字符串
    pub fn as_form_value(&self) -> String {
        match self {
            AnswerValue::Text(s) | AnswerValue::Choice(s) => s.clone(),
            AnswerValue::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            AnswerValue::Bool(b) => if *b { "Yes" } else { "No" }.to_string(),
        }
    }
}

/// 置信度指示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn from_str_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Confidence::High,
            "low" => Confidence::Low,
            _ => Confidence::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

/// 问题解析器产出的已校验答案（瞬态）
#[derive(Debug, Clone)]
pub struct ResolvedAnswer {
    pub value: AnswerValue,
    pub confidence: Confidence,
    /// 模型原始输出，用于审计
    pub raw_output: String,
    /// 本次解析消耗的 token 数（含纠错重试）
    pub tokens: u32,
}
