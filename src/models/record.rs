use chrono::{DateTime, Local, NaiveDate};

/// 投递记录状态
///
/// 与数据库的 CHECK 约束一一对应，只有这三种取值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidacyStatus {
    Success,
    Failure,
    Skipped,
}

impl CandidacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidacyStatus::Success => "SUCCESS",
            CandidacyStatus::Failure => "FAILURE",
            CandidacyStatus::Skipped => "SKIPPED",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "SUCCESS" => Some(CandidacyStatus::Success),
            "FAILURE" => Some(CandidacyStatus::Failure),
            "SKIPPED" => Some(CandidacyStatus::Skipped),
            _ => None,
        }
    }
}

/// 投递记录
///
/// 台账中一行，对应一次对某职位的处理尝试。
/// 只追加、写入后不可变、永不删除。
#[derive(Debug, Clone)]
pub struct CandidacyRecord {
    /// 职位外部唯一标识（台账全史唯一）
    pub job_id: String,
    pub employer: String,
    pub title: String,
    pub location: Option<String>,
    pub applied_at: DateTime<Local>,
    pub status: CandidacyStatus,
    /// 失败或跳过的原因
    pub detail: Option<String>,
    /// 本次投递消耗的 LLM token 数
    pub llm_tokens: Option<u32>,
}

impl CandidacyRecord {
    pub fn new(
        job_id: impl Into<String>,
        employer: impl Into<String>,
        title: impl Into<String>,
        location: Option<String>,
        status: CandidacyStatus,
        detail: Option<String>,
        llm_tokens: Option<u32>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            employer: employer.into(),
            title: title.into(),
            location,
            applied_at: Local::now(),
            status,
            detail,
            llm_tokens,
        }
    }

    /// 记录所属的日历日（日统计的键）
    pub fn applied_on(&self) -> NaiveDate {
        self.applied_at.date_naive()
    }
}
