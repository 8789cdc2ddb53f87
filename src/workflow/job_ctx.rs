//! 职位处理上下文
//!
//! 封装"我正在处理本次会话的第几个职位"这一信息

use std::fmt::Display;

/// 职位处理上下文
#[derive(Debug, Clone)]
pub struct JobCtx {
    /// 职位ID
    pub job_id: String,

    /// 职位在本次会话中的序号（仅用于日志显示，从1开始）
    pub job_index: usize,

    /// 雇主名称
    pub employer: String,

    /// 职位名称
    pub title: String,
}

impl JobCtx {
    /// 创建新的职位上下文
    pub fn new(job_id: String, job_index: usize, employer: String, title: String) -> Self {
        Self {
            job_id,
            job_index,
            employer,
            title,
        }
    }
}

impl Display for JobCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[职位 ID#{} {} @ {}]",
            self.job_id, self.title, self.employer
        )
    }
}
