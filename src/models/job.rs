use serde::{Deserialize, Serialize};

/// 职位列表项
///
/// 由浏览器协作方从搜索结果页提取，`job_id` 是平台侧的唯一标识
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListing {
    #[serde(rename = "jobId")]
    pub job_id: String,
    pub employer: String,
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub url: String,
}

impl JobListing {
    /// 用于日志显示的名称
    pub fn display_name(&self) -> String {
        format!("{} @ {}", self.title, self.employer)
    }
}

/// 职位搜索条件
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    pub keywords: Vec<String>,
    pub location: String,
    pub remote_only: bool,
}

impl SearchCriteria {
    /// 拼接平台搜索查询串
    pub fn query_string(&self) -> String {
        self.keywords.join(" OR ")
    }
}
