//! 招聘板抽象 - 编排层与浏览器之间的接缝

use crate::error::AppResult;
use crate::models::{JobListing, Question, ResolvedAnswer, SearchCriteria};
use async_trait::async_trait;

/// 招聘板
///
/// 编排层只通过这个 trait 访问浏览器；测试时用脚本化实现替换。
#[async_trait]
pub trait JobBoard: Send + Sync {
    /// 按检索条件列出当前可见的快速申请职位
    async fn find_applicable_jobs(
        &self,
        criteria: &SearchCriteria,
    ) -> AppResult<Vec<JobListing>>;

    /// 打开某个职位的申请表单
    ///
    /// 职位页正常加载但没有快速申请入口时返回 `Ok(None)`；
    /// 页面结构异常才算错误。
    async fn open(&self, job: &JobListing) -> AppResult<Option<Box<dyn FormHandle>>>;
}

/// 翻页结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStep {
    /// 申请已提交，表单结束
    Submitted,
    /// 进入下一页，可能还有问题待答
    NextPage,
}

/// 打开中的申请表单
///
/// 表单按页驱动：提取当前页问题 → 填答 → 翻页，
/// 直到 `advance` 报告已提交。每一页的问题只有翻到时才可见。
#[async_trait]
pub trait FormHandle: Send + Sync {
    /// 提取当前表单页的全部待答问题
    async fn extract_questions(&self) -> AppResult<Vec<Question>>;

    /// 把已校验的答案填进当前页对应控件
    async fn fill(&self, answers: &[(Question, ResolvedAnswer)]) -> AppResult<()>;

    /// 推进表单：优先提交，其次审阅或下一步
    async fn advance(&self) -> AppResult<FormStep>;

    /// 放弃申请，关闭表单弹窗
    async fn abandon(&self) -> AppResult<()>;
}
