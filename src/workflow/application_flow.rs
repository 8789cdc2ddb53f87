//! 单职位申请流程 - 流程层
//!
//! 核心职责：定义"一个职位"的完整申请流程
//!
//! 流程顺序：
//! 1. 打开职位页并进入快速申请表单
//! 2. 逐页推进：提取当前页问题 → 逐题求解 → 填答 → 翻页，
//!    直到翻页动作命中提交（每题之间检查停止信号）
//! 3. 翻页瞬时失败时重试一次
//!
//! 产出四种终局之一：成功 / 失败 / 跳过 / 被打断。
//! 所有错误都折叠为终局，不向上冒泡，由编排层决定后续。

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::browser::{FormHandle, FormStep, JobBoard};
use crate::error::AppError;
use crate::models::{JobListing, Question, ResolvedAnswer};
use crate::services::{CompletionProvider, QuestionResolver};
use crate::workflow::job_ctx::JobCtx;

/// 翻页瞬时失败后的重试间隔
const SUBMIT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// 表单翻页安全上限，超过视为布局异常
const MAX_FORM_PAGES: u32 = 10;

/// 单职位申请的终局
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// 表单已提交
    Success { tokens: u32 },
    /// 申请过程出错（计入会话连续错误）
    Failure { reason: String, tokens: u32 },
    /// 主动放弃该职位（不计入上限和连续错误）
    Skipped { reason: String, tokens: u32 },
    /// 停止信号在题与题之间命中，表单已放弃
    Interrupted,
}

/// 单职位申请流程
///
/// 职责：
/// - 编排完整的申请流程
/// - 决定何时提取、何时求解、何时翻页
/// - 不持有任何浏览器资源
/// - 只依赖业务能力（services）与招聘板抽象
pub struct ApplicationFlow<P: CompletionProvider> {
    resolver: QuestionResolver<P>,
}

impl<P: CompletionProvider> ApplicationFlow<P> {
    pub fn new(resolver: QuestionResolver<P>) -> Self {
        Self { resolver }
    }

    pub async fn run(
        &self,
        board: &dyn JobBoard,
        job: &JobListing,
        ctx: &JobCtx,
        stop: &watch::Receiver<bool>,
    ) -> JobOutcome {
        info!("[职位 {}] 🚀 开始申请: {}", ctx.job_index, job.display_name());

        // ========== 流程 1: 打开快速申请表单 ==========
        let form = match board.open(job).await {
            Ok(Some(form)) => form,
            Ok(None) => {
                info!("[职位 {}] ⏭ 无快速申请入口，跳过", ctx.job_index);
                return JobOutcome::Skipped {
                    reason: "无快速申请入口".to_string(),
                    tokens: 0,
                };
            }
            Err(e) => {
                error!("[职位 {}] ❌ 打开表单失败: {}", ctx.job_index, e);
                return JobOutcome::Failure {
                    reason: e.to_string(),
                    tokens: 0,
                };
            }
        };

        // ========== 流程 2: 逐页提取、求解、填答、翻页 ==========
        // 多页表单每页的问题只有翻到时才能提取，所以解答必须按页进行
        let mut tokens = 0u32;
        for page in 1..=MAX_FORM_PAGES {
            let questions = match form.extract_questions().await {
                Ok(questions) => questions,
                Err(e) => {
                    error!(
                        "[职位 {}] ❌ 第 {} 页提取问题失败: {}",
                        ctx.job_index, page, e
                    );
                    let _ = form.abandon().await;
                    return JobOutcome::Failure {
                        reason: e.to_string(),
                        tokens,
                    };
                }
            };
            if !questions.is_empty() {
                info!(
                    "[职位 {}] 📋 第 {} 页共 {} 个问题",
                    ctx.job_index,
                    page,
                    questions.len()
                );
            }

            let mut answers: Vec<(Question, ResolvedAnswer)> =
                Vec::with_capacity(questions.len());
            for (i, question) in questions.iter().enumerate() {
                // 停止信号只在题与题之间生效，不打断进行中的调用
                if *stop.borrow() {
                    info!("[职位 {}] 🛑 收到停止信号，放弃当前表单", ctx.job_index);
                    let _ = form.abandon().await;
                    return JobOutcome::Interrupted;
                }

                match self.resolver.resolve(question, job).await {
                    Ok(answer) => {
                        tokens += answer.tokens;
                        info!(
                            "[职位 {}] ✓ 第 {} 页第 {} 题已解答 (置信度: {})",
                            ctx.job_index,
                            page,
                            i + 1,
                            answer.confidence.as_str()
                        );
                        answers.push((question.clone(), answer));
                    }
                    // 求解失败（已含一次纠偏重试）= 该职位失败，会话继续
                    Err(e) => {
                        tokens += e.tokens_spent;
                        warn!(
                            "[职位 {}] ⚠️ 第 {} 页第 {} 题求解失败，放弃该职位: {}",
                            ctx.job_index,
                            page,
                            i + 1,
                            e
                        );
                        let _ = form.abandon().await;
                        return JobOutcome::Failure {
                            reason: format!("问题求解失败: {}", e),
                            tokens,
                        };
                    }
                }
            }

            if !answers.is_empty() {
                if let Err(e) = form.fill(&answers).await {
                    error!("[职位 {}] ❌ 第 {} 页填写失败: {}", ctx.job_index, page, e);
                    let _ = form.abandon().await;
                    return JobOutcome::Failure {
                        reason: e.to_string(),
                        tokens,
                    };
                }
            }

            // ========== 流程 3: 翻页（瞬时错误重试一次）==========
            match self.advance_with_retry(form.as_ref(), ctx).await {
                Ok(FormStep::Submitted) => {
                    info!(
                        "[职位 {}] 🎉 申请成功，共消耗 {} tokens",
                        ctx.job_index, tokens
                    );
                    return JobOutcome::Success { tokens };
                }
                Ok(FormStep::NextPage) => {}
                Err(e) => {
                    error!("[职位 {}] ❌ 表单推进失败: {}", ctx.job_index, e);
                    let _ = form.abandon().await;
                    return JobOutcome::Failure {
                        reason: e.to_string(),
                        tokens,
                    };
                }
            }
        }

        warn!(
            "[职位 {}] ⚠️ 表单超过 {} 页仍未提交，放弃",
            ctx.job_index, MAX_FORM_PAGES
        );
        let _ = form.abandon().await;
        JobOutcome::Failure {
            reason: format!("表单超过 {} 页仍未到达提交", MAX_FORM_PAGES),
            tokens,
        }
    }

    async fn advance_with_retry(
        &self,
        form: &dyn FormHandle,
        ctx: &JobCtx,
    ) -> Result<FormStep, AppError> {
        match form.advance().await {
            Ok(step) => Ok(step),
            Err(e) if is_transient(&e) => {
                warn!("[职位 {}] ⚠️ 翻页瞬时失败，重试一次: {}", ctx.job_index, e);
                tokio::time::sleep(SUBMIT_RETRY_DELAY).await;
                form.advance().await
            }
            Err(e) => Err(e),
        }
    }
}

fn is_transient(e: &AppError) -> bool {
    e.as_form_error().map(|f| f.is_transient()).unwrap_or(false)
}
