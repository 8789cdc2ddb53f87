//! 会话主循环 - 编排层
//!
//! 每个职位的处理次序固定：
//! 1. 台账查重（在任何浏览器动作之前，不消耗频控额度）
//! 2. 频控问询，Allow 之前只等待或终止
//! 3. 申请流程，产出终局
//! 4. 终局落账，再回报给频控
//!
//! `can_act` 只在这里被调用；任何旁路都会破坏频控的状态机。

use chrono::Local;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::models::{CandidacyRecord, CandidacyStatus, SearchCriteria};
use crate::browser::JobBoard;
use crate::policy::{Decision, RateLimiter};
use crate::services::CompletionProvider;
use crate::storage::CandidacyLedger;
use crate::error::StorageError;
use crate::orchestrator::sleeper::Sleeper;
use crate::workflow::{ApplicationFlow, JobCtx, JobOutcome};

/// 会话结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// 检索结果处理完毕
    Exhausted,
    /// 日上限触发
    CapReached,
    /// 连续错误熔断
    Aborted,
    /// 操作者停止
    Stopped,
}

impl SessionEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEnd::Exhausted => "EXHAUSTED",
            SessionEnd::CapReached => "CAP_REACHED",
            SessionEnd::Aborted => "ABORTED",
            SessionEnd::Stopped => "STOPPED",
        }
    }
}

/// 会话统计
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub end: SessionEnd,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub tokens: u32,
}

/// 一次投递会话
pub struct Session<P: CompletionProvider> {
    board: Box<dyn JobBoard>,
    flow: ApplicationFlow<P>,
    ledger: CandidacyLedger,
    limiter: RateLimiter,
    sleeper: Box<dyn Sleeper>,
    criteria: SearchCriteria,
    stop: watch::Receiver<bool>,
}

impl<P: CompletionProvider> Session<P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        board: Box<dyn JobBoard>,
        flow: ApplicationFlow<P>,
        ledger: CandidacyLedger,
        limiter: RateLimiter,
        sleeper: Box<dyn Sleeper>,
        criteria: SearchCriteria,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            board,
            flow,
            ledger,
            limiter,
            sleeper,
            criteria,
            stop,
        }
    }

    /// 运行会话直到终止条件之一命中
    pub async fn run(mut self) -> anyhow::Result<SessionStats> {
        let mut stats = SessionStats {
            end: SessionEnd::Exhausted,
            processed: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            duplicates: 0,
            tokens: 0,
        };

        let status = self.limiter.status();
        info!(
            "📊 本次会话额度: {}/{} (今日已投 {})",
            status.remaining, status.daily_cap, status.applications_today
        );

        // 检索阶段出错也要留下结束记录，再向上冒泡
        let jobs = match self.board.find_applicable_jobs(&self.criteria).await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!("❌ 职位检索失败: {}", e);
                stats.end = SessionEnd::Aborted;
                self.write_summary(&stats)?;
                return Err(e.into());
            }
        };
        if jobs.is_empty() {
            warn!("⚠️ 检索结果为空，会话结束");
            self.write_summary(&stats)?;
            return Ok(stats);
        }

        for (index, job) in jobs.iter().enumerate() {
            if *self.stop.borrow() {
                stats.end = SessionEnd::Stopped;
                break;
            }

            // (1) 查重先于一切浏览器动作
            if self.ledger.has_been_attempted(&job.job_id)? {
                info!("[职位 {}] ⏭ 已有投递记录，跳过: {}", index + 1, job.display_name());
                stats.duplicates += 1;
                continue;
            }

            // (2) 频控问询
            match self.await_clearance().await {
                Clearance::Proceed => {}
                Clearance::CapReached => {
                    stats.end = SessionEnd::CapReached;
                    break;
                }
                Clearance::Stopped => {
                    stats.end = SessionEnd::Stopped;
                    break;
                }
            }

            // (3) 申请流程
            let ctx = JobCtx::new(
                job.job_id.clone(),
                index + 1,
                job.employer.clone(),
                job.title.clone(),
            );
            let outcome = self.flow.run(self.board.as_ref(), job, &ctx, &self.stop).await;

            // (4) 终局落账，再回报频控
            match outcome {
                JobOutcome::Success { tokens } => {
                    stats.processed += 1;
                    stats.succeeded += 1;
                    stats.tokens += tokens;
                    self.record(job, CandidacyStatus::Success, None, tokens)?;
                    self.ledger.increment_daily(Local::now().date_naive())?;
                    self.limiter.record_success();
                }
                JobOutcome::Failure { reason, tokens } => {
                    stats.processed += 1;
                    stats.failed += 1;
                    stats.tokens += tokens;
                    self.record(job, CandidacyStatus::Failure, Some(reason), tokens)?;
                    self.limiter.record_failure();
                    if self.limiter.should_abort_session() {
                        warn!("🚨 连续错误达到阈值，熔断本次会话");
                        stats.end = SessionEnd::Aborted;
                        break;
                    }
                }
                JobOutcome::Skipped { reason, tokens } => {
                    stats.processed += 1;
                    stats.skipped += 1;
                    stats.tokens += tokens;
                    self.record(job, CandidacyStatus::Skipped, Some(reason), tokens)?;
                    self.limiter.record_skip();
                }
                JobOutcome::Interrupted => {
                    // 不落账，该职位留给下次运行
                    stats.end = SessionEnd::Stopped;
                    break;
                }
            }
        }

        self.log_final(&stats);
        self.write_summary(&stats)?;
        Ok(stats)
    }

    /// 循环问询频控直到放行、到顶或被停止
    async fn await_clearance(&mut self) -> Clearance {
        loop {
            match self.limiter.can_act(Local::now()) {
                Decision::Allow => return Clearance::Proceed,
                Decision::HardStop => {
                    info!("🏁 日上限已满，今天到此为止");
                    return Clearance::CapReached;
                }
                Decision::Wait(duration) => {
                    info!("⏳ 频控等待 {:.0} 秒", duration.as_secs_f64());
                    if self.sleeper.sleep(duration, &mut self.stop).await {
                        return Clearance::Stopped;
                    }
                }
            }
        }
    }

    fn record(
        &self,
        job: &crate::models::JobListing,
        status: CandidacyStatus,
        detail: Option<String>,
        tokens: u32,
    ) -> anyhow::Result<()> {
        let record = CandidacyRecord::new(
            job.job_id.clone(),
            job.employer.clone(),
            job.title.clone(),
            job.location.clone(),
            status,
            detail,
            Some(tokens),
        );
        match self.ledger.record(&record) {
            Ok(()) => Ok(()),
            // 检索结果里偶见同一职位出现两次，第二次落账撞唯一约束即忽略
            Err(StorageError::DuplicateJob { job_id }) => {
                warn!("⚠️ 职位 {} 重复落账，保留原记录", job_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn log_final(&self, stats: &SessionStats) {
        let status = self.limiter.status();
        info!("\n========== 会话结束 ==========");
        info!("结束原因: {}", stats.end.as_str());
        info!("成功: {} | 失败: {} | 跳过: {}", stats.succeeded, stats.failed, stats.skipped);
        info!("查重拦截: {}", stats.duplicates);
        info!("今日累计: {}/{}", status.applications_today, status.daily_cap);
        info!("LLM 消耗: {} tokens", stats.tokens);
        info!("==============================");
    }

    /// 把会话摘要写进配置表，供下次启动时展示
    fn write_summary(&self, stats: &SessionStats) -> anyhow::Result<()> {
        let summary = serde_json::json!({
            "ended_at": Local::now().to_rfc3339(),
            "end": stats.end.as_str(),
            "succeeded": stats.succeeded,
            "failed": stats.failed,
            "skipped": stats.skipped,
            "duplicates": stats.duplicates,
            "tokens": stats.tokens,
        });
        self.ledger
            .set_config("last_session_summary", &summary.to_string())?;
        Ok(())
    }
}

enum Clearance {
    Proceed,
    CapReached,
    Stopped,
}
