//! 会话端到端测试
//!
//! 用脚本化的招聘板、补全提供方和内存台账驱动完整会话循环，
//! 不碰真实浏览器和真实 API。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;
use tokio::sync::watch;

use auto_job_apply::browser::{FormHandle, FormStep, JobBoard};
use auto_job_apply::error::{AppError, AppResult};
use auto_job_apply::models::{
    CandidacyStatus, JobListing, KnowledgeProfile, Question, ResolvedAnswer, SearchCriteria,
};
use auto_job_apply::orchestrator::{NoopSleeper, Session, SessionEnd};
use auto_job_apply::policy::{FixedSampler, RateLimiter, RateLimiterOptions};
use auto_job_apply::services::{
    Completion, CompletionProvider, PromptBuilder, QuestionResolver,
};
use auto_job_apply::storage::CandidacyLedger;
use auto_job_apply::workflow::ApplicationFlow;

/// 每个职位的脚本化表现
#[derive(Clone, Copy, PartialEq)]
enum JobScript {
    /// 一个是/否问题，顺利提交
    Smooth,
    /// 打开表单时元素缺失
    BrokenOpen,
    /// 职位页正常但没有快速申请入口
    NoEasyApply,
}

struct ScriptedBoard {
    jobs: Vec<(JobListing, JobScript)>,
    open_calls: Arc<AtomicUsize>,
}

impl ScriptedBoard {
    fn new(jobs: Vec<(JobListing, JobScript)>) -> Self {
        Self {
            jobs,
            open_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl JobBoard for ScriptedBoard {
    async fn find_applicable_jobs(
        &self,
        _criteria: &SearchCriteria,
    ) -> AppResult<Vec<JobListing>> {
        Ok(self.jobs.iter().map(|(job, _)| job.clone()).collect())
    }

    async fn open(&self, job: &JobListing) -> AppResult<Option<Box<dyn FormHandle>>> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .jobs
            .iter()
            .find(|(j, _)| j.job_id == job.job_id)
            .map(|(_, s)| *s)
            .unwrap_or(JobScript::Smooth);
        match script {
            JobScript::Smooth => Ok(Some(Box::new(ScriptedForm))),
            JobScript::BrokenOpen => {
                Err(AppError::element_not_found(".jobs-easy-apply-content"))
            }
            JobScript::NoEasyApply => Ok(None),
        }
    }
}

struct ScriptedForm;

#[async_trait]
impl FormHandle for ScriptedForm {
    async fn extract_questions(&self) -> AppResult<Vec<Question>> {
        Ok(vec![Question::single_choice(
            "需要签证担保吗？",
            vec!["Yes".to_string(), "No".to_string()],
        )])
    }

    async fn fill(&self, answers: &[(Question, ResolvedAnswer)]) -> AppResult<()> {
        assert_eq!(answers.len(), 1);
        Ok(())
    }

    async fn advance(&self) -> AppResult<FormStep> {
        Ok(FormStep::Submitted)
    }

    async fn abandon(&self) -> AppResult<()> {
        Ok(())
    }
}

/// 永远回同一段合法 JSON 的补全提供方
struct ConstantProvider;

#[async_trait]
impl CompletionProvider for ConstantProvider {
    async fn complete(&self, _system: &str, _user: &str) -> Result<Completion> {
        Ok(Completion {
            content: r#"{"answer": "No", "confidence": "high"}"#.to_string(),
            tokens: 50,
        })
    }
}

fn listing(id: &str) -> JobListing {
    JobListing {
        job_id: id.to_string(),
        employer: "测试公司".to_string(),
        title: "后端工程师".to_string(),
        location: Some("远程".to_string()),
        url: format!("https://example.com/jobs/{id}"),
    }
}

fn profile() -> KnowledgeProfile {
    KnowledgeProfile {
        name: "王芳".to_string(),
        email: "wangfang@example.com".to_string(),
        phone: "13700000000".to_string(),
        resume_text: "六年后端经验".to_string(),
        bio: String::new(),
        attachments: vec![],
    }
}

fn build_session(
    board: ScriptedBoard,
    ledger: CandidacyLedger,
    account_age_days: u32,
    applications_today: u32,
) -> (Session<ConstantProvider>, watch::Sender<bool>) {
    let resolver = QuestionResolver::new(ConstantProvider, PromptBuilder::new(&profile()));
    let limiter = RateLimiter::new(
        RateLimiterOptions::default(),
        Box::new(FixedSampler(Duration::ZERO)),
        account_age_days,
        Local::now().date_naive(),
        applications_today,
    );
    let (stop_tx, stop_rx) = watch::channel(false);
    let session = Session::new(
        Box::new(board),
        ApplicationFlow::new(resolver),
        ledger,
        limiter,
        Box::new(NoopSleeper),
        SearchCriteria {
            keywords: vec!["Rust".to_string()],
            location: String::new(),
            remote_only: true,
        },
        stop_rx,
    );
    (session, stop_tx)
}

#[tokio::test]
async fn test_day_one_cap_stops_after_tenth_success() {
    // 第 1 天上限 10：给 12 个顺利职位，第 11 个之前到顶
    let jobs: Vec<_> = (0..12)
        .map(|i| (listing(&format!("job-{i}")), JobScript::Smooth))
        .collect();
    let board = ScriptedBoard::new(jobs);
    let open_calls = board.open_calls.clone();
    let ledger = CandidacyLedger::open_in_memory().unwrap();

    let (session, _stop) = build_session(board, ledger.clone(), 1, 0);
    let stats = session.run().await.unwrap();

    assert_eq!(stats.end, SessionEnd::CapReached);
    assert_eq!(stats.succeeded, 10);
    assert_eq!(open_calls.load(Ordering::SeqCst), 10);
    assert_eq!(ledger.daily_count(Local::now().date_naive()).unwrap(), 10);
}

#[tokio::test]
async fn test_three_consecutive_failures_abort_session() {
    // 三个打开即坏的职位触发熔断；第 4 个顺利职位不再被碰
    let jobs = vec![
        (listing("bad-1"), JobScript::BrokenOpen),
        (listing("bad-2"), JobScript::BrokenOpen),
        (listing("bad-3"), JobScript::BrokenOpen),
        (listing("good-1"), JobScript::Smooth),
    ];
    let board = ScriptedBoard::new(jobs);
    let open_calls = board.open_calls.clone();
    let ledger = CandidacyLedger::open_in_memory().unwrap();

    let (session, _stop) = build_session(board, ledger.clone(), 4, 0);
    let stats = session.run().await.unwrap();

    assert_eq!(stats.end, SessionEnd::Aborted);
    assert_eq!(stats.failed, 3);
    assert_eq!(open_calls.load(Ordering::SeqCst), 3);

    // 台账恰好 3 行 FAILURE，没有第 4 行
    let records = ledger.list_recent(10).unwrap();
    assert_eq!(records.len(), 3);
    assert!(records
        .iter()
        .all(|r| r.status == CandidacyStatus::Failure));
}

#[tokio::test]
async fn test_attempted_job_is_skipped_without_browser_work() {
    let ledger = CandidacyLedger::open_in_memory().unwrap();
    // 预先落账：job-0 已投过
    ledger
        .record(&auto_job_apply::models::CandidacyRecord::new(
            "job-0",
            "测试公司",
            "后端工程师",
            None,
            CandidacyStatus::Success,
            None,
            None,
        ))
        .unwrap();

    let jobs = vec![
        (listing("job-0"), JobScript::Smooth),
        (listing("job-1"), JobScript::Smooth),
    ];
    let board = ScriptedBoard::new(jobs);
    let open_calls = board.open_calls.clone();

    let (session, _stop) = build_session(board, ledger.clone(), 4, 0);
    let stats = session.run().await.unwrap();

    assert_eq!(stats.end, SessionEnd::Exhausted);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.succeeded, 1);
    // 查重职位没有触发任何 open 调用
    assert_eq!(open_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stop_signal_ends_session_cleanly() {
    let jobs: Vec<_> = (0..5)
        .map(|i| (listing(&format!("job-{i}")), JobScript::Smooth))
        .collect();
    let board = ScriptedBoard::new(jobs);
    let ledger = CandidacyLedger::open_in_memory().unwrap();

    let (session, stop_tx) = build_session(board, ledger.clone(), 4, 0);
    stop_tx.send(true).unwrap();
    let stats = session.run().await.unwrap();

    assert_eq!(stats.end, SessionEnd::Stopped);
    assert_eq!(stats.processed, 0);
    // 会话摘要照写
    assert!(ledger
        .get_config("last_session_summary")
        .unwrap()
        .unwrap()
        .contains("STOPPED"));
}

#[tokio::test]
async fn test_restart_resumes_daily_quota_from_ledger() {
    // 台账里已有 9 份今天的成功记录，day1 上限 10 ⇒ 只允许再投 1 份
    let ledger = CandidacyLedger::open_in_memory().unwrap();
    for i in 0..9 {
        ledger
            .record(&auto_job_apply::models::CandidacyRecord::new(
                format!("old-{i}"),
                "测试公司",
                "后端工程师",
                None,
                CandidacyStatus::Success,
                None,
                None,
            ))
            .unwrap();
    }
    let seeded = ledger.daily_count(Local::now().date_naive()).unwrap();
    assert_eq!(seeded, 9);

    let jobs: Vec<_> = (0..3)
        .map(|i| (listing(&format!("new-{i}")), JobScript::Smooth))
        .collect();
    let board = ScriptedBoard::new(jobs);

    let (session, _stop) = build_session(board, ledger.clone(), 1, seeded);
    let stats = session.run().await.unwrap();

    assert_eq!(stats.end, SessionEnd::CapReached);
    assert_eq!(stats.succeeded, 1);
}

#[tokio::test]
async fn test_no_easy_apply_entry_is_recorded_as_skip() {
    // 两个失败夹一个无入口职位：跳过重置连错计数，熔断不触发
    let jobs = vec![
        (listing("bad-1"), JobScript::BrokenOpen),
        (listing("bad-2"), JobScript::BrokenOpen),
        (listing("plain-1"), JobScript::NoEasyApply),
        (listing("bad-3"), JobScript::BrokenOpen),
    ];
    let board = ScriptedBoard::new(jobs);
    let ledger = CandidacyLedger::open_in_memory().unwrap();

    let (session, _stop) = build_session(board, ledger.clone(), 4, 0);
    let stats = session.run().await.unwrap();

    assert_eq!(stats.end, SessionEnd::Exhausted);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.failed, 3);

    // 无入口职位留下 SKIPPED 行，带原因
    let records = ledger.list_recent(10).unwrap();
    let skip = records
        .iter()
        .find(|r| r.job_id == "plain-1")
        .expect("应有跳过记录");
    assert_eq!(skip.status, CandidacyStatus::Skipped);
    assert!(skip.detail.as_deref().unwrap_or("").contains("快速申请"));
    // 跳过不计入日上限
    assert_eq!(ledger.daily_count(Local::now().date_naive()).unwrap(), 0);
}

/// 成功穿插时熔断不触发（计数被重置）
#[tokio::test]
async fn test_interleaved_failures_do_not_abort() {
    let jobs = vec![
        (listing("bad-1"), JobScript::BrokenOpen),
        (listing("bad-2"), JobScript::BrokenOpen),
        (listing("good-1"), JobScript::Smooth),
        (listing("bad-3"), JobScript::BrokenOpen),
        (listing("bad-4"), JobScript::BrokenOpen),
    ];
    let board = ScriptedBoard::new(jobs);
    let ledger = CandidacyLedger::open_in_memory().unwrap();

    let (session, _stop) = build_session(board, ledger, 4, 0);
    let stats = session.run().await.unwrap();

    assert_eq!(stats.end, SessionEnd::Exhausted);
    assert_eq!(stats.failed, 4);
    assert_eq!(stats.succeeded, 1);
}

/// 被打断的职位不落账，留给下次运行
#[derive(Clone)]
struct StopDuringResolve {
    stop_tx: Arc<Mutex<Option<watch::Sender<bool>>>>,
}

#[async_trait]
impl CompletionProvider for StopDuringResolve {
    async fn complete(&self, _system: &str, _user: &str) -> Result<Completion> {
        // 在求解过程中拉下停止信号：下一题边界才生效
        if let Some(tx) = self.stop_tx.lock().unwrap().take() {
            let _ = tx.send(true);
        }
        Ok(Completion {
            content: r#"{"answer": "No", "confidence": "high"}"#.to_string(),
            tokens: 10,
        })
    }
}

struct TwoQuestionForm;

#[async_trait]
impl FormHandle for TwoQuestionForm {
    async fn extract_questions(&self) -> AppResult<Vec<Question>> {
        Ok(vec![
            Question::single_choice("需要签证担保吗？", vec!["Yes".into(), "No".into()]),
            Question::single_choice("愿意出差吗？", vec!["Yes".into(), "No".into()]),
        ])
    }

    async fn fill(&self, _answers: &[(Question, ResolvedAnswer)]) -> AppResult<()> {
        panic!("被打断的表单不应填写");
    }

    async fn advance(&self) -> AppResult<FormStep> {
        panic!("被打断的表单不应推进");
    }

    async fn abandon(&self) -> AppResult<()> {
        Ok(())
    }
}

struct TwoQuestionBoard;

#[async_trait]
impl JobBoard for TwoQuestionBoard {
    async fn find_applicable_jobs(
        &self,
        _criteria: &SearchCriteria,
    ) -> AppResult<Vec<JobListing>> {
        Ok(vec![listing("job-0")])
    }

    async fn open(&self, _job: &JobListing) -> AppResult<Option<Box<dyn FormHandle>>> {
        Ok(Some(Box::new(TwoQuestionForm)))
    }
}

#[tokio::test]
async fn test_interrupt_between_questions_leaves_no_record() {
    let (stop_tx, stop_rx) = watch::channel(false);
    let provider = StopDuringResolve {
        stop_tx: Arc::new(Mutex::new(Some(stop_tx))),
    };
    let resolver = QuestionResolver::new(provider, PromptBuilder::new(&profile()));
    let ledger = CandidacyLedger::open_in_memory().unwrap();
    let limiter = RateLimiter::new(
        RateLimiterOptions::default(),
        Box::new(FixedSampler(Duration::ZERO)),
        4,
        Local::now().date_naive(),
        0,
    );
    let session = Session::new(
        Box::new(TwoQuestionBoard),
        ApplicationFlow::new(resolver),
        ledger.clone(),
        limiter,
        Box::new(NoopSleeper),
        SearchCriteria {
            keywords: vec!["Rust".to_string()],
            location: String::new(),
            remote_only: false,
        },
        stop_rx,
    );

    let stats = session.run().await.unwrap();
    assert_eq!(stats.end, SessionEnd::Stopped);
    // 半途而废的职位没有留下任何记录
    assert!(ledger.list_recent(10).unwrap().is_empty());
    assert!(!ledger.has_been_attempted("job-0").unwrap());
}

/// 三页表单：前两页各一题，第三页是审阅页，没有问题
struct PagedForm {
    page: AtomicUsize,
    filled: Arc<AtomicUsize>,
}

#[async_trait]
impl FormHandle for PagedForm {
    async fn extract_questions(&self) -> AppResult<Vec<Question>> {
        match self.page.load(Ordering::SeqCst) {
            0 => Ok(vec![Question::single_choice(
                "需要签证担保吗？",
                vec!["Yes".into(), "No".into()],
            )]),
            1 => Ok(vec![Question::single_choice(
                "愿意出差吗？",
                vec!["Yes".into(), "No".into()],
            )]),
            _ => Ok(vec![]),
        }
    }

    async fn fill(&self, answers: &[(Question, ResolvedAnswer)]) -> AppResult<()> {
        self.filled.fetch_add(answers.len(), Ordering::SeqCst);
        Ok(())
    }

    async fn advance(&self) -> AppResult<FormStep> {
        let page = self.page.fetch_add(1, Ordering::SeqCst);
        if page >= 2 {
            Ok(FormStep::Submitted)
        } else {
            Ok(FormStep::NextPage)
        }
    }

    async fn abandon(&self) -> AppResult<()> {
        Ok(())
    }
}

struct PagedBoard {
    filled: Arc<AtomicUsize>,
}

#[async_trait]
impl JobBoard for PagedBoard {
    async fn find_applicable_jobs(
        &self,
        _criteria: &SearchCriteria,
    ) -> AppResult<Vec<JobListing>> {
        Ok(vec![listing("paged-0")])
    }

    async fn open(&self, _job: &JobListing) -> AppResult<Option<Box<dyn FormHandle>>> {
        Ok(Some(Box::new(PagedForm {
            page: AtomicUsize::new(0),
            filled: self.filled.clone(),
        })))
    }
}

/// 第二页的问题在翻页后才可见，也要被解答并成功提交
#[tokio::test]
async fn test_multi_page_form_answers_every_page() {
    let filled = Arc::new(AtomicUsize::new(0));
    let resolver = QuestionResolver::new(ConstantProvider, PromptBuilder::new(&profile()));
    let ledger = CandidacyLedger::open_in_memory().unwrap();
    let limiter = RateLimiter::new(
        RateLimiterOptions::default(),
        Box::new(FixedSampler(Duration::ZERO)),
        4,
        Local::now().date_naive(),
        0,
    );
    let (_stop_tx, stop_rx) = watch::channel(false);
    let session = Session::new(
        Box::new(PagedBoard {
            filled: filled.clone(),
        }),
        ApplicationFlow::new(resolver),
        ledger.clone(),
        limiter,
        Box::new(NoopSleeper),
        SearchCriteria {
            keywords: vec!["Rust".to_string()],
            location: String::new(),
            remote_only: false,
        },
        stop_rx,
    );

    let stats = session.run().await.unwrap();
    assert_eq!(stats.end, SessionEnd::Exhausted);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 0);
    // 两页各填了一题
    assert_eq!(filled.load(Ordering::SeqCst), 2);
    // 两题各消耗 50 tokens
    assert_eq!(stats.tokens, 100);

    let records = ledger.list_recent(10).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, CandidacyStatus::Success);
}

/// 检索阶段就失败的会话也要写下结束摘要
struct BrokenSearchBoard;

#[async_trait]
impl JobBoard for BrokenSearchBoard {
    async fn find_applicable_jobs(
        &self,
        _criteria: &SearchCriteria,
    ) -> AppResult<Vec<JobListing>> {
        Err(AppError::element_not_found("[data-job-id]"))
    }

    async fn open(&self, _job: &JobListing) -> AppResult<Option<Box<dyn FormHandle>>> {
        panic!("检索失败后不应打开任何职位");
    }
}

#[tokio::test]
async fn test_failed_search_still_writes_summary() {
    let resolver = QuestionResolver::new(ConstantProvider, PromptBuilder::new(&profile()));
    let ledger = CandidacyLedger::open_in_memory().unwrap();
    let limiter = RateLimiter::new(
        RateLimiterOptions::default(),
        Box::new(FixedSampler(Duration::ZERO)),
        4,
        Local::now().date_naive(),
        0,
    );
    let (_stop_tx, stop_rx) = watch::channel(false);
    let session = Session::new(
        Box::new(BrokenSearchBoard),
        ApplicationFlow::new(resolver),
        ledger.clone(),
        limiter,
        Box::new(NoopSleeper),
        SearchCriteria {
            keywords: vec!["Rust".to_string()],
            location: String::new(),
            remote_only: false,
        },
        stop_rx,
    );

    assert!(session.run().await.is_err());
    // 错误向上冒泡之前已写下结束原因
    assert!(ledger
        .get_config("last_session_summary")
        .unwrap()
        .unwrap()
        .contains("ABORTED"));
}
