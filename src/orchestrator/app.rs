//! 应用装配 - 生产环境的组件拼装
//!
//! 初始化次序：台账 → 档案 → 运行参数回灌 → 浏览器 → LLM。
//! 台账最先打开，日计数和账号天龄都要从它回灌，
//! 保证程序半途崩溃重启后频控额度依然准确。

use anyhow::{bail, Context, Result};
use chromiumoxide::Browser;
use chrono::{Local, NaiveDate};
use std::path::Path;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::browser::{connect_to_browser_and_page, CdpJobBoard};
use crate::config::Config;
use crate::error::ConfigError;
use crate::models::{loaders, SearchCriteria};
use crate::orchestrator::session::{Session, SessionStats};
use crate::orchestrator::sleeper::TokioSleeper;
use crate::policy::{RateLimiter, RateLimiterOptions, ThreadRngSampler};
use crate::services::{LlmService, PromptBuilder, QuestionResolver};
use crate::storage::CandidacyLedger;
use crate::workflow::ApplicationFlow;

/// 账号启用日在配置表中的键
const KEY_ACCOUNT_STARTED_ON: &str = "account_started_on";
/// 上限覆盖键：操作者可在库里直接调低，无需改环境变量
const KEY_DAILY_CAP_OVERRIDE: &str = "daily_cap_ceiling";
const KEY_WARMUP_OVERRIDE: &str = "warmup_enabled";

/// 应用主结构
pub struct App {
    session: Session<LlmService>,
    // Browser 连接随 App 存活，drop 时自动断开
    _browser: Browser,
}

impl App {
    /// 初始化应用
    pub async fn initialize(mut config: Config, stop: watch::Receiver<bool>) -> Result<Self> {
        log_startup(&config);

        // 台账与运行参数
        let ledger = CandidacyLedger::open(Path::new(&config.db_path))?;
        apply_stored_overrides(&ledger, &mut config)?;
        show_last_summary(&ledger);
        crate::utils::log_recent_attempts(&ledger.list_recent(5)?);

        let today = Local::now().date_naive();
        let account_age_days = bootstrap_account_age(&ledger, today)?;
        let applications_today = seed_daily_quota(&ledger, today)?;
        info!(
            "📊 账号第 {} 天，今日已投 {} 份",
            account_age_days, applications_today
        );

        // 操作者档案
        let profile = loaders::load_profile(Path::new(&config.profile_path)).await?;
        if !profile.is_complete() {
            bail!(ConfigError::ProfileIncomplete {
                detail: "姓名、邮箱和简历文本缺一不可".to_string(),
            });
        }

        // 浏览器
        let (browser, page) = connect_to_browser_and_page(
            config.browser_debug_port,
            Some(&config.search_url),
            Some("Jobs"),
        )
        .await?;
        ledger.set_config("headless", &config.headless.to_string())?;

        // LLM 与求解流程
        if config.llm_api_key.is_empty() {
            bail!("LLM_API_KEY 未配置");
        }
        let resolver = QuestionResolver::new(LlmService::new(&config), PromptBuilder::new(&profile));
        let flow = ApplicationFlow::new(resolver);

        let limiter = RateLimiter::new(
            RateLimiterOptions::from(&config),
            Box::new(ThreadRngSampler),
            account_age_days,
            today,
            applications_today,
        );

        let board = CdpJobBoard::new(page, config.search_url.clone());
        let criteria = SearchCriteria {
            keywords: config.search_keywords.clone(),
            location: config.search_location.clone(),
            remote_only: config.remote_only,
        };

        let session = Session::new(
            Box::new(board),
            flow,
            ledger,
            limiter,
            Box::new(TokioSleeper),
            criteria,
            stop,
        );

        Ok(Self {
            session,
            _browser: browser,
        })
    }

    /// 运行一次投递会话
    pub async fn run(self) -> Result<SessionStats> {
        self.session.run().await
    }
}

/// 账号启用日：首次运行写入今天，之后据此推算天龄（今天为第 1 天）
fn bootstrap_account_age(ledger: &CandidacyLedger, today: NaiveDate) -> Result<u32> {
    let started_on = match ledger.get_config(KEY_ACCOUNT_STARTED_ON)? {
        Some(raw) => raw
            .parse::<NaiveDate>()
            .with_context(|| format!("配置表里的 {} 不是合法日期: {}", KEY_ACCOUNT_STARTED_ON, raw))?,
        None => {
            ledger.set_config(KEY_ACCOUNT_STARTED_ON, &today.to_string())?;
            today
        }
    };
    let age = (today - started_on).num_days().max(0) as u32 + 1;
    Ok(age)
}

/// 今日额度回灌：日统计表与投递记录互核，不一致时取大者
///
/// 两条计数路径各有短板：成功落账与日统计自增不在一个事务里，
/// 崩溃窗口内可能只写了其中一边。取大者保证重启后只会更保守。
fn seed_daily_quota(ledger: &CandidacyLedger, today: NaiveDate) -> Result<u32> {
    let from_records = ledger.daily_count(today)?;
    let from_stats = ledger.stats_for_day(today)?;
    if from_records != from_stats {
        warn!(
            "⚠️ 今日计数不一致: 投递记录 {} 条 / 日统计 {} 条，按 {} 回灌",
            from_records,
            from_stats,
            from_records.max(from_stats)
        );
    }
    Ok(from_records.max(from_stats))
}

/// 配置表里的覆盖项优先于环境变量
fn apply_stored_overrides(ledger: &CandidacyLedger, config: &mut Config) -> Result<()> {
    if let Some(raw) = ledger.get_config(KEY_DAILY_CAP_OVERRIDE)? {
        match raw.parse::<u32>() {
            Ok(cap) => {
                info!("配置表覆盖日上限: {}", cap);
                config.daily_cap_ceiling = cap;
            }
            Err(_) => warn!("配置表里的 {} 不是整数，忽略: {}", KEY_DAILY_CAP_OVERRIDE, raw),
        }
    }
    if let Some(raw) = ledger.get_config(KEY_WARMUP_OVERRIDE)? {
        match raw.parse::<bool>() {
            Ok(enabled) => config.warmup_enabled = enabled,
            Err(_) => warn!("配置表里的 {} 不是布尔值，忽略: {}", KEY_WARMUP_OVERRIDE, raw),
        }
    }
    Ok(())
}

fn show_last_summary(ledger: &CandidacyLedger) {
    match ledger.get_config("last_session_summary") {
        Ok(Some(summary)) => info!("上次会话摘要: {}", summary),
        Ok(None) => {}
        Err(e) => warn!("读取上次会话摘要失败: {}", e),
    }
}

fn log_startup(config: &Config) {
    info!("\n🚀 ========== 自动投递启动 ==========");
    info!("搜索关键词: {}", config.search_keywords.join(", "));
    if !config.search_location.is_empty() {
        info!("搜索地点: {}", config.search_location);
    }
    info!("只看远程: {}", config.remote_only);
    info!("浏览器端口: {}", config.browser_debug_port);
    info!("模型: {}", config.llm_model_name);
    info!("=====================================");
}
