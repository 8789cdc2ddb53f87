/// 日志工具模块
///
/// 提供 tracing 初始化和收尾展示的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::CandidacyRecord;
use crate::orchestrator::SessionStats;

/// 初始化 tracing 订阅器
///
/// RUST_LOG 优先；未设置时 verbose 决定 debug / info。
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// 展示最近的投递记录
pub fn log_recent_attempts(records: &[CandidacyRecord]) {
    if records.is_empty() {
        return;
    }
    info!("📜 最近的投递记录:");
    for record in records {
        info!(
            "  [{}] {} @ {} ({})",
            record.status.as_str(),
            record.title,
            record.employer,
            record.applied_at.format("%Y-%m-%d %H:%M")
        );
    }
}

/// 会话收尾总结
pub fn log_session_end(stats: &SessionStats) {
    info!(
        "🏁 会话结束 [{}]: 成功 {} / 失败 {} / 跳过 {} / 查重 {}，共 {} tokens",
        stats.end.as_str(),
        stats.succeeded,
        stats.failed,
        stats.skipped,
        stats.duplicates,
        stats.tokens
    );
}
