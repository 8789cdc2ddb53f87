use anyhow::Result;
use tokio::sync::watch;
use tracing::{info, warn};

use auto_job_apply::orchestrator::App;
use auto_job_apply::utils;
use auto_job_apply::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    utils::init_tracing(config.verbose_logging);

    // 停止信号：Ctrl+C 只请求停止，收尾仍由会话自己完成
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 收到 Ctrl+C，将在当前步骤结束后停止");
            let _ = stop_tx.send(true);
        }
    });

    // 初始化并运行应用
    let app = App::initialize(config, stop_rx).await?;
    let stats = app.run().await?;

    utils::log_session_end(&stats);
    info!("👋 再见");
    Ok(())
}
