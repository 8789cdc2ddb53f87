//! 可注入的等待原语
//!
//! 频控给出的 Wait 可能长达半小时，等待期间必须能被停止信号打断。

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;

/// 等待原语
///
/// 返回 true 表示等待被停止信号打断，调用方应立即收尾。
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration, stop: &mut watch::Receiver<bool>) -> bool;
}

/// 生产实现：tokio 定时器 + 停止信号竞速
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration, stop: &mut watch::Receiver<bool>) -> bool {
        if *stop.borrow() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            interrupted = wait_for_stop(stop) => interrupted,
        }
    }
}

async fn wait_for_stop(stop: &mut watch::Receiver<bool>) -> bool {
    loop {
        // 发送端全部关闭时不再有停止信号，退回定时器分支
        if stop.changed().await.is_err() {
            return std::future::pending().await;
        }
        if *stop.borrow() {
            return true;
        }
    }
}

/// 测试实现：不等待，直接返回
pub struct NoopSleeper;

#[async_trait]
impl Sleeper for NoopSleeper {
    async fn sleep(&self, _duration: Duration, stop: &mut watch::Receiver<bool>) -> bool {
        *stop.borrow()
    }
}
