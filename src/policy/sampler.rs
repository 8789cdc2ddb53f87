use rand::Rng;
use std::time::Duration;

/// 延迟采样器
///
/// 频控的随机延迟全部经由本接口抽取，好处是测试时可以注入固定值，
/// 让策略引擎完全可复现
pub trait DelaySampler: Send {
    /// 在 `[lo, hi]` 区间内均匀抽取一个时长
    fn sample(&mut self, lo: Duration, hi: Duration) -> Duration;
}

/// 生产实现：线程本地随机数
#[derive(Debug, Default)]
pub struct ThreadRngSampler;

impl DelaySampler for ThreadRngSampler {
    fn sample(&mut self, lo: Duration, hi: Duration) -> Duration {
        if hi <= lo {
            return lo;
        }
        let secs = rand::thread_rng().gen_range(lo.as_secs_f64()..=hi.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// 测试实现：总是返回固定值（固定值超出区间时收敛到区间内）
#[derive(Debug, Clone, Copy)]
pub struct FixedSampler(pub Duration);

impl DelaySampler for FixedSampler {
    fn sample(&mut self, lo: Duration, hi: Duration) -> Duration {
        self.0.clamp(lo, hi)
    }
}
