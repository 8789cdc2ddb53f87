//! 频控引擎 - 决策核心
//!
//! 判定顺序（与决策优先级一致）：
//! 1. 日上限已满 → HardStop（当天剩余时间一律拒绝）
//! 2. 疲劳阈值已到（自上次暂停起处理满 N 份）→ Wait(15~30 分钟，一次抽定)
//! 3. 上一动作遗留的间隔延迟 → Wait(微延迟或投递间延迟)
//! 4. 其余情况 → Allow
//!
//! 连续错误计数是会话内存状态，跨运行不保留；日计数由台账持久化，
//! 重启后由编排层回灌，保证半途崩溃也不会超限。

use crate::config::Config;
use crate::policy::sampler::DelaySampler;
use chrono::{DateTime, Local, NaiveDate};
use std::time::Duration;

/// 日上限全局顶格带宽，操作者配置只能在带内取值
const CAP_CEILING_BAND: (u32, u32) = (40, 50);

/// 养号爬坡：账号第 1/2/3 天的上限
const WARMUP_SCHEDULE: [u32; 3] = [10, 20, 30];

/// 频控决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// 可以行动
    Allow,
    /// 等待指定时长后重新询问
    Wait(Duration),
    /// 当天到顶，本次运行终止
    HardStop,
}

/// 会话生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Paused,
    /// 日上限触发，对本次运行是终态
    HardStopped,
    /// 连续错误熔断，对本次运行是终态
    Aborted,
}

/// 频控参数（从 Config 提取，便于测试单独构造）
#[derive(Debug, Clone)]
pub struct RateLimiterOptions {
    pub warmup_enabled: bool,
    pub daily_cap_ceiling: u32,
    pub micro_delay: (Duration, Duration),
    pub application_delay: (Duration, Duration),
    pub pause_after_applications: u32,
    pub pause_minutes: (u64, u64),
    pub max_consecutive_errors: u32,
}

impl From<&Config> for RateLimiterOptions {
    fn from(config: &Config) -> Self {
        Self {
            warmup_enabled: config.warmup_enabled,
            daily_cap_ceiling: config.daily_cap_ceiling,
            micro_delay: (
                Duration::from_secs_f64(config.micro_delay_secs.0),
                Duration::from_secs_f64(config.micro_delay_secs.1),
            ),
            application_delay: (
                Duration::from_secs_f64(config.application_delay_secs.0),
                Duration::from_secs_f64(config.application_delay_secs.1),
            ),
            pause_after_applications: config.pause_after_applications,
            pause_minutes: config.pause_minutes,
            max_consecutive_errors: config.max_consecutive_errors,
        }
    }
}

impl Default for RateLimiterOptions {
    fn default() -> Self {
        RateLimiterOptions::from(&Config::default())
    }
}

/// 对外展示的频控状态快照
#[derive(Debug, Clone, Copy)]
pub struct RateStatus {
    pub applications_today: u32,
    pub daily_cap: u32,
    pub remaining: u32,
    pub consecutive_errors: u32,
    pub state: SessionState,
}

/// 频控引擎
pub struct RateLimiter {
    opts: RateLimiterOptions,
    sampler: Box<dyn DelaySampler>,

    account_age_days: u32,
    current_day: NaiveDate,
    applications_today: u32,
    consecutive_errors: u32,
    /// 自上次疲劳暂停起处理的投递数（成功+失败计入，跳过不计）
    processed_since_pause: u32,
    /// 疲劳暂停的截止时刻；时长在进入暂停时一次抽定
    pause_until: Option<DateTime<Local>>,
    /// 上一动作遗留的间隔延迟，待下次询问时消费
    pending_delay: Option<Duration>,
    state: SessionState,
}

impl RateLimiter {
    /// 创建频控引擎
    ///
    /// # 参数
    /// - `account_age_days`: 账号启用至今的天数（今天是第几天，从 1 起）
    /// - `today`: 当前日历日
    /// - `applications_today`: 今天已完成的投递数（重启时由台账回灌）
    pub fn new(
        opts: RateLimiterOptions,
        sampler: Box<dyn DelaySampler>,
        account_age_days: u32,
        today: NaiveDate,
        applications_today: u32,
    ) -> Self {
        Self {
            opts,
            sampler,
            account_age_days: account_age_days.max(1),
            current_day: today,
            applications_today,
            consecutive_errors: 0,
            processed_since_pause: applications_today,
            pause_until: None,
            pending_delay: None,
            state: SessionState::Idle,
        }
    }

    /// 当前账号等级对应的日上限
    pub fn daily_cap(&self) -> u32 {
        let ceiling = self
            .opts
            .daily_cap_ceiling
            .clamp(CAP_CEILING_BAND.0, CAP_CEILING_BAND.1);
        if !self.opts.warmup_enabled {
            return ceiling;
        }
        match self.account_age_days {
            1 => WARMUP_SCHEDULE[0],
            2 => WARMUP_SCHEDULE[1],
            3 => WARMUP_SCHEDULE[2],
            _ => ceiling,
        }
    }

    /// 询问现在是否可以行动
    pub fn can_act(&mut self, now: DateTime<Local>) -> Decision {
        if matches!(
            self.state,
            SessionState::HardStopped | SessionState::Aborted
        ) && now.date_naive() == self.current_day
        {
            return Decision::HardStop;
        }
        if self.state == SessionState::Idle {
            self.state = SessionState::Active;
        }

        self.roll_day_if_needed(now.date_naive());

        // (1) 日上限
        if self.applications_today >= self.daily_cap() {
            self.state = SessionState::HardStopped;
            return Decision::HardStop;
        }

        // (2) 疲劳暂停：进行中的暂停返回剩余时长，到点后解除并清零计数
        if let Some(until) = self.pause_until {
            if now < until {
                self.state = SessionState::Paused;
                return Decision::Wait((until - now).to_std().unwrap_or_default());
            }
            self.pause_until = None;
            self.processed_since_pause = 0;
            self.state = SessionState::Active;
        }
        if self.opts.pause_after_applications > 0
            && self.processed_since_pause >= self.opts.pause_after_applications
        {
            let (lo, hi) = self.opts.pause_minutes;
            let pause = self.sampler.sample(
                Duration::from_secs(lo * 60),
                Duration::from_secs(hi * 60),
            );
            self.pause_until =
                Some(now + chrono::Duration::from_std(pause).unwrap_or(chrono::Duration::zero()));
            // 长暂停吞并遗留的短延迟
            self.pending_delay = None;
            self.state = SessionState::Paused;
            return Decision::Wait(pause);
        }

        // (3) 上一动作遗留的间隔延迟
        if let Some(delay) = self.pending_delay.take() {
            return Decision::Wait(delay);
        }

        Decision::Allow
    }

    /// 记录一次成功投递
    pub fn record_success(&mut self) {
        self.applications_today += 1;
        self.processed_since_pause += 1;
        self.consecutive_errors = 0;
        let (lo, hi) = self.opts.application_delay;
        self.pending_delay = Some(self.sampler.sample(lo, hi));
    }

    /// 记录一次失败投递
    pub fn record_failure(&mut self) {
        self.processed_since_pause += 1;
        self.consecutive_errors += 1;
        let (lo, hi) = self.opts.application_delay;
        self.pending_delay = Some(self.sampler.sample(lo, hi));
        if self.should_abort_session() {
            self.state = SessionState::Aborted;
        }
    }

    /// 记录一次跳过（不计上限、不计疲劳，只重置连错）
    pub fn record_skip(&mut self) {
        self.consecutive_errors = 0;
        let (lo, hi) = self.opts.micro_delay;
        self.pending_delay = Some(self.sampler.sample(lo, hi));
    }

    /// 连续错误是否已达熔断阈值（会话级终止条件，不做重试）
    pub fn should_abort_session(&self) -> bool {
        self.consecutive_errors >= self.opts.max_consecutive_errors
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> RateStatus {
        let cap = self.daily_cap();
        RateStatus {
            applications_today: self.applications_today,
            daily_cap: cap,
            remaining: cap.saturating_sub(self.applications_today),
            consecutive_errors: self.consecutive_errors,
            state: self.state,
        }
    }

    /// 跨越日界时重置当日计数并推进账号天龄
    fn roll_day_if_needed(&mut self, today: NaiveDate) {
        if today == self.current_day {
            return;
        }
        let elapsed = (today - self.current_day).num_days().max(0) as u32;
        self.account_age_days += elapsed;
        self.current_day = today;
        self.applications_today = 0;
        self.processed_since_pause = 0;
        self.pause_until = None;
        self.pending_delay = None;
        if self.state == SessionState::HardStopped {
            self.state = SessionState::Active;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::sampler::FixedSampler;
    use chrono::TimeZone;

    fn at(hour: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 29, hour, min, 0).unwrap()
    }

    fn limiter(age: u32, done_today: u32) -> RateLimiter {
        RateLimiter::new(
            RateLimiterOptions::default(),
            Box::new(FixedSampler(Duration::from_secs(2))),
            age,
            at(9, 0).date_naive(),
            done_today,
        )
    }

    #[test]
    fn test_warmup_tiers() {
        assert_eq!(limiter(1, 0).daily_cap(), 10);
        assert_eq!(limiter(2, 0).daily_cap(), 20);
        assert_eq!(limiter(3, 0).daily_cap(), 30);
        assert_eq!(limiter(4, 0).daily_cap(), 40);
        assert_eq!(limiter(365, 0).daily_cap(), 40);
    }

    #[test]
    fn test_cap_ceiling_clamped_into_band() {
        let mut opts = RateLimiterOptions::default();
        opts.daily_cap_ceiling = 100;
        let lim = RateLimiter::new(
            opts.clone(),
            Box::new(FixedSampler(Duration::ZERO)),
            10,
            at(9, 0).date_naive(),
            0,
        );
        assert_eq!(lim.daily_cap(), 50);

        opts.daily_cap_ceiling = 5;
        let lim = RateLimiter::new(
            opts,
            Box::new(FixedSampler(Duration::ZERO)),
            10,
            at(9, 0).date_naive(),
            0,
        );
        assert_eq!(lim.daily_cap(), 40);
    }

    #[test]
    fn test_warmup_disabled_uses_ceiling_at_any_age() {
        let mut opts = RateLimiterOptions::default();
        opts.warmup_enabled = false;
        opts.daily_cap_ceiling = 45;
        let lim = RateLimiter::new(
            opts,
            Box::new(FixedSampler(Duration::ZERO)),
            1,
            at(9, 0).date_naive(),
            0,
        );
        assert_eq!(lim.daily_cap(), 45);
    }

    #[test]
    fn test_hard_stop_after_tenth_success_on_day_one() {
        // 九份在先，第十份成功后当天必须到顶
        let mut lim = limiter(1, 9);
        assert_eq!(lim.can_act(at(9, 0)), Decision::Allow);
        lim.record_success();
        assert_eq!(lim.can_act(at(9, 10)), Decision::HardStop);
        assert_eq!(lim.can_act(at(23, 59)), Decision::HardStop);
        assert_eq!(lim.state(), SessionState::HardStopped);
    }

    #[test]
    fn test_abort_iff_three_consecutive_failures() {
        let mut lim = limiter(4, 0);
        lim.record_failure();
        lim.record_failure();
        assert!(!lim.should_abort_session());
        lim.record_success();
        lim.record_failure();
        lim.record_failure();
        assert!(!lim.should_abort_session());
        lim.record_failure();
        assert!(lim.should_abort_session());
        assert_eq!(lim.state(), SessionState::Aborted);
        assert_eq!(lim.can_act(at(10, 0)), Decision::HardStop);
    }

    #[test]
    fn test_skip_resets_consecutive_errors() {
        let mut lim = limiter(4, 0);
        lim.record_failure();
        lim.record_failure();
        lim.record_skip();
        lim.record_failure();
        assert!(!lim.should_abort_session());
    }

    #[test]
    fn test_delay_wait_then_allow() {
        let mut lim = limiter(4, 0);
        assert_eq!(lim.can_act(at(9, 0)), Decision::Allow);
        lim.record_success();
        // 完整投递之后是投递间延迟（固定采样器收敛到区间下限 120s）
        match lim.can_act(at(9, 1)) {
            Decision::Wait(d) => assert_eq!(d, Duration::from_secs(120)),
            other => panic!("应为 Wait，实际 {:?}", other),
        }
        // 延迟消费后放行
        assert_eq!(lim.can_act(at(9, 4)), Decision::Allow);
    }

    #[test]
    fn test_skip_yields_micro_delay() {
        let mut lim = limiter(4, 0);
        lim.record_skip();
        match lim.can_act(at(9, 0)) {
            Decision::Wait(d) => {
                assert!(d >= Duration::from_secs_f64(1.5) && d <= Duration::from_secs(4))
            }
            other => panic!("应为 Wait，实际 {:?}", other),
        }
    }

    #[test]
    fn test_fatigue_pause_triggers_and_is_fixed_until_expiry() {
        let mut lim = RateLimiter::new(
            RateLimiterOptions::default(),
            Box::new(FixedSampler(Duration::from_secs(20 * 60))),
            4,
            at(9, 0).date_naive(),
            0,
        );
        for i in 0..10 {
            lim.record_success();
            if i < 9 {
                let _ = lim.can_act(at(9, 0)); // 消费投递间延迟
            }
        }
        // 第 10 份处理完，疲劳阈值触发
        let first = lim.can_act(at(10, 0));
        match first {
            Decision::Wait(d) => assert_eq!(d, Duration::from_secs(20 * 60)),
            other => panic!("应为疲劳暂停，实际 {:?}", other),
        }
        assert_eq!(lim.state(), SessionState::Paused);
        // 暂停期内重复询问，剩余时长递减而非重新抽取
        match lim.can_act(at(10, 10)) {
            Decision::Wait(d) => assert_eq!(d, Duration::from_secs(10 * 60)),
            other => panic!("应为剩余等待，实际 {:?}", other),
        }
        // 暂停到点后恢复放行
        assert_eq!(lim.can_act(at(10, 30)), Decision::Allow);
        assert_eq!(lim.state(), SessionState::Active);
    }

    #[test]
    fn test_day_rollover_resets_counts_and_advances_age() {
        let mut lim = limiter(3, 30);
        assert_eq!(lim.can_act(at(23, 0)), Decision::HardStop);
        let next_day = Local.with_ymd_and_hms(2026, 8, 30, 8, 0, 0).unwrap();
        // 新的一天：天龄 4，上限 40，计数清零
        assert_eq!(lim.can_act(next_day), Decision::Allow);
        assert_eq!(lim.daily_cap(), 40);
        assert_eq!(lim.status().applications_today, 0);
    }

    #[test]
    fn test_restart_seed_counts_toward_cap() {
        // 重启回灌：今天已有 8 份，day1 上限 10，只剩 2 份
        let mut lim = limiter(1, 8);
        assert_eq!(lim.status().remaining, 2);
        assert_eq!(lim.can_act(at(9, 0)), Decision::Allow);
        lim.record_success();
        let _ = lim.can_act(at(9, 5));
        assert_eq!(lim.can_act(at(9, 6)), Decision::Allow);
        lim.record_success();
        assert_eq!(lim.can_act(at(9, 30)), Decision::HardStop);
    }
}
