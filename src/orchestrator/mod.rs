//! 编排层
//!
//! 把频控、台账、求解流程和招聘板串成一次完整会话：
//! - `sleeper`: 可注入的等待原语（生产走 tokio 定时器，测试零等待）
//! - `session`: 会话主循环，唯一允许调用 `can_act` 的地方
//! - `app`: 生产装配（浏览器、LLM、台账、档案）

pub mod app;
pub mod session;
pub mod sleeper;

pub use app::App;
pub use session::{Session, SessionEnd, SessionStats};
pub use sleeper::{NoopSleeper, Sleeper, TokioSleeper};
