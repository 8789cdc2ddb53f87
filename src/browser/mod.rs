//! 浏览器协作层
//!
//! 通过 CDP 调试端口附着到操作者已登录的浏览器会话，
//! 一切 DOM 操作走 JS 求值。`JobBoard` / `FormHandle` 两个
//! trait 是编排层与浏览器之间的接缝，测试时用脚本化实现替换。

pub mod cdp_board;
pub mod connection;
pub mod job_board;

pub use cdp_board::CdpJobBoard;
pub use connection::connect_to_browser_and_page;
pub use job_board::{FormHandle, FormStep, JobBoard};
