//! 持久化层 - 投递台账
//!
//! 只追加的 SQLite 台账：每份职位终态写一行，job_id 唯一约束
//! 由数据库兜底去重，日统计与键值配置同库存放。

pub mod ledger;

pub use ledger::CandidacyLedger;
