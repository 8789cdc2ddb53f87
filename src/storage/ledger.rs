//! 投递台账 - SQLite 实现
//!
//! 职责：
//! 1. 投递记录只追加写入，job_id 唯一约束由数据库兜底
//! 2. 日统计表支撑重启后的日计数回灌
//! 3. 键值配置表保存账号启动日、上限覆盖等运行参数

use crate::error::StorageError;
use crate::models::{CandidacyRecord, CandidacyStatus};
use chrono::{DateTime, Local, NaiveDate};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// 当前模式版本；更高版本的库文件拒绝打开
const SCHEMA_VERSION: i64 = 1;

/// 投递台账
///
/// 连接用 `Arc<Mutex<_>>` 包裹，允许跨任务克隆共享；
/// 单操作者场景下锁争用可以忽略。
#[derive(Clone)]
pub struct CandidacyLedger {
    conn: Arc<Mutex<Connection>>,
}

impl CandidacyLedger {
    /// 打开（或创建）磁盘台账并执行迁移
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::OpenFailed {
                    path: path.display().to_string(),
                    source: Box::new(e),
                })?;
            }
        }
        let conn = Connection::open(path).map_err(|e| StorageError::OpenFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let ledger = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        ledger.migrate()?;
        info!("✓ 台账已打开: {}", path.display());
        Ok(ledger)
    }

    /// 打开内存台账（测试用）
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::OpenFailed {
            path: ":memory:".to_string(),
            source: Box::new(e),
        })?;
        let ledger = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        ledger.migrate()?;
        Ok(ledger)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        let conn = self.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                 version INTEGER NOT NULL
             );",
        )?;
        let found: Option<i64> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        match found {
            Some(v) if v > SCHEMA_VERSION => {
                return Err(StorageError::SchemaTooNew {
                    found: v,
                    supported: SCHEMA_VERSION,
                });
            }
            Some(_) => {}
            None => {
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?1)",
                    params![SCHEMA_VERSION],
                )?;
            }
        }
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS candidacies (
                 id          INTEGER PRIMARY KEY AUTOINCREMENT,
                 job_id      TEXT NOT NULL UNIQUE,
                 employer    TEXT NOT NULL,
                 title       TEXT NOT NULL,
                 location    TEXT,
                 applied_at  TEXT NOT NULL,
                 applied_on  TEXT NOT NULL,
                 status      TEXT NOT NULL
                     CHECK (status IN ('SUCCESS', 'FAILURE', 'SKIPPED')),
                 detail      TEXT,
                 llm_tokens  INTEGER
             );
             CREATE INDEX IF NOT EXISTS idx_candidacies_applied_on
                 ON candidacies (applied_on);

             CREATE TABLE IF NOT EXISTS daily_stats (
                 day          TEXT PRIMARY KEY,
                 applications INTEGER NOT NULL DEFAULT 0
             );

             CREATE TABLE IF NOT EXISTS config (
                 key   TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             );",
        )?;
        debug!("台账迁移完成 (schema v{})", SCHEMA_VERSION);
        Ok(())
    }

    /// 追加一条投递记录
    ///
    /// job_id 冲突时返回 `DuplicateJob`，已有记录保持原样不覆盖。
    pub fn record(&self, record: &CandidacyRecord) -> Result<(), StorageError> {
        let conn = self.lock();
        let result = conn.execute(
            "INSERT INTO candidacies
                 (job_id, employer, title, location, applied_at, applied_on,
                  status, detail, llm_tokens)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.job_id,
                record.employer,
                record.title,
                record.location,
                record.applied_at.to_rfc3339(),
                record.applied_on().to_string(),
                record.status.as_str(),
                record.detail,
                record.llm_tokens,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::DuplicateJob {
                    job_id: record.job_id.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 该职位是否已有任何终态记录
    pub fn has_been_attempted(&self, job_id: &str) -> Result<bool, StorageError> {
        let conn = self.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM candidacies WHERE job_id = ?1 LIMIT 1",
                params![job_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// 最近 n 条记录，按时间倒序
    ///
    /// 读回时严格解析：时间戳或状态对不上写入格式即报
    /// `CorruptRecord`，审计数据不做静默修补。
    pub fn list_recent(&self, n: u32) -> Result<Vec<CandidacyRecord>, StorageError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT job_id, employer, title, location, applied_at,
                    status, detail, llm_tokens
             FROM candidacies
             ORDER BY id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![n], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<u32>>(7)?,
            ))
        })?;
        let mut records = Vec::new();
        for row in rows {
            let (job_id, employer, title, location, applied_at_raw, status_raw, detail, llm_tokens) =
                row?;
            let applied_at = DateTime::parse_from_rfc3339(&applied_at_raw)
                .map_err(|e| StorageError::CorruptRecord {
                    job_id: job_id.clone(),
                    detail: format!("applied_at '{}' 无法解析: {}", applied_at_raw, e),
                })?
                .with_timezone(&Local);
            let status =
                CandidacyStatus::from_str(&status_raw).ok_or_else(|| StorageError::CorruptRecord {
                    job_id: job_id.clone(),
                    detail: format!("未知状态: {}", status_raw),
                })?;
            records.push(CandidacyRecord {
                job_id,
                employer,
                title,
                location,
                applied_at,
                status,
                detail,
                llm_tokens,
            });
        }
        Ok(records)
    }

    /// 当日成功投递数（按 applied_on 统计 SUCCESS 行，重启回灌用）
    pub fn daily_count(&self, day: NaiveDate) -> Result<u32, StorageError> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM candidacies
             WHERE applied_on = ?1 AND status = 'SUCCESS'",
            params![day.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    /// 日统计表里记下的当日投递数（重启回灌时与 `daily_count` 互核）
    pub fn stats_for_day(&self, day: NaiveDate) -> Result<u32, StorageError> {
        let conn = self.lock();
        let count: Option<i64> = conn
            .query_row(
                "SELECT applications FROM daily_stats WHERE day = ?1",
                params![day.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0) as u32)
    }

    /// 日统计自增（成功投递后调用）
    pub fn increment_daily(&self, day: NaiveDate) -> Result<(), StorageError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO daily_stats (day, applications) VALUES (?1, 1)
             ON CONFLICT (day) DO UPDATE SET applications = applications + 1",
            params![day.to_string()],
        )?;
        Ok(())
    }

    pub fn get_config(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.lock();
        let value = conn
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_config(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandidacyStatus;

    fn sample(job_id: &str, status: CandidacyStatus) -> CandidacyRecord {
        CandidacyRecord::new(
            job_id.to_string(),
            "某公司".to_string(),
            "Rust 工程师".to_string(),
            Some("远程".to_string()),
            status,
            None,
            Some(420),
        )
    }

    #[test]
    fn test_record_and_query_back() {
        let ledger = CandidacyLedger::open_in_memory().unwrap();
        ledger
            .record(&sample("job-1", CandidacyStatus::Success))
            .unwrap();
        assert!(ledger.has_been_attempted("job-1").unwrap());
        assert!(!ledger.has_been_attempted("job-2").unwrap());

        let recent = ledger.list_recent(10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].job_id, "job-1");
        assert_eq!(recent[0].status, CandidacyStatus::Success);
        assert_eq!(recent[0].llm_tokens, Some(420));
    }

    #[test]
    fn test_duplicate_job_is_rejected_and_first_row_kept() {
        let ledger = CandidacyLedger::open_in_memory().unwrap();
        ledger
            .record(&sample("job-1", CandidacyStatus::Failure))
            .unwrap();
        let err = ledger
            .record(&sample("job-1", CandidacyStatus::Success))
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateJob { ref job_id } if job_id == "job-1"));

        // 原记录保持失败状态，没有被覆盖
        let recent = ledger.list_recent(1).unwrap();
        assert_eq!(recent[0].status, CandidacyStatus::Failure);
    }

    #[test]
    fn test_daily_count_only_counts_success() {
        let ledger = CandidacyLedger::open_in_memory().unwrap();
        ledger
            .record(&sample("a", CandidacyStatus::Success))
            .unwrap();
        ledger
            .record(&sample("b", CandidacyStatus::Failure))
            .unwrap();
        ledger
            .record(&sample("c", CandidacyStatus::Skipped))
            .unwrap();
        let today = Local::now().date_naive();
        assert_eq!(ledger.daily_count(today).unwrap(), 1);
    }

    #[test]
    fn test_daily_stats_upsert_and_read_back() {
        let ledger = CandidacyLedger::open_in_memory().unwrap();
        let today = Local::now().date_naive();
        assert_eq!(ledger.stats_for_day(today).unwrap(), 0);
        ledger.increment_daily(today).unwrap();
        ledger.increment_daily(today).unwrap();
        assert_eq!(ledger.stats_for_day(today).unwrap(), 2);
    }

    #[test]
    fn test_corrupt_timestamp_surfaces_error_on_read() {
        let ledger = CandidacyLedger::open_in_memory().unwrap();
        ledger
            .record(&sample("job-1", CandidacyStatus::Success))
            .unwrap();
        {
            let conn = ledger.lock();
            conn.execute(
                "UPDATE candidacies SET applied_at = 'yesterday-ish' WHERE job_id = 'job-1'",
                [],
            )
            .unwrap();
        }
        let err = ledger.list_recent(10).unwrap_err();
        assert!(matches!(err, StorageError::CorruptRecord { ref job_id, .. } if job_id == "job-1"));
    }

    #[test]
    fn test_config_kv_roundtrip() {
        let ledger = CandidacyLedger::open_in_memory().unwrap();
        assert_eq!(ledger.get_config("account_started_on").unwrap(), None);
        ledger.set_config("account_started_on", "2026-08-29").unwrap();
        ledger.set_config("account_started_on", "2026-08-28").unwrap();
        assert_eq!(
            ledger.get_config("account_started_on").unwrap().as_deref(),
            Some("2026-08-28")
        );
    }

    #[test]
    fn test_recent_order_is_newest_first() {
        let ledger = CandidacyLedger::open_in_memory().unwrap();
        for i in 0..5 {
            ledger
                .record(&sample(&format!("job-{i}"), CandidacyStatus::Success))
                .unwrap();
        }
        let recent = ledger.list_recent(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].job_id, "job-4");
        assert_eq!(recent[2].job_id, "job-2");
    }
}
