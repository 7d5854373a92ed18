//! 通知历史 - 本地 JSONL 文件读写

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::channel::Priority;

/// 历史记录（JSONL 格式）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// ISO8601 时间戳
    pub ts: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup_key: Option<String>,
}

const MAX_RECORDS: usize = 200;
const KEEP_AFTER_CLEANUP: usize = 100;
const CLEANUP_CHECK_INTERVAL: usize = 10;
/// 估算行数用的平均行长
const AVG_LINE_BYTES: u64 = 120;

/// 通知历史存储
pub struct NotificationStore {
    path: PathBuf,
    writes: AtomicUsize,
}

impl NotificationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加记录（带文件锁）
    pub fn append(&self, record: &HistoryRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        file.lock_exclusive()?;
        let written = writeln!(file, "{}", serde_json::to_string(record)?);
        file.unlock()?;
        written?;

        self.maybe_cleanup();
        Ok(())
    }

    /// 读取最近 N 条（按时间排序）
    pub fn read_recent(&self, n: usize) -> Vec<HistoryRecord> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };

        let records = parse_lines(BufReader::new(file));
        let start = records.len().saturating_sub(n);
        let mut recent = records[start..].to_vec();
        recent.sort_by_key(|r| r.ts);
        recent
    }

    fn maybe_cleanup(&self) {
        let count = self.writes.fetch_add(1, Ordering::Relaxed);
        if count % CLEANUP_CHECK_INTERVAL != 0 {
            return;
        }

        if let Ok(metadata) = fs::metadata(&self.path) {
            let estimated_lines = (metadata.len() / AVG_LINE_BYTES) as usize;
            if estimated_lines > MAX_RECORDS {
                if let Err(e) = self.cleanup() {
                    tracing::warn!(error = %e, "History cleanup failed");
                }
            }
        }
    }

    /// 执行清理（保留最近的记录）
    pub fn cleanup(&self) -> Result<()> {
        let file = File::open(&self.path)?;
        file.lock_exclusive()?;
        let result = self.rewrite_tail(&file);
        file.unlock()?;
        result
    }

    fn rewrite_tail(&self, file: &File) -> Result<()> {
        let records = parse_lines(BufReader::new(file));
        if records.len() <= MAX_RECORDS {
            return Ok(());
        }

        let start = records.len().saturating_sub(KEEP_AFTER_CLEANUP);
        let temp_path = self.path.with_extension("tmp");
        {
            let mut temp_file = File::create(&temp_path)?;
            for record in &records[start..] {
                writeln!(temp_file, "{}", serde_json::to_string(record)?)?;
            }
        }

        // 原子替换
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

fn parse_lines(reader: impl BufRead) -> Vec<HistoryRecord> {
    reader
        .lines()
        .map_while(|line| line.ok())
        .filter_map(|line| serde_json::from_str(&line).ok())
        .collect()
}
