//! Output formatting for CLI commands

use anyhow::Result;
use serde::Serialize;

use crate::notification::{DispatchOutcome, SendResult};

/// Pretty JSON to stdout
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// 单个展示端结果的简短描述
pub fn describe_send_result(result: &SendResult) -> String {
    match result {
        SendResult::Sent => "sent".to_string(),
        SendResult::Skipped(reason) => format!("skipped ({})", reason),
        SendResult::Failed(error) => format!("failed ({})", error),
    }
}

/// 分发结果的文本摘要（写到 stderr，stdout 留给展示端）
pub fn report_outcome(outcome: &DispatchOutcome) {
    eprintln!("notification {} [{}]", outcome.id, outcome.notification.dedup_key);
    for (presenter, result) in &outcome.results {
        eprintln!("  {}: {}", presenter, describe_send_result(result));
    }
}
