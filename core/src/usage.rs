//! Usage-stats NDJSON writer (§3 `UsageStatsEntry`, §5, §6). Writes are
//! fire-and-forget appends; compaction only happens on an explicit
//! reporting call, never as a side effect of a write.

use crate::config::UsageStatsConfig;
use crate::turn::LlmUsage;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageStatsEntry {
    pub ts: String,
    pub provider: String,
    pub model: String,
    pub request_count: u32,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    pub has_usage: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

impl UsageStatsEntry {
    pub fn from_usage(provider: &str, model: &str, usage: &LlmUsage, ts: &str) -> Self {
        let has_usage = usage.total_tokens > 0 || usage.prompt_tokens > 0 || usage.completion_tokens > 0;
        Self {
            ts: ts.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            request_count: 1,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            has_usage,
            event_type: None,
        }
    }
}

/// Appends one NDJSON line to the configured usage-stats file. Best-effort:
/// the caller logs failures but never lets a usage-stats write fail the
/// invocation itself (§5: "fire-and-forget").
pub fn append_entry(cfg: &UsageStatsConfig, entry: &UsageStatsEntry) -> std::io::Result<()> {
    if !cfg.enabled {
        return Ok(());
    }
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cfg.file)?;
    file.write_all(line.as_bytes())
}

/// Reads every well-formed line of the usage-stats file, tolerating a
/// partial/corrupt last line as described in §5.
pub fn read_entries(path: &Path) -> std::io::Result<Vec<UsageStatsEntry>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    Ok(content
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}

/// Compacts the usage-stats file on an explicit reporting call: drops
/// entries older than `retention_days` (by best-effort RFC3339 parse of
/// `ts`), then rewrites the file if it still exceeds ~70% of `max_bytes`.
pub fn compact(cfg: &UsageStatsConfig, now: chrono::DateTime<chrono::Utc>) -> std::io::Result<()> {
    let path = Path::new(&cfg.file);
    let mut entries = read_entries(path)?;

    let cutoff = now - chrono::Duration::days(cfg.retention_days as i64);
    entries.retain(|e| {
        chrono::DateTime::parse_from_rfc3339(&e.ts)
            .map(|ts| ts.with_timezone(&chrono::Utc) >= cutoff)
            .unwrap_or(true)
    });

    let target_bytes = (cfg.max_bytes as f64 * 0.7) as u64;
    let mut body = String::new();
    for entry in entries.iter().rev() {
        let mut line = serde_json::to_string(entry).unwrap_or_default();
        line.push('\n');
        if (body.len() as u64 + line.len() as u64) > target_bytes {
            break;
        }
        body = line + &body;
    }

    let tmp = path.with_extension("tmp.compact");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(file: &Path) -> UsageStatsConfig {
        UsageStatsConfig {
            enabled: true,
            file: file.to_string_lossy().to_string(),
            retention_days: 30,
            max_bytes: 5_000_000,
        }
    }

    #[test]
    fn appends_and_reads_back_entries() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("usage.ndjson");
        let c = cfg(&file);
        let usage = LlmUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        let entry = UsageStatsEntry::from_usage("openai", "gpt-4o", &usage, "2026-07-26T00:00:00Z");
        append_entry(&c, &entry).unwrap();
        append_entry(&c, &entry).unwrap();
        let entries = read_entries(&file).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].total_tokens, 15);
    }

    #[test]
    fn tolerates_partial_last_line() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("usage.ndjson");
        std::fs::write(&file, "{\"ts\":\"2026-07-26T00:00:00Z\",\"provider\":\"openai\",\"model\":\"gpt-4o\",\"request_count\":1,\"input_tokens\":1,\"output_tokens\":1,\"total_tokens\":2,\"has_usage\":true}\n{\"ts\":\"broken").unwrap();
        let entries = read_entries(&file).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn disabled_config_skips_write() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("usage.ndjson");
        let mut c = cfg(&file);
        c.enabled = false;
        let usage = LlmUsage::default();
        let entry = UsageStatsEntry::from_usage("openai", "gpt-4o", &usage, "2026-07-26T00:00:00Z");
        append_entry(&c, &entry).unwrap();
        assert!(!file.exists());
    }
}
