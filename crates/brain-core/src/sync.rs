//! Sync status records and history
//!
//! Records are produced by the sync collaborator and only ever read here.

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Commit sha prefix shown in summaries
pub const SHORT_SHA_LEN: usize = 8;
/// Commit message characters shown before truncation
pub const MESSAGE_PREVIEW_CHARS: usize = 50;
/// Entries shown in the history view
pub const HISTORY_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Success,
    Error,
    /// Anything the collaborator reports that is neither success nor error
    #[default]
    Pending,
}

impl SyncState {
    pub fn label(&self) -> &'static str {
        match self {
            SyncState::Success => "Synced",
            SyncState::Error => "Sync failed",
            SyncState::Pending => "Syncing",
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::Success => write!(f, "success"),
            SyncState::Error => write!(f, "error"),
            SyncState::Pending => write!(f, "pending"),
        }
    }
}

impl<'de> Deserialize<'de> for SyncState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.to_lowercase().as_str() {
            "success" => SyncState::Success,
            "error" | "failed" => SyncState::Error,
            _ => SyncState::Pending,
        })
    }
}

/// One sync attempt as reported by the collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusRecord {
    #[serde(default)]
    pub status: SyncState,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub commit_sha: String,
    #[serde(default)]
    pub commit_message: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub files_changed: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// The collaborator writes naive ISO timestamps; those are taken as UTC.
fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<DateTime<Utc>, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse_timestamp(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}")))
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

impl SyncStatusRecord {
    pub fn short_sha(&self) -> &str {
        match self.commit_sha.char_indices().nth(SHORT_SHA_LEN) {
            Some((idx, _)) => &self.commit_sha[..idx],
            None => &self.commit_sha,
        }
    }

    /// Success that completed less than `window` before `now`
    pub fn is_fresh_success(&self, now: DateTime<Utc>, window: Duration) -> bool {
        if self.status != SyncState::Success {
            return false;
        }
        let Ok(window) = chrono::Duration::from_std(window) else {
            return false;
        };
        let age = now.signed_duration_since(self.timestamp);
        age < window
    }
}

/// Body of `GET /api/sync/status`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncStatusResponse {
    #[serde(default)]
    pub latest_sync: Option<SyncStatusRecord>,
}

/// Body of `GET /api/sync/history`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncHistoryResponse {
    #[serde(default)]
    pub history: Vec<SyncStatusRecord>,
}

/// The sync collaborator
#[async_trait]
pub trait SyncSource: Send + Sync {
    /// Most recent record, if any sync has happened
    async fn latest_status(&self) -> Result<Option<SyncStatusRecord>>;
    /// Trailing history, oldest first
    async fn history(&self) -> Result<Vec<SyncStatusRecord>>;
    /// Ask the collaborator to sync now
    async fn trigger_manual(&self) -> Result<()>;
}

/// Truncate to `max` characters, appending "..." when anything was cut
pub fn truncate_message(message: &str, max: usize) -> String {
    match message.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &message[..idx]),
        None => message.to_string(),
    }
}

/// One line of the history view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistorySummary {
    pub status: SyncState,
    pub timestamp: DateTime<Utc>,
    pub short_sha: String,
    pub message: String,
    pub files_count: usize,
}

impl HistorySummary {
    pub fn from_record(record: &SyncStatusRecord, message_chars: usize) -> Self {
        Self {
            status: record.status,
            timestamp: record.timestamp,
            short_sha: record.short_sha().to_string(),
            message: truncate_message(&record.commit_message, message_chars),
            files_count: record.files_changed.len(),
        }
    }
}

/// The last `limit` records of an oldest-first list, newest first
pub fn recent_history(history: &[SyncStatusRecord], limit: usize) -> Vec<&SyncStatusRecord> {
    let start = history.len().saturating_sub(limit);
    history[start..].iter().rev().collect()
}

/// Summaries for the history view
pub fn summarize_history(
    history: &[SyncStatusRecord],
    limit: usize,
    message_chars: usize,
) -> Vec<HistorySummary> {
    recent_history(history, limit)
        .into_iter()
        .map(|record| HistorySummary::from_record(record, message_chars))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(sha: &str, status: SyncState, timestamp: DateTime<Utc>) -> SyncStatusRecord {
        SyncStatusRecord {
            status,
            timestamp,
            commit_sha: sha.to_string(),
            commit_message: format!("commit {sha}"),
            author: "dev".to_string(),
            files_changed: vec![".brain/tasks.json".to_string()],
            error: None,
        }
    }

    #[test]
    fn test_decode_status_response() {
        let body: SyncStatusResponse = serde_json::from_value(json!({
            "latest_sync": {
                "timestamp": "2025-09-27T10:15:30.123456",
                "commit_sha": "abcdef0123456789",
                "commit_message": "Update brain",
                "author": "dev",
                "files_changed": [".brain/a.md", ".brain/b.md"],
                "status": "success"
            },
            "total_syncs": 3
        }))
        .unwrap();

        let latest = body.latest_sync.unwrap();
        assert_eq!(latest.status, SyncState::Success);
        assert_eq!(latest.short_sha(), "abcdef01");
        assert_eq!(
            latest.timestamp,
            Utc.with_ymd_and_hms(2025, 9, 27, 10, 15, 30).unwrap()
                + chrono::Duration::microseconds(123_456)
        );
    }

    #[test]
    fn test_missing_latest_sync() {
        let body: SyncStatusResponse =
            serde_json::from_value(json!({"message": "No sync history found"})).unwrap();
        assert!(body.latest_sync.is_none());
    }

    #[test]
    fn test_unknown_state_is_pending() {
        let state: SyncState = serde_json::from_value(json!("processing")).unwrap();
        assert_eq!(state, SyncState::Pending);
    }

    #[test]
    fn test_freshness_window() {
        let now = Utc.with_ymd_and_hms(2025, 9, 27, 12, 0, 0).unwrap();
        let window = Duration::from_secs(60);

        let fresh = record("a", SyncState::Success, now - chrono::Duration::seconds(30));
        assert!(fresh.is_fresh_success(now, window));

        let stale = record("b", SyncState::Success, now - chrono::Duration::seconds(90));
        assert!(!stale.is_fresh_success(now, window));

        let edge = record("c", SyncState::Success, now - chrono::Duration::seconds(60));
        assert!(!edge.is_fresh_success(now, window));

        let failed = record("d", SyncState::Error, now);
        assert!(!failed.is_fresh_success(now, window));
    }

    #[test]
    fn test_recent_history_is_last_five_newest_first() {
        let base = Utc.with_ymd_and_hms(2025, 9, 27, 12, 0, 0).unwrap();
        let history: Vec<_> = (0..8)
            .map(|i| {
                record(
                    &format!("sha{i}"),
                    SyncState::Success,
                    base + chrono::Duration::minutes(i),
                )
            })
            .collect();

        let recent = recent_history(&history, HISTORY_LIMIT);
        let shas: Vec<_> = recent.iter().map(|r| r.commit_sha.as_str()).collect();
        assert_eq!(shas, ["sha7", "sha6", "sha5", "sha4", "sha3"]);

        assert_eq!(recent_history(&history[..2], HISTORY_LIMIT).len(), 2);
        assert!(recent_history(&[], HISTORY_LIMIT).is_empty());
    }

    #[test]
    fn test_summary_truncates_message() {
        let now = Utc::now();
        let mut long = record("0123456789abcdef", SyncState::Error, now);
        long.commit_message = "x".repeat(60);

        let summary = HistorySummary::from_record(&long, MESSAGE_PREVIEW_CHARS);
        assert_eq!(summary.short_sha, "01234567");
        assert_eq!(summary.message, format!("{}...", "x".repeat(50)));
        assert_eq!(summary.files_count, 1);

        assert_eq!(truncate_message("short", MESSAGE_PREVIEW_CHARS), "short");
    }
}
