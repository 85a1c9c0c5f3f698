//! Sync poller timing, driven by a scripted source on paused time

use async_trait::async_trait;
use brain_core::{
    Error, PollPhase, PollerConfig, Result, SyncPoller, SyncSource, SyncState, SyncStatusRecord,
};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
struct ScriptedSource {
    latest: Mutex<Option<SyncStatusRecord>>,
    fail_status: Mutex<bool>,
    status_delay: Mutex<Duration>,
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedSource {
    fn with_latest(record: SyncStatusRecord) -> Arc<Self> {
        let source = Self::default();
        *source.latest.lock().unwrap() = Some(record);
        Arc::new(source)
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncSource for ScriptedSource {
    async fn latest_status(&self) -> Result<Option<SyncStatusRecord>> {
        self.calls.lock().unwrap().push("status");
        let delay = *self.status_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_status.lock().unwrap() {
            return Err(Error::Other("connection refused".to_string()));
        }
        Ok(self.latest.lock().unwrap().clone())
    }

    async fn history(&self) -> Result<Vec<SyncStatusRecord>> {
        self.calls.lock().unwrap().push("history");
        Ok(self.latest.lock().unwrap().iter().cloned().collect())
    }

    async fn trigger_manual(&self) -> Result<()> {
        self.calls.lock().unwrap().push("trigger");
        Ok(())
    }
}

fn record(status: SyncState, age: chrono::Duration) -> SyncStatusRecord {
    SyncStatusRecord {
        status,
        timestamp: Utc::now() - age,
        commit_sha: "0123456789abcdef".to_string(),
        commit_message: "Sync brain".to_string(),
        author: "dev".to_string(),
        files_changed: Vec::new(),
        error: None,
    }
}

async fn wait_for_calls(source: &ScriptedSource, count: usize) {
    for _ in 0..1000 {
        if source.calls().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("expected {count} calls, got {:?}", source.calls());
}

#[tokio::test(start_paused = true)]
async fn test_stale_success_raises_no_notification() {
    let source = ScriptedSource::with_latest(record(SyncState::Success, chrono::Duration::minutes(5)));
    let handle = SyncPoller::spawn(source.clone(), PollerConfig::default());
    let mut rx = handle.subscribe();

    let snapshot = rx
        .wait_for(|s| s.last_checked.is_some() && s.phase == PollPhase::Idle)
        .await
        .unwrap()
        .clone();
    assert!(snapshot.latest.is_some());
    assert!(snapshot.notification.is_none());
    assert_eq!(snapshot.history.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_failure_raises_no_notification() {
    let source = ScriptedSource::with_latest(record(SyncState::Error, chrono::Duration::zero()));
    let handle = SyncPoller::spawn(source.clone(), PollerConfig::default());
    let mut rx = handle.subscribe();

    let snapshot = rx
        .wait_for(|s| s.last_checked.is_some())
        .await
        .unwrap()
        .clone();
    assert!(snapshot.notification.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_fresh_success_notification_is_dismissed() {
    let source = ScriptedSource::with_latest(record(SyncState::Success, chrono::Duration::seconds(10)));
    let handle = SyncPoller::spawn(source.clone(), PollerConfig::default());
    let mut rx = handle.subscribe();

    rx.wait_for(|s| s.notification.is_some()).await.unwrap();
    let raised = Instant::now();

    rx.wait_for(|s| s.notification.is_none()).await.unwrap();
    let elapsed = raised.elapsed();
    assert!(elapsed >= Duration::from_secs(4), "dismissed after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(30), "dismissed after {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_triggers_run_sequentially() {
    let source = ScriptedSource::with_latest(record(SyncState::Success, chrono::Duration::hours(1)));
    let handle = SyncPoller::spawn(source.clone(), PollerConfig::default());
    wait_for_calls(&source, 2).await;

    let start = Instant::now();
    handle.trigger();
    handle.trigger();
    wait_for_calls(&source, 8).await;

    assert_eq!(
        source.calls(),
        [
            "status", "history", "trigger", "status", "history", "trigger", "status", "history"
        ]
    );
    // Each trigger waits for the settle delay before re-checking.
    assert!(start.elapsed() >= Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_poll_failure_keeps_previous_record() {
    let source = ScriptedSource::with_latest(record(SyncState::Success, chrono::Duration::hours(1)));
    let handle = SyncPoller::spawn(source.clone(), PollerConfig::default());
    wait_for_calls(&source, 2).await;

    *source.fail_status.lock().unwrap() = true;
    tokio::time::sleep(Duration::from_secs(31)).await;

    // Interval polls check status only.
    assert_eq!(source.calls(), ["status", "history", "status"]);
    let snapshot = handle.snapshot();
    assert!(snapshot.latest.is_some());
    assert_eq!(snapshot.phase, PollPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_stops_polling() {
    let source = ScriptedSource::with_latest(record(SyncState::Success, chrono::Duration::hours(1)));
    let handle = SyncPoller::spawn(source.clone(), PollerConfig::default());
    wait_for_calls(&source, 2).await;

    drop(handle);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(source.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_task() {
    let source = ScriptedSource::with_latest(record(SyncState::Success, chrono::Duration::hours(1)));
    let handle = SyncPoller::spawn(source.clone(), PollerConfig::default());
    wait_for_calls(&source, 2).await;

    handle.shutdown().await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(source.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_empty_status_keeps_displayed_record() {
    let source = ScriptedSource::with_latest(record(SyncState::Success, chrono::Duration::hours(1)));
    let handle = SyncPoller::spawn(source.clone(), PollerConfig::default());
    wait_for_calls(&source, 2).await;
    assert!(handle.snapshot().latest.is_some());

    *source.latest.lock().unwrap() = None;
    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(source.calls(), ["status", "history", "status"]);
    let snapshot = handle.snapshot();
    assert_eq!(
        snapshot.latest.map(|r| r.commit_sha),
        Some("0123456789abcdef".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_notification_expires_during_slow_check() {
    let source = ScriptedSource::with_latest(record(SyncState::Success, chrono::Duration::seconds(10)));
    let handle = SyncPoller::spawn(source.clone(), PollerConfig::default());
    let mut rx = handle.subscribe();

    rx.wait_for(|s| s.notification.is_some()).await.unwrap();
    let raised = Instant::now();

    *source.status_delay.lock().unwrap() = Duration::from_secs(20);
    handle.refresh();

    let snapshot = rx
        .wait_for(|s| s.notification.is_none())
        .await
        .unwrap()
        .clone();
    assert!(raised.elapsed() < Duration::from_secs(6), "dismissed after {:?}", raised.elapsed());
    assert_eq!(snapshot.phase, PollPhase::Checking);
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_closes_notification() {
    let source = ScriptedSource::with_latest(record(SyncState::Success, chrono::Duration::seconds(10)));
    let handle = SyncPoller::spawn(source.clone(), PollerConfig::default());
    let mut rx = handle.subscribe();

    rx.wait_for(|s| s.notification.is_some()).await.unwrap();
    handle.dismiss();
    assert!(handle.snapshot().notification.is_none());
    assert!(handle.snapshot().latest.is_some());
}
