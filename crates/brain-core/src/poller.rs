//! Background sync status poller
//!
//! One task owns the [`SyncSource`] and processes checks and manual triggers
//! strictly one at a time. Views observe it through a `watch` channel and
//! talk to it through a [`PollerHandle`]. Dropping the handle cancels the task,
//! so nothing is published once the view is gone.

use crate::sync::{SyncSource, SyncStatusRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tokio_util::sync::CancellationToken;

/// Poller timings
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Status check interval (default: 30s).
    pub poll_interval: Duration,
    /// How recent a success must be to raise a notification (default: 60s).
    pub fresh_window: Duration,
    /// Notification lifetime (default: 5s).
    pub notification_ttl: Duration,
    /// Delay between a manual trigger and the follow-up check (default: 2s).
    pub manual_settle: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            fresh_window: Duration::from_secs(60),
            notification_ttl: Duration::from_secs(5),
            manual_settle: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    #[default]
    Idle,
    Checking,
}

/// Transient "sync completed" banner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncNotification {
    pub record: SyncStatusRecord,
    pub raised_at: DateTime<Utc>,
}

/// Everything a view needs to render sync state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSnapshot {
    pub phase: PollPhase,
    /// A manual trigger is waiting for its follow-up check
    pub triggering: bool,
    pub latest: Option<SyncStatusRecord>,
    /// Oldest first, as served
    pub history: Vec<SyncStatusRecord>,
    pub notification: Option<SyncNotification>,
    pub last_checked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Status only, from the interval
    Poll,
    Refresh,
    Trigger,
}

/// Control side of a running poller
#[derive(Debug)]
pub struct PollerHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SyncSnapshot>,
    publisher: watch::Sender<SyncSnapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Queue a manual sync
    pub fn trigger(&self) {
        if self.commands.send(Command::Trigger).is_err() {
            tracing::debug!("poller stopped, trigger ignored");
        }
    }

    /// Queue a status and history check
    pub fn refresh(&self) {
        if self.commands.send(Command::Refresh).is_err() {
            tracing::debug!("poller stopped, refresh ignored");
        }
    }

    /// Close the current notification now, even while a check is running
    pub fn dismiss(&self) {
        self.publisher
            .send_if_modified(|s| s.notification.take().is_some());
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.state.clone()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.state.borrow().clone()
    }

    /// Cancel the poller and wait for its task to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!(error = %e, "sync poller task failed");
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct SyncPoller {
    source: Arc<dyn SyncSource>,
    config: PollerConfig,
    state: watch::Sender<SyncSnapshot>,
    // Expires the current notification on its own clock, so a slow check
    // cannot keep it on screen.
    dismiss_timer: Option<JoinHandle<()>>,
}

impl SyncPoller {
    /// Start polling on the current runtime.
    ///
    /// Status and history are checked immediately, then status alone every
    /// `poll_interval`. History is refetched on refresh and after a trigger.
    pub fn spawn(source: Arc<dyn SyncSource>, config: PollerConfig) -> PollerHandle {
        let (state_tx, state_rx) = watch::channel(SyncSnapshot::default());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let publisher = state_tx.clone();
        let poller = SyncPoller {
            source,
            config,
            state: state_tx,
            dismiss_timer: None,
        };
        let task = tokio::spawn(poller.run(cmd_rx, cancel.clone()));

        PollerHandle {
            commands: cmd_tx,
            state: state_rx,
            publisher,
            cancel,
            task: Some(task),
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>, cancel: CancellationToken) {
        let started = tokio::select! {
            _ = cancel.cancelled() => false,
            _ = self.check(true) => true,
        };
        if started {
            self.poll_loop(&mut commands, &cancel).await;
        }

        if let Some(timer) = self.dismiss_timer.take() {
            timer.abort();
        }
        tracing::debug!("sync poller stopped");
    }

    async fn poll_loop(
        &mut self,
        commands: &mut mpsc::UnboundedReceiver<Command>,
        cancel: &CancellationToken,
    ) {
        let period = self.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Pick the next piece of work, then run it racing cancellation.
            let command = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                cmd = commands.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => return,
                },
                _ = ticker.tick() => Command::Poll,
            };

            let work = async {
                match command {
                    Command::Poll => self.check(false).await,
                    Command::Refresh => self.check(true).await,
                    Command::Trigger => self.trigger().await,
                }
            };
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = work => {}
            }
        }
    }

    fn raise_notification(&mut self, record: SyncStatusRecord, raised_at: DateTime<Utc>) {
        self.state.send_modify(|s| {
            s.notification = Some(SyncNotification { record, raised_at });
        });

        if let Some(timer) = self.dismiss_timer.take() {
            timer.abort();
        }
        let state = self.state.clone();
        let ttl = self.config.notification_ttl;
        self.dismiss_timer = Some(tokio::spawn(async move {
            sleep(ttl).await;
            // Leave a newer notification alone.
            state.send_if_modified(|s| {
                if s.notification.as_ref().is_some_and(|n| n.raised_at == raised_at) {
                    s.notification = None;
                    true
                } else {
                    false
                }
            });
        }));
    }

    async fn check(&mut self, with_history: bool) {
        self.state.send_modify(|s| s.phase = PollPhase::Checking);

        match self.source.latest_status().await {
            Ok(latest) => {
                let now = Utc::now();
                let fresh = latest
                    .as_ref()
                    .filter(|r| r.is_fresh_success(now, self.config.fresh_window))
                    .cloned();
                // An empty answer keeps the record already on display.
                self.state.send_modify(|s| {
                    if latest.is_some() {
                        s.latest = latest;
                    }
                    s.last_checked = Some(now);
                });
                if let Some(record) = fresh {
                    tracing::info!(commit = record.short_sha(), "content sync completed");
                    self.raise_notification(record, now);
                }
            }
            Err(e) => tracing::warn!(error = %e, "sync status check failed"),
        }

        if with_history {
            match self.source.history().await {
                Ok(history) => self.state.send_modify(|s| s.history = history),
                Err(e) => tracing::warn!(error = %e, "sync history fetch failed"),
            }
        }

        self.state.send_modify(|s| s.phase = PollPhase::Idle);
    }

    async fn trigger(&mut self) {
        self.state.send_modify(|s| s.triggering = true);
        match self.source.trigger_manual().await {
            Ok(()) => {
                tracing::info!("manual sync requested");
                sleep(self.config.manual_settle).await;
                self.check(true).await;
            }
            Err(e) => tracing::warn!(error = %e, "manual sync trigger failed"),
        }
        self.state.send_modify(|s| s.triggering = false);
    }
}
