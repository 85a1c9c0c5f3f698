//! HTTP client for the brain backends

use crate::config::Config;
use crate::editor::TaskUpdater;
use crate::store::TaskSource;
use crate::sync::{SyncHistoryResponse, SyncSource, SyncStatusRecord, SyncStatusResponse};
use crate::{Error, Result, Status, TaskDocument};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 5;

const SYNC_STATUS_PATH: &str = "api/sync/status";
const SYNC_HISTORY_PATH: &str = "api/sync/history";
const SYNC_MANUAL_PATH: &str = "api/sync/manual";

/// Client for the tasks endpoint, the sync service and (optionally) the task
/// update endpoint.
#[derive(Debug, Clone)]
pub struct BrainClient {
    tasks_url: String,
    sync_base_url: String,
    task_update_url: Option<String>,
    http: Client,
}

/// Body returned by the update endpoint
#[derive(Debug, Deserialize)]
struct UpdateResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

fn default_success() -> bool {
    true
}

impl Default for UpdateResponse {
    fn default() -> Self {
        Self {
            success: true,
            message: None,
        }
    }
}

impl BrainClient {
    pub fn new(
        tasks_url: impl Into<String>,
        sync_base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
            .build()?;
        Ok(Self {
            tasks_url: tasks_url.into(),
            sync_base_url: sync_base_url.into(),
            task_update_url: None,
            http,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Self::new(
            config.endpoints.tasks_url.clone(),
            config.endpoints.sync_base_url.clone(),
            config.sync.request_timeout(),
        )?;
        Ok(match &config.endpoints.task_update_url {
            Some(url) => client.with_task_update_url(url.clone()),
            None => client,
        })
    }

    /// Send status changes to `<url>/<id>/update`
    pub fn with_task_update_url(mut self, url: impl Into<String>) -> Self {
        self.task_update_url = Some(url.into());
        self
    }

    pub fn updates_remotely(&self) -> bool {
        self.task_update_url.is_some()
    }

    fn sync_url(&self, path: &str) -> String {
        join_url(&self.sync_base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        tracing::debug!(url, "GET");
        let response = check_status(self.http.get(url).send().await?)?;
        Ok(response.json().await?)
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::UnexpectedStatus {
            url: response.url().to_string(),
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl TaskSource for BrainClient {
    async fn fetch_document(&self) -> Result<TaskDocument> {
        let value: serde_json::Value = self.get_json(&self.tasks_url).await?;
        TaskDocument::from_value(value)
    }
}

#[async_trait]
impl SyncSource for BrainClient {
    async fn latest_status(&self) -> Result<Option<SyncStatusRecord>> {
        let body: SyncStatusResponse = self.get_json(&self.sync_url(SYNC_STATUS_PATH)).await?;
        Ok(body.latest_sync)
    }

    async fn history(&self) -> Result<Vec<SyncStatusRecord>> {
        let body: SyncHistoryResponse = self.get_json(&self.sync_url(SYNC_HISTORY_PATH)).await?;
        Ok(body.history)
    }

    async fn trigger_manual(&self) -> Result<()> {
        let url = self.sync_url(SYNC_MANUAL_PATH);
        tracing::debug!(url = %url, "POST");
        check_status(self.http.post(&url).send().await?)?;
        Ok(())
    }
}

#[async_trait]
impl TaskUpdater for BrainClient {
    /// Without an update URL the change is kept local and this succeeds.
    async fn update_status(
        &self,
        task_id: &str,
        status: Status,
        comment: Option<&str>,
    ) -> Result<()> {
        let Some(base) = &self.task_update_url else {
            return crate::editor::LocalUpdater
                .update_status(task_id, status, comment)
                .await;
        };

        let url = join_url(base, &format!("{task_id}/update"));
        let status_value = status.to_string();
        let mut form = vec![("status", status_value.as_str())];
        if let Some(comment) = comment {
            form.push(("comment", comment));
        }

        tracing::debug!(url = %url, %status, "POST");
        let response = check_status(self.http.post(&url).form(&form).send().await?)?;

        // Older backends answer with an empty or non-JSON body.
        let text = response.text().await?;
        let body: UpdateResponse = serde_json::from_str(&text).unwrap_or_default();
        if body.success {
            Ok(())
        } else {
            Err(Error::Rejected {
                task_id: task_id.to_string(),
                message: body.message.unwrap_or_else(|| "update rejected".to_string()),
            })
        }
    }
}
