use std::time::{Duration, Instant};

use anyhow::Context as _;
use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Succeeded,
    Failed(String),
}

/// Operations the indexer needs from a search engine. Writes are
/// asynchronous on the engine side and return a task to poll.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    async fn upsert_batch(
        &self,
        documents: &[serde_json::Value],
        batch_size: usize,
        id_field: &str,
    ) -> anyhow::Result<Vec<TaskHandle>>;
    async fn delete_by_ids(&self, ids: &[String]) -> anyhow::Result<TaskHandle>;
    async fn task_status(&self, task: TaskHandle) -> anyhow::Result<TaskStatus>;
}

/// Polls `task` until it finishes. Failure and timeout are errors.
pub async fn wait_for_task(
    engine: &dyn SearchEngine,
    task: TaskHandle,
    timeout: Duration,
    interval: Duration,
) -> anyhow::Result<()> {
    let started_at = Instant::now();
    loop {
        match engine
            .task_status(task)
            .await
            .with_context(|| format!("get status of task {}", task.0))?
        {
            TaskStatus::Succeeded => return Ok(()),
            TaskStatus::Failed(message) => anyhow::bail!("task {} failed: {message}", task.0),
            TaskStatus::Pending => {}
        }
        if started_at.elapsed() >= timeout {
            anyhow::bail!("task {} timed out after {}s", task.0, timeout.as_secs());
        }
        tracing::debug!(task = task.0, "task pending");
        tokio::time::sleep(interval).await;
    }
}

/// Meilisearch REST client.
#[derive(Debug, Clone)]
pub struct MeiliSearch {
    client: reqwest::Client,
    base: Url,
    index: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnqueuedTask {
    task_uid: u64,
}

#[derive(Debug, Deserialize)]
struct TaskView {
    status: String,
    #[serde(default)]
    error: Option<TaskError>,
}

#[derive(Debug, Deserialize)]
struct TaskError {
    message: String,
}

impl MeiliSearch {
    pub fn new(host: &str, index: &str, api_key: Option<String>) -> anyhow::Result<Self> {
        let mut base = Url::parse(host).with_context(|| format!("parse search host: {host}"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        if index.trim().is_empty() {
            anyhow::bail!("search index name is empty");
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base,
            index: index.to_string(),
            api_key: api_key.filter(|key| !key.is_empty()),
        })
    }

    fn endpoint(&self, path: &str) -> anyhow::Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("build search endpoint: {path}"))
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> anyhow::Result<String> {
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };
        let response = request.send().await.with_context(|| what.to_string())?;
        let status = response.status();
        let raw = response.text().await.context("read search response body")?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or_else(|| raw.clone());
            anyhow::bail!("search API error ({status}): {message}");
        }
        Ok(raw)
    }

    async fn enqueue(&self, url: Url, body: &impl serde::Serialize) -> anyhow::Result<TaskHandle> {
        let what = format!("POST {url}");
        let raw = self.send(self.client.post(url).json(body), &what).await?;
        let task: EnqueuedTask = serde_json::from_str(&raw).context("parse enqueued task")?;
        Ok(TaskHandle(task.task_uid))
    }
}

#[async_trait]
impl SearchEngine for MeiliSearch {
    async fn upsert_batch(
        &self,
        documents: &[serde_json::Value],
        batch_size: usize,
        id_field: &str,
    ) -> anyhow::Result<Vec<TaskHandle>> {
        let mut url = self.endpoint(&format!("indexes/{}/documents", self.index))?;
        url.query_pairs_mut().append_pair("primaryKey", id_field);

        let mut tasks = Vec::new();
        for batch in documents.chunks(batch_size.max(1)) {
            tasks.push(self.enqueue(url.clone(), &batch).await?);
        }
        Ok(tasks)
    }

    async fn delete_by_ids(&self, ids: &[String]) -> anyhow::Result<TaskHandle> {
        let url = self.endpoint(&format!("indexes/{}/documents/delete-batch", self.index))?;
        self.enqueue(url, &ids).await
    }

    async fn task_status(&self, task: TaskHandle) -> anyhow::Result<TaskStatus> {
        let url = self.endpoint(&format!("tasks/{}", task.0))?;
        let what = format!("GET {url}");
        let raw = self.send(self.client.get(url), &what).await?;
        let view: TaskView = serde_json::from_str(&raw).context("parse task")?;
        Ok(match view.status.as_str() {
            "succeeded" => TaskStatus::Succeeded,
            "failed" | "canceled" => TaskStatus::Failed(
                view.error
                    .map(|err| err.message)
                    .unwrap_or_else(|| view.status.clone()),
            ),
            _ => TaskStatus::Pending,
        })
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value
        .get("message")
        .or_else(|| value.get("error")?.get("message"))?
        .as_str()?
        .to_owned();
    Some(message)
}
