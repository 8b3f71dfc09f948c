use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::LangfuseConfig;
use crate::message::Message;
use crate::runtime::{RunRecord, Step};

pub trait RunObserver: Send + Sync {
    fn on_step(&self, _run_name: &str, _step: &Step) {}

    fn on_end(&self, _record: &RunRecord) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl RunObserver for LogObserver {
    fn on_step(&self, run_name: &str, step: &Step) {
        info!("[{}] step {}\n{}", run_name, step.index, step.message);
        if step.message.is_final_answer() {
            info!("Final message: {}", step.message.content());
        }
    }

    fn on_end(&self, record: &RunRecord) {
        match &record.error {
            Some(error) => warn!(
                "[{}] run {} failed after {} steps: {}",
                record.name,
                record.id,
                record.steps.len(),
                error
            ),
            None => info!(
                "[{}] run {} finished in {} steps",
                record.name,
                record.id,
                record.steps.len()
            ),
        }
    }
}

// Langfuse tracing callback. One ingestion batch per finished run.
pub struct LangfuseHandler {
    client: reqwest::Client,
    config: LangfuseConfig,
}

impl LangfuseHandler {
    pub fn new(config: LangfuseConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn ingestion_url(&self) -> String {
        format!(
            "{}/api/public/ingestion",
            self.config.host.trim_end_matches('/')
        )
    }
}

impl RunObserver for LangfuseHandler {
    fn on_end(&self, record: &RunRecord) {
        let batch = ingestion_batch(record);
        let request = self
            .client
            .post(self.ingestion_url())
            .basic_auth(&self.config.public_key, Some(&self.config.secret_key))
            .json(&batch);
        let run_id = record.id;

        // Delivery never holds up the HTTP response.
        tokio::spawn(async move {
            match request.send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => warn!(
                    "Langfuse rejected trace {}: HTTP {}",
                    run_id,
                    resp.status()
                ),
                Err(e) => warn!("Failed to ship trace {} to Langfuse: {}", run_id, e),
            }
        });
    }
}

pub fn ingestion_batch(record: &RunRecord) -> Value {
    let trace_id = record.id.to_string();
    let mut batch = vec![event(
        "trace-create",
        record.finished_at,
        json!({
            "id": trace_id,
            "name": record.name,
            "timestamp": rfc3339(record.started_at),
            "input": record.input,
            "output": record.answer.as_ref().or(record.error.as_ref()),
            "metadata": {
                "model": record.model,
                "steps": record.steps.len(),
                "error": record.error,
            },
        }),
    )];

    let mut previous = record.started_at;
    for (position, step) in record.steps.iter().enumerate() {
        match &step.message {
            Message::Assistant { .. } => {
                let history: Vec<&Message> =
                    record.steps[..position].iter().map(|s| &s.message).collect();
                batch.push(event(
                    "generation-create",
                    step.at,
                    json!({
                        "id": Uuid::new_v4().to_string(),
                        "traceId": trace_id,
                        "name": "agent",
                        "model": record.model,
                        "startTime": rfc3339(previous),
                        "endTime": rfc3339(step.at),
                        "input": history,
                        "output": step.message,
                    }),
                ));
            }
            Message::Tool { name, content, .. } => {
                batch.push(event(
                    "span-create",
                    step.at,
                    json!({
                        "id": Uuid::new_v4().to_string(),
                        "traceId": trace_id,
                        "name": name,
                        "startTime": rfc3339(previous),
                        "endTime": rfc3339(step.at),
                        "output": content,
                    }),
                ));
            }
            Message::User { .. } => {}
        }
        previous = step.at;
    }

    json!({ "batch": batch })
}

fn event(kind: &str, at: DateTime<Utc>, body: Value) -> Value {
    json!({
        "id": Uuid::new_v4().to_string(),
        "type": kind,
        "timestamp": rfc3339(at),
        "body": body,
    })
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
