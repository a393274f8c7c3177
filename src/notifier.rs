//! Outbound webhook notification, fired once per dispatched batch after
//! persistence succeeds. Grounded on
//! `original_source/notification/WebhookNotifier.cpp`. An external
//! collaborator per the service's own design — failures here are logged
//! and never propagate back into the batch's result.

use std::time::Duration;

use serde_json::json;
use tracing::warn;

pub struct WebhookNotifier {
    urls: Vec<String>,
}

impl WebhookNotifier {
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls }
    }

    pub async fn notify(&self, trace_id: &str, content: &serde_json::Value) {
        if self.urls.is_empty() {
            return;
        }
        let body = json!({ "trace_id": trace_id, "content": content });
        let client = reqwest::Client::new();
        for url in &self.urls {
            let result = client
                .post(url)
                .timeout(Duration::from_secs(3))
                .json(&body)
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => warn!(%url, status = %resp.status(), "webhook notification rejected"),
                Err(e) => warn!(%url, error = %e, "webhook notification failed"),
            }
        }
    }
}
