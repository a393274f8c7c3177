//! External analyzer client (C4): Map-phase batch classification and
//! Reduce-phase narrative summary over an HTTP proxy. Grounded on
//! `original_source/server/ai/GeminiApiAi.cpp`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ServiceError;
use crate::types::{LogAnalysisResult, RiskLevel};

#[async_trait]
pub trait AnalyzerClient: Send + Sync {
    /// Classifies every `(trace_id, log_text)` pair. Any deviation from
    /// the expected shape — a missing field, an HTTP error, an invalid
    /// `risk_level` — fails the *whole* call; there is no partial credit.
    async fn analyze_batch(
        &self,
        logs: &[(String, String)],
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<HashMap<String, LogAnalysisResult>, ServiceError>;

    /// Produces a cross-batch narrative summary. Unlike `analyze_batch`,
    /// a missing or malformed payload degrades to a placeholder string
    /// rather than failing the batch.
    async fn summarize(
        &self,
        results: &[LogAnalysisResult],
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> String;
}

#[derive(Serialize)]
struct BatchItem<'a> {
    id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct BatchResponseItem {
    id: String,
    analysis: serde_json::Value,
}

#[derive(Deserialize)]
struct BatchResponse {
    results: Vec<BatchResponseItem>,
}

#[derive(Deserialize)]
struct SummarizeResponse {
    summary: Option<String>,
}

fn parse_analysis(value: &serde_json::Value) -> Result<LogAnalysisResult, ServiceError> {
    let summary = value
        .get("summary")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ServiceError::ExternalFailure("missing field 'summary'".to_string()))?
        .to_string();
    let root_cause = value
        .get("root_cause")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ServiceError::ExternalFailure("missing field 'root_cause'".to_string()))?
        .to_string();
    let solution = value
        .get("solution")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ServiceError::ExternalFailure("missing field 'solution'".to_string()))?
        .to_string();
    let risk_str = value
        .get("risk_level")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ServiceError::ExternalFailure("missing field 'risk_level'".to_string()))?;
    let risk_level = RiskLevel::from_ai_str(risk_str).ok_or_else(|| {
        ServiceError::ExternalFailure(format!("invalid risk_level '{risk_str}'"))
    })?;
    Ok(LogAnalysisResult {
        summary,
        risk_level,
        root_cause,
        solution,
    })
}

/// `reqwest`-backed client calling an external analyzer proxy. Each call
/// builds its own ephemeral client — the proxy is stateless and reentrant,
/// so there is nothing worth keeping warm across requests.
pub struct HttpAnalyzerClient {
    base_url: String,
    provider: String,
}

impl HttpAnalyzerClient {
    pub fn new(base_url: impl Into<String>, provider: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), provider: provider.into() }
    }
}

#[async_trait]
impl AnalyzerClient for HttpAnalyzerClient {
    async fn analyze_batch(
        &self,
        logs: &[(String, String)],
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<HashMap<String, LogAnalysisResult>, ServiceError> {
        let url = format!("{}/analyze/batch/{}", self.base_url, self.provider);
        let batch: Vec<BatchItem> = logs
            .iter()
            .map(|(id, text)| BatchItem { id, text })
            .collect();
        let body = json!({
            "batch": batch,
            "api_key": api_key,
            "model": model,
            "prompt": prompt,
        });

        let client = reqwest::Client::new();
        let response = client
            .post(&url)
            .timeout(Duration::from_secs(30))
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalFailure(format!("analyze_batch request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalFailure(format!(
                "analyzer returned HTTP {}",
                response.status()
            )));
        }

        let parsed: BatchResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalFailure(format!("invalid JSON from analyzer: {e}")))?;

        let mut out = HashMap::with_capacity(parsed.results.len());
        for item in parsed.results {
            let result = parse_analysis(&item.analysis)?;
            out.insert(item.id, result);
        }
        Ok(out)
    }

    async fn summarize(
        &self,
        results: &[LogAnalysisResult],
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> String {
        const PLACEHOLDER: &str = "Summary not available (missing field).";
        let url = format!("{}/summarize/{}", self.base_url, self.provider);
        let body = json!({
            "results": results,
            "api_key": api_key,
            "model": model,
            "prompt": prompt,
        });

        let client = reqwest::Client::new();
        let Ok(response) = client
            .post(&url)
            .timeout(Duration::from_secs(30))
            .json(&body)
            .send()
            .await
        else {
            return "Summary generation failed.".to_string();
        };
        if !response.status().is_success() {
            return "Summary generation failed.".to_string();
        }
        match response.json::<SummarizeResponse>().await {
            Ok(parsed) => parsed.summary.unwrap_or_else(|| PLACEHOLDER.to_string()),
            Err(_) => PLACEHOLDER.to_string(),
        }
    }
}

/// Network-free double for tests: classifies deterministically from the
/// log text and never fails, so pipeline tests can exercise the
/// Map/Reduce shape without a live proxy.
pub struct MockAnalyzerClient;

#[async_trait]
impl AnalyzerClient for MockAnalyzerClient {
    async fn analyze_batch(
        &self,
        logs: &[(String, String)],
        _api_key: &str,
        _model: &str,
        _prompt: &str,
    ) -> Result<HashMap<String, LogAnalysisResult>, ServiceError> {
        Ok(logs
            .iter()
            .map(|(id, text)| {
                let risk_level = if text.to_lowercase().contains("error") {
                    RiskLevel::Error
                } else {
                    RiskLevel::Safe
                };
                (
                    id.clone(),
                    LogAnalysisResult {
                        summary: format!("mock summary for {id}"),
                        risk_level,
                        root_cause: "mock root cause".to_string(),
                        solution: "mock solution".to_string(),
                    },
                )
            })
            .collect())
    }

    async fn summarize(
        &self,
        results: &[LogAnalysisResult],
        _api_key: &str,
        _model: &str,
        _prompt: &str,
    ) -> String {
        format!("mock narrative over {} results", results.len())
    }
}
