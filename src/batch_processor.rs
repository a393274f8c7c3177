//! Batch processor (C6): Map -> assemble -> Reduce -> persist -> notify.
//! Grounded on `LogBatcher.cpp::processBatch`. One outer guard aborts the
//! whole batch on an unexpected failure without touching task-level
//! failures, which are always represented as a `FAILURE` result row
//! rather than propagated.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{error, warn};

use crate::analyzer::AnalyzerClient;
use crate::notifier::WebhookNotifier;
use crate::repository::LogRepository;
use crate::types::{AnalysisResultItem, AnalysisTask, BatchSummary, LogAnalysisResult, RiskLevel};

pub async fn process_batch(
    tasks: Vec<AnalysisTask>,
    repo: Arc<LogRepository>,
    analyzer: Arc<dyn AnalyzerClient>,
    notifier: Arc<WebhookNotifier>,
) {
    if tasks.is_empty() {
        return;
    }
    let start = Instant::now();

    // 1. Prepare Map-phase input, dropping any task with an empty trace id.
    let logs: Vec<(String, String)> = tasks
        .iter()
        .filter(|t| {
            if t.trace_id.is_empty() {
                warn!("skipping task with empty trace_id in batch");
                false
            } else {
                true
            }
        })
        .map(|t| (t.trace_id.clone(), t.raw_request_body.clone()))
        .collect();

    // 2. Raw logs batch-persist.
    if let Err(e) = repo.save_raw_log_batch(&logs).await {
        error!(error = %e, "batch processing aborted: failed to persist raw logs");
        return;
    }

    // 3. Map phase: batch classification. A failure here degrades every
    // task in the batch to a FAILURE row rather than aborting the batch.
    let shared_prompt = tasks
        .first()
        .map(|t| t.active_prompt.clone())
        .unwrap_or_default();
    let shared_key = tasks.first().map(|t| t.ai_api_key.clone()).unwrap_or_default();
    let shared_model = tasks.first().map(|t| t.ai_model.clone()).unwrap_or_default();

    let map_results: HashMap<String, LogAnalysisResult> = match analyzer
        .analyze_batch(&logs, &shared_key, &shared_model, &shared_prompt)
        .await
    {
        Ok(map) => map,
        Err(e) => {
            warn!(error = %e, "map phase failed, marking batch as failures");
            HashMap::new()
        }
    };

    // 4. Assemble persisted items and the Reduce-phase input.
    let mut items = Vec::with_capacity(tasks.len());
    let mut results_for_summary = Vec::with_capacity(map_results.len());
    for task in &tasks {
        let elapsed_ms = start.elapsed().as_millis() as i64;
        match map_results.get(&task.trace_id) {
            Some(result) => {
                items.push(AnalysisResultItem {
                    trace_id: task.trace_id.clone(),
                    result: result.clone(),
                    response_time_ms: elapsed_ms,
                    status: "SUCCESS",
                });
                results_for_summary.push(result.clone());
            }
            None => {
                items.push(AnalysisResultItem {
                    trace_id: task.trace_id.clone(),
                    result: LogAnalysisResult::placeholder_failure("AI analysis missing"),
                    response_time_ms: elapsed_ms,
                    status: "FAILURE",
                });
            }
        }
    }

    // 5. Reduce phase: cross-batch narrative. The analyzer returns a
    // JSON-encoded string that may itself be a nested object or a plain
    // sentence; parsed defensively, any failure degrades to placeholder
    // values rather than aborting the batch.
    let (global_summary, global_risk_level, key_patterns) = if results_for_summary.is_empty() {
        ("No summary available.".to_string(), RiskLevel::Unknown, "[]".to_string())
    } else {
        let raw = analyzer
            .summarize(&results_for_summary, &shared_key, &shared_model, &shared_prompt)
            .await;
        parse_reduce_output(&raw)
    };

    let summary = BatchSummary {
        global_summary: global_summary.clone(),
        global_risk_level,
        key_patterns,
        processing_time_ms: start.elapsed().as_millis() as i64,
    };

    // 6 + 7. Batch summary + result rows persist; repository updates the
    // dashboard snapshot only after its own transaction commits.
    let snapshot_stats = repo.get_dashboard_stats();
    let batch_id = match repo.save_batch_summary(&summary, &snapshot_stats).await {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, "batch processing aborted: failed to persist batch summary");
            return;
        }
    };
    if let Err(e) = repo.save_analysis_result_batch(&items, batch_id).await {
        error!(error = %e, "batch processing aborted: failed to persist analysis results");
        return;
    }

    // 8. Outbound notification, best-effort.
    notifier
        .notify(
            &format!("batch-{batch_id}"),
            &json!({ "global_summary": global_summary, "item_count": items.len() }),
        )
        .await;
}

/// Parses the Reduce call's raw response string into its three fields.
/// `raw` may be a JSON object (`{"global_summary":…,"global_risk_level":…,
/// "key_patterns":[…]}`), or — per the analyzer's documented looseness — a
/// plain sentence. Anything other than a well-formed object is treated as
/// the summary text itself, with the other two fields defaulted.
fn parse_reduce_output(raw: &str) -> (String, RiskLevel, String) {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(obj)) => {
            let global_summary = obj
                .get("global_summary")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| "No summary available.".to_string());
            let global_risk_level = obj
                .get("global_risk_level")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<RiskLevel>().ok())
                .unwrap_or(RiskLevel::Unknown);
            let key_patterns = obj
                .get("key_patterns")
                .map(|v| v.to_string())
                .unwrap_or_else(|| "[]".to_string());
            (global_summary, global_risk_level, key_patterns)
        }
        _ => (raw.to_string(), RiskLevel::Unknown, "[]".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reduce_output_reads_nested_object() {
        let raw = r#"{"global_summary":"3 errors seen","global_risk_level":"critical","key_patterns":["oom","timeout"]}"#;
        let (summary, risk, patterns) = parse_reduce_output(raw);
        assert_eq!(summary, "3 errors seen");
        assert_eq!(risk, RiskLevel::Critical);
        assert_eq!(patterns, r#"["oom","timeout"]"#);
    }

    #[test]
    fn parse_reduce_output_defaults_missing_key_patterns() {
        let raw = r#"{"global_summary":"fine","global_risk_level":"safe"}"#;
        let (_, _, patterns) = parse_reduce_output(raw);
        assert_eq!(patterns, "[]");
    }

    #[test]
    fn parse_reduce_output_treats_plain_sentence_as_summary() {
        let (summary, risk, patterns) = parse_reduce_output("Everything looks fine today.");
        assert_eq!(summary, "Everything looks fine today.");
        assert_eq!(risk, RiskLevel::Unknown);
        assert_eq!(patterns, "[]");
    }
}
