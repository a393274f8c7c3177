//! Core data model: wire types, persisted rows, and the immutable
//! config/dashboard snapshots shared across the service.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed risk classification. `Unknown` is a read-side coercion target
/// only — the analyzer is never allowed to emit it (see `RiskLevel::from_ai_str`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Critical,
    Error,
    Warning,
    Info,
    Safe,
    Unknown,
}

impl Default for RiskLevel {
    fn default() -> Self {
        Self::Unknown
    }
}

impl RiskLevel {
    /// Parses a risk level the way the analyzer is allowed to report it.
    /// Rejects `"unknown"` and anything unrecognized.
    pub fn from_ai_str(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Self::Critical),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "info" => Some(Self::Info),
            "safe" => Some(Self::Safe),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Safe => "safe",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ();

    /// Lenient read-side parse: anything not recognized coerces to `Unknown`
    /// rather than erroring, matching `getHistoricalLogs`'s defensive read.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "critical" => Self::Critical,
            "error" => Self::Error,
            "warning" => Self::Warning,
            "info" => Self::Info,
            "safe" => Self::Safe,
            _ => Self::Unknown,
        })
    }
}

/// One ingested log awaiting (or undergoing) batch processing.
#[derive(Debug, Clone)]
pub struct AnalysisTask {
    pub trace_id: String,
    pub raw_request_body: String,
    pub ai_api_key: String,
    pub ai_model: String,
    pub ai_provider: String,
    pub active_prompt: String,
    #[allow(dead_code)]
    pub started_at: Instant,
}

/// Per-log classification returned by the analyzer's Map phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogAnalysisResult {
    pub summary: String,
    pub risk_level: RiskLevel,
    pub root_cause: String,
    pub solution: String,
}

impl LogAnalysisResult {
    pub fn placeholder_failure(reason: &str) -> Self {
        Self {
            summary: reason.to_string(),
            risk_level: RiskLevel::Unknown,
            root_cause: String::new(),
            solution: String::new(),
        }
    }
}

/// A Map-phase result paired with its originating trace-id, status, and
/// per-item latency, ready for batched persistence.
#[derive(Debug, Clone)]
pub struct AnalysisResultItem {
    pub trace_id: String,
    pub result: LogAnalysisResult,
    pub response_time_ms: i64,
    pub status: &'static str,
}

/// Row persisted per dispatched batch: the Reduce-phase narrative plus the
/// batch's own risk-count rollup.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub global_summary: String,
    pub global_risk_level: RiskLevel,
    pub key_patterns: String,
    pub processing_time_ms: i64,
}

/// Mutable-at-runtime scalar settings (`app_config` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub ai_provider: String,
    pub ai_model: String,
    pub ai_api_key: String,
    pub ai_language: String,
    pub kernel_worker_threads: i64,
    pub kernel_max_batch: i64,
    pub kernel_refresh_interval: i64,
    pub kernel_io_buffer: String,
    pub kernel_adaptive_mode: bool,
    pub active_map_prompt_id: i64,
    pub active_reduce_prompt_id: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ai_provider: "openai".to_string(),
            ai_model: "gpt-4-turbo".to_string(),
            ai_api_key: String::new(),
            ai_language: "English".to_string(),
            kernel_worker_threads: 4,
            kernel_max_batch: 100,
            kernel_refresh_interval: 200,
            kernel_io_buffer: "256MB".to_string(),
            kernel_adaptive_mode: true,
            active_map_prompt_id: 0,
            active_reduce_prompt_id: 0,
        }
    }
}

/// Which list a prompt belongs to. Carried on the wire so the store never
/// has to infer it from the (possibly offset) id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptType {
    Map,
    Reduce,
}

/// One prompt row, stored internally in either the map or reduce list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub id: i64,
    pub name: String,
    pub content: String,
    pub is_active: bool,
    #[serde(rename = "type")]
    pub prompt_type: PromptType,
}

/// Outbound alert channel (webhook) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertChannel {
    pub id: i64,
    pub name: String,
    pub provider: String,
    pub webhook_url: String,
    pub alert_threshold: String,
    pub msg_template: String,
    pub is_active: bool,
}

/// Aggregate view returned from `GET /settings/all`. Prompt ids are
/// flattened into the single external id space here (see `config_store`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllSettings {
    pub config: AppConfig,
    pub prompts: Vec<PromptConfig>,
    pub channels: Vec<AlertChannel>,
}

/// Immutable, atomically-swapped snapshot of everything the batcher and
/// handlers need to read without taking a write lock.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    pub app_config: AppConfig,
    pub map_prompts: Vec<PromptConfig>,
    pub reduce_prompts: Vec<PromptConfig>,
    pub channels: Vec<AlertChannel>,
    pub active_map_prompt: String,
    pub active_reduce_prompt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertInfo {
    pub trace_id: String,
    pub summary: String,
    pub time: String,
}

/// O(1)-readable snapshot of aggregate counters, copy-on-write updated
/// after every committed batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardStats {
    pub total_logs: i64,
    pub critical_risk: i64,
    pub error_risk: i64,
    pub warning_risk: i64,
    pub info_risk: i64,
    pub safe_risk: i64,
    pub unknown_risk: i64,
    pub current_qps: f64,
    pub backpressure: f64,
    pub recent_alerts: Vec<AlertInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoricalLogItem {
    pub trace_id: String,
    pub risk_level: RiskLevel,
    pub summary: String,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub logs: Vec<HistoricalLogItem>,
    pub total_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_from_ai_str_rejects_unknown() {
        assert!(RiskLevel::from_ai_str("unknown").is_none());
    }

    #[test]
    fn risk_level_from_ai_str_accepts_closed_set() {
        for s in ["critical", "warning", "error", "info", "safe"] {
            assert!(RiskLevel::from_ai_str(s).is_some());
        }
    }

    #[test]
    fn risk_level_from_str_coerces_garbage_to_unknown() {
        assert_eq!("bogus".parse::<RiskLevel>().unwrap(), RiskLevel::Unknown);
    }

    #[test]
    fn risk_level_display_round_trips_through_from_str() {
        for lvl in [
            RiskLevel::Critical,
            RiskLevel::Error,
            RiskLevel::Warning,
            RiskLevel::Info,
            RiskLevel::Safe,
        ] {
            assert_eq!(lvl.to_string().parse::<RiskLevel>().unwrap(), lvl);
        }
    }
}
