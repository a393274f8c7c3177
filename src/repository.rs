//! SQLite-backed log repository (C2): raw log / analysis result / batch
//! summary persistence, the O(1) dashboard snapshot, and paginated
//! history queries. Grounded on
//! `original_source/server/persistence/SqliteLogRepository.{h,cpp}`.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::warn;

use crate::error::ServiceError;
use crate::types::{
    AlertInfo, AnalysisResultItem, BatchSummary, DashboardStats, HistoricalLogItem, HistoryPage,
    RiskLevel,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS raw_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trace_id TEXT NOT NULL UNIQUE,
    log_content TEXT,
    received_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS batch_summaries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    global_summary TEXT,
    global_risk_level TEXT,
    key_patterns TEXT,
    total_logs INTEGER DEFAULT 0,
    cnt_critical INTEGER DEFAULT 0,
    cnt_error INTEGER DEFAULT 0,
    cnt_warning INTEGER DEFAULT 0,
    cnt_info INTEGER DEFAULT 0,
    cnt_safe INTEGER DEFAULT 0,
    cnt_unknown INTEGER DEFAULT 0,
    processing_time_ms INTEGER DEFAULT 0,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS analysis_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trace_id TEXT NOT NULL UNIQUE,
    batch_id INTEGER,
    status TEXT NOT NULL,
    risk_level TEXT,
    summary TEXT,
    root_cause TEXT,
    solution TEXT,
    response_time_ms INTEGER DEFAULT 0,
    processed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (trace_id) REFERENCES raw_logs(trace_id),
    FOREIGN KEY (batch_id) REFERENCES batch_summaries(id)
);

CREATE INDEX IF NOT EXISTS idx_analysis_results_processed_at ON analysis_results(processed_at);

CREATE TABLE IF NOT EXISTS app_config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS map_prompts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    content TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS reduce_prompts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    content TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS alert_channels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    provider TEXT NOT NULL,
    webhook_url TEXT NOT NULL,
    alert_threshold TEXT NOT NULL,
    msg_template TEXT NOT NULL DEFAULT '',
    is_active BOOLEAN NOT NULL DEFAULT 0
);
"#;

/// Opens (or creates) the SQLite database at `db_path`, enables WAL, and
/// ensures the schema exists. `:memory:` is passed straight through.
pub async fn create_pool(db_path: &str) -> Result<SqlitePool, ServiceError> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .map_err(|e| ServiceError::Startup(format!("failed to open database: {e}")))?;

    sqlx::query(SCHEMA)
        .execute(&pool)
        .await
        .map_err(|e| ServiceError::Startup(format!("failed to create schema: {e}")))?;

    Ok(pool)
}

/// Coerces a legacy or current risk-level filter value into the set of
/// literal strings `getHistoricalLogs` should match against, carrying the
/// legacy `high`/`medium`/`low` synonyms from the original schema.
fn level_filter_values(level: &str) -> Vec<&'static str> {
    match level.to_lowercase().as_str() {
        "critical" => vec!["critical", "high"],
        "error" => vec!["error", "medium"],
        "warning" => vec!["warning", "low"],
        "info" => vec!["info"],
        "safe" => vec!["safe"],
        _ => vec![],
    }
}

pub struct LogRepository {
    pool: SqlitePool,
    stats: ArcSwap<DashboardStats>,
}

impl LogRepository {
    pub async fn new(pool: SqlitePool) -> Result<Self, ServiceError> {
        let repo = Self {
            pool,
            stats: ArcSwap::from_pointee(DashboardStats::default()),
        };
        repo.rebuild_stats_from_db().await?;
        Ok(repo)
    }

    /// O(1): returns the current in-memory snapshot, no DB IO.
    pub fn get_dashboard_stats(&self) -> DashboardStats {
        (*self.stats.load_full()).clone()
    }

    /// COW update of the two live gauge fields only.
    pub fn update_realtime_metrics(&self, qps: f64, backpressure: f64) {
        let mut next = (*self.stats.load_full()).clone();
        next.current_qps = qps;
        next.backpressure = backpressure;
        self.stats.store(Arc::new(next));
    }

    pub async fn save_raw_log_batch(&self, logs: &[(String, String)]) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        for (trace_id, raw_log) in logs {
            sqlx::query("INSERT INTO raw_logs (trace_id, log_content) VALUES (?, ?)")
                .bind(trace_id)
                .bind(raw_log)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn save_batch_summary(
        &self,
        summary: &BatchSummary,
        batch_stats: &DashboardStats,
    ) -> Result<i64, ServiceError> {
        let row = sqlx::query(
            "INSERT INTO batch_summaries
             (global_summary, global_risk_level, key_patterns, total_logs,
              cnt_critical, cnt_error, cnt_warning, cnt_info, cnt_safe, cnt_unknown,
              processing_time_ms)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&summary.global_summary)
        .bind(summary.global_risk_level.as_str())
        .bind(&summary.key_patterns)
        .bind(batch_stats.total_logs)
        .bind(batch_stats.critical_risk)
        .bind(batch_stats.error_risk)
        .bind(batch_stats.warning_risk)
        .bind(batch_stats.info_risk)
        .bind(batch_stats.safe_risk)
        .bind(batch_stats.unknown_risk)
        .bind(summary.processing_time_ms)
        .execute(&self.pool)
        .await?;
        Ok(row.last_insert_rowid())
    }

    /// Persists the batch's result rows under one transaction, then
    /// updates the in-memory snapshot via copy-on-write — the snapshot
    /// is only ever touched after the commit has succeeded.
    pub async fn save_analysis_result_batch(
        &self,
        items: &[AnalysisResultItem],
        batch_id: i64,
    ) -> Result<(), ServiceError> {
        let mut batch_stats = DashboardStats {
            total_logs: items.len() as i64,
            ..Default::default()
        };
        let mut fresh_alerts = Vec::new();
        let now = Utc::now();
        for item in items {
            match item.result.risk_level {
                RiskLevel::Critical => {
                    batch_stats.critical_risk += 1;
                    fresh_alerts.push(AlertInfo {
                        trace_id: item.trace_id.clone(),
                        summary: item.result.summary.clone(),
                        time: now.to_rfc3339(),
                    });
                }
                RiskLevel::Error => batch_stats.error_risk += 1,
                RiskLevel::Warning => batch_stats.warning_risk += 1,
                RiskLevel::Info => batch_stats.info_risk += 1,
                RiskLevel::Safe => batch_stats.safe_risk += 1,
                RiskLevel::Unknown => batch_stats.unknown_risk += 1,
            }
        }

        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query(
                "INSERT INTO analysis_results
                 (trace_id, batch_id, status, risk_level, summary, root_cause, solution, response_time_ms)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&item.trace_id)
            .bind(batch_id)
            .bind(item.status)
            .bind(item.result.risk_level.as_str())
            .bind(&item.result.summary)
            .bind(&item.result.root_cause)
            .bind(&item.result.solution)
            .bind(item.response_time_ms)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        let mut next = (*self.stats.load_full()).clone();
        next.total_logs += batch_stats.total_logs;
        next.critical_risk += batch_stats.critical_risk;
        next.error_risk += batch_stats.error_risk;
        next.warning_risk += batch_stats.warning_risk;
        next.info_risk += batch_stats.info_risk;
        next.safe_risk += batch_stats.safe_risk;
        next.unknown_risk += batch_stats.unknown_risk;
        if !fresh_alerts.is_empty() {
            fresh_alerts.extend(next.recent_alerts);
            fresh_alerts.truncate(5);
            next.recent_alerts = fresh_alerts;
        }
        self.stats.store(Arc::new(next));
        Ok(())
    }

    pub async fn query_struct_result_by_trace_id(
        &self,
        trace_id: &str,
    ) -> Result<Option<crate::types::LogAnalysisResult>, ServiceError> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT risk_level, root_cause, solution, summary FROM analysis_results WHERE trace_id = ?",
        )
        .bind(trace_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(risk, root_cause, solution, summary)| crate::types::LogAnalysisResult {
            summary,
            risk_level: risk.parse().unwrap_or(RiskLevel::Unknown),
            root_cause,
            solution,
        }))
    }

    pub async fn rebuild_stats_from_db(&self) -> Result<(), ServiceError> {
        let totals: (i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(total_logs),0), COALESCE(SUM(cnt_critical),0),
                    COALESCE(SUM(cnt_error),0), COALESCE(SUM(cnt_warning),0),
                    COALESCE(SUM(cnt_info),0), COALESCE(SUM(cnt_safe),0),
                    COALESCE(SUM(cnt_unknown),0)
             FROM batch_summaries",
        )
        .fetch_one(&self.pool)
        .await?;

        let alert_rows: Vec<(String, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT trace_id, summary, processed_at FROM analysis_results
             WHERE risk_level IN ('critical', 'high')
             ORDER BY id DESC LIMIT 5",
        )
        .fetch_all(&self.pool)
        .await?;

        let stats = DashboardStats {
            total_logs: totals.0,
            critical_risk: totals.1,
            error_risk: totals.2,
            warning_risk: totals.3,
            info_risk: totals.4,
            safe_risk: totals.5,
            unknown_risk: totals.6,
            current_qps: 0.0,
            backpressure: 0.0,
            recent_alerts: alert_rows
                .into_iter()
                .map(|(trace_id, summary, time)| AlertInfo {
                    trace_id,
                    summary: summary.unwrap_or_default(),
                    time: time.unwrap_or_default(),
                })
                .collect(),
        };
        self.stats.store(Arc::new(stats));
        Ok(())
    }

    pub async fn get_historical_logs(
        &self,
        page: i64,
        page_size: i64,
        level: &str,
        keyword: &str,
    ) -> Result<HistoryPage, ServiceError> {
        let page = page.max(1);
        let page_size = if page_size == 0 { 10 } else { page_size.clamp(1, 100) };

        let mut where_clause = String::from(" FROM analysis_results WHERE 1=1 ");
        let level_values = level_filter_values(level);
        let mut text_binds: Vec<String> = Vec::new();

        if !level.is_empty() {
            if level_values.is_empty() {
                where_clause.push_str(" AND LOWER(risk_level) = ? ");
                text_binds.push(level.to_lowercase());
            } else {
                let placeholders = level_values.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
                where_clause.push_str(&format!(" AND risk_level IN ({placeholders}) "));
                text_binds.extend(level_values.iter().map(|s| s.to_string()));
            }
        }
        if !keyword.is_empty() {
            where_clause.push_str(" AND (summary LIKE ? OR trace_id LIKE ?) ");
            let pattern = format!("%{keyword}%");
            text_binds.push(pattern.clone());
            text_binds.push(pattern);
        }

        let count_sql = format!("SELECT COUNT(*) {where_clause}");
        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
        for b in &text_binds {
            count_query = count_query.bind(b);
        }
        let (total_count,) = count_query.fetch_one(&self.pool).await?;

        let page_sql = format!(
            "SELECT trace_id, risk_level, summary, processed_at {where_clause} \
             ORDER BY processed_at DESC LIMIT ? OFFSET ?"
        );
        let mut page_query = sqlx::query_as::<_, (String, Option<String>, Option<String>, chrono::DateTime<Utc>)>(&page_sql);
        for b in &text_binds {
            page_query = page_query.bind(b);
        }
        let offset = ((page - 1) * page_size).max(0);
        page_query = page_query.bind(page_size).bind(offset);
        let rows = page_query.fetch_all(&self.pool).await?;

        let logs = rows
            .into_iter()
            .map(|(trace_id, risk, summary, processed_at)| HistoricalLogItem {
                trace_id,
                risk_level: risk.unwrap_or_default().parse().unwrap_or(RiskLevel::Unknown),
                summary: summary.unwrap_or_default(),
                processed_at,
            })
            .collect();

        Ok(HistoryPage { logs, total_count })
    }
}

pub fn log_unexpected_db_error(context: &str, err: &ServiceError) {
    warn!(%context, error = %err, "unexpected database error");
}
