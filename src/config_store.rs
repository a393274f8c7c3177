//! Immutable `SystemConfig` snapshot (C1), atomically swapped on update.
//!
//! Prompt ids are exposed to the API in one flat namespace: Reduce prompt
//! ids are offset by [`REDUCE_OFFSET`] so a caller never needs to know
//! which internal list an id came from. Grounded on
//! `PromptIdHelper.h`/`SystemConfig.h`.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::error::ServiceError;
use crate::types::{AlertChannel, AllSettings, AppConfig, PromptConfig, PromptType, SystemConfig};

/// Offset added to reduce-prompt internal ids to place them in the flat
/// external id space alongside map-prompt ids.
pub const REDUCE_OFFSET: i64 = 100_000_000;

pub fn to_external_id(internal_id: i64, is_reduce: bool) -> i64 {
    if is_reduce {
        internal_id + REDUCE_OFFSET
    } else {
        internal_id
    }
}

pub fn parse_external_id(external_id: i64) -> (i64, bool) {
    if external_id >= REDUCE_OFFSET {
        (external_id - REDUCE_OFFSET, true)
    } else {
        (external_id, false)
    }
}

fn resolve_active_prompt(prompts: &[PromptConfig], target_id: i64) -> String {
    if let Some(p) = prompts.iter().find(|p| p.id == target_id) {
        return p.content.clone();
    }
    prompts
        .iter()
        .find(|p| p.is_active)
        .map(|p| p.content.clone())
        .unwrap_or_default()
}

fn build_snapshot(
    app_config: AppConfig,
    map_prompts: Vec<PromptConfig>,
    reduce_prompts: Vec<PromptConfig>,
    channels: Vec<AlertChannel>,
) -> SystemConfig {
    let active_map_prompt = resolve_active_prompt(&map_prompts, app_config.active_map_prompt_id);
    let active_reduce_prompt =
        resolve_active_prompt(&reduce_prompts, app_config.active_reduce_prompt_id);
    SystemConfig {
        app_config,
        map_prompts,
        reduce_prompts,
        channels,
        active_map_prompt,
        active_reduce_prompt,
    }
}

/// Holds the current `Arc<SystemConfig>` and guards mutation so updates
/// are mutually exclusive while reads never block.
pub struct ConfigStore {
    current: ArcSwap<SystemConfig>,
    write_lock: Mutex<()>,
    pool: SqlitePool,
}

impl ConfigStore {
    /// Loads the current rows from SQLite and builds the first snapshot.
    pub async fn load(pool: SqlitePool) -> Result<Self, ServiceError> {
        let (app_config, map_prompts, reduce_prompts, channels) = Self::read_all(&pool).await?;
        let snapshot = build_snapshot(app_config, map_prompts, reduce_prompts, channels);
        Ok(Self {
            current: ArcSwap::from_pointee(snapshot),
            write_lock: Mutex::new(()),
            pool,
        })
    }

    /// Lock-free read of the current snapshot.
    pub fn get_snapshot(&self) -> Arc<SystemConfig> {
        self.current.load_full()
    }

    pub fn get_all_settings(&self) -> AllSettings {
        let snap = self.get_snapshot();
        let mut prompts: Vec<PromptConfig> = snap
            .map_prompts
            .iter()
            .cloned()
            .map(|mut p| {
                p.id = to_external_id(p.id, false);
                p
            })
            .collect();
        prompts.extend(snap.reduce_prompts.iter().cloned().map(|mut p| {
            p.id = to_external_id(p.id, true);
            p
        }));
        AllSettings {
            config: snap.app_config.clone(),
            prompts,
            channels: snap.channels.clone(),
        }
    }

    async fn read_all(
        pool: &SqlitePool,
    ) -> Result<(AppConfig, Vec<PromptConfig>, Vec<PromptConfig>, Vec<AlertChannel>), ServiceError>
    {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM app_config")
            .fetch_all(pool)
            .await?;
        let kv: HashMap<String, String> = rows.into_iter().collect();
        let app_config = AppConfig {
            ai_provider: kv
                .get("ai_provider")
                .cloned()
                .unwrap_or_else(|| "openai".to_string()),
            ai_model: kv
                .get("ai_model")
                .cloned()
                .unwrap_or_else(|| "gpt-4-turbo".to_string()),
            ai_api_key: kv.get("ai_api_key").cloned().unwrap_or_default(),
            ai_language: kv
                .get("ai_language")
                .cloned()
                .unwrap_or_else(|| "English".to_string()),
            kernel_worker_threads: kv
                .get("kernel_worker_threads")
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            kernel_max_batch: kv
                .get("kernel_max_batch")
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            kernel_refresh_interval: kv
                .get("kernel_refresh_interval")
                .and_then(|v| v.parse().ok())
                .unwrap_or(200),
            kernel_io_buffer: kv
                .get("kernel_io_buffer")
                .cloned()
                .unwrap_or_else(|| "256MB".to_string()),
            kernel_adaptive_mode: kv
                .get("kernel_adaptive_mode")
                .map(|v| v == "1" || v == "true")
                .unwrap_or(true),
            active_map_prompt_id: kv
                .get("active_map_prompt_id")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            active_reduce_prompt_id: kv
                .get("active_reduce_prompt_id")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        };

        let map_prompts: Vec<(i64, String, String, bool)> = sqlx::query_as(
            "SELECT id, name, content, is_active FROM map_prompts ORDER BY id",
        )
        .fetch_all(pool)
        .await?;
        let map_prompts = map_prompts
            .into_iter()
            .map(|(id, name, content, is_active)| PromptConfig {
                id,
                name,
                content,
                is_active,
                prompt_type: PromptType::Map,
            })
            .collect();

        let reduce_prompts: Vec<(i64, String, String, bool)> = sqlx::query_as(
            "SELECT id, name, content, is_active FROM reduce_prompts ORDER BY id",
        )
        .fetch_all(pool)
        .await?;
        let reduce_prompts = reduce_prompts
            .into_iter()
            .map(|(id, name, content, is_active)| PromptConfig {
                id,
                name,
                content,
                is_active,
                prompt_type: PromptType::Reduce,
            })
            .collect();

        let channels: Vec<(i64, String, String, String, String, String, bool)> = sqlx::query_as(
            "SELECT id, name, provider, webhook_url, alert_threshold, msg_template, is_active FROM alert_channels ORDER BY id",
        )
        .fetch_all(pool)
        .await?;
        let channels = channels
            .into_iter()
            .map(|(id, name, provider, webhook_url, alert_threshold, msg_template, is_active)| AlertChannel {
                id,
                name,
                provider,
                webhook_url,
                alert_threshold,
                msg_template,
                is_active,
            })
            .collect();

        Ok((app_config, map_prompts, reduce_prompts, channels))
    }

    async fn reload(&self) -> Result<(), ServiceError> {
        let (app_config, map_prompts, reduce_prompts, channels) = Self::read_all(&self.pool).await?;
        let snapshot = build_snapshot(app_config, map_prompts, reduce_prompts, channels);
        self.current.store(Arc::new(snapshot));
        Ok(())
    }

    /// Flattens an incoming `{"items": [{"key","value"}, ...]}` payload into
    /// `app_config` key/value rows, matching `ConfigHandler::handleUpdateAppConfig`'s
    /// string/bool/number/null/complex coercion rules exactly.
    pub async fn update_app_config(&self, items: &[Value]) -> Result<(), ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        for item in items {
            let (Some(key), Some(value)) = (
                item.get("key").and_then(Value::as_str),
                item.get("value"),
            ) else {
                continue;
            };
            let value_str = match value {
                Value::String(s) => s.clone(),
                Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
                Value::Number(n) => {
                    if n.is_f64() && n.as_i64().is_none() {
                        n.as_f64().unwrap_or_default().to_string()
                    } else {
                        n.to_string()
                    }
                }
                Value::Null => String::new(),
                other => other.to_string(),
            };
            sqlx::query(
                "INSERT INTO app_config (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(key)
            .bind(value_str)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        self.reload().await
    }

    /// Upsert-and-prune: `id > 0` updates an existing row, `id <= 0` inserts
    /// a new one; afterwards any row in the table not named by the accepted
    /// list is deleted. Map and Reduce prompts are routed by `prompt_type`,
    /// not by id magnitude, so a Reduce prompt can be created at `id <= 0`.
    pub async fn update_prompts(&self, prompts: &[PromptConfig]) -> Result<(), ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let mut map_ids: Vec<i64> = Vec::new();
        let mut reduce_ids: Vec<i64> = Vec::new();
        for p in prompts {
            let is_reduce = p.prompt_type == PromptType::Reduce;
            let table = if is_reduce { "reduce_prompts" } else { "map_prompts" };
            let internal_id = if is_reduce { p.id - REDUCE_OFFSET } else { p.id };
            let kept_id = if internal_id > 0 {
                sqlx::query(&format!(
                    "UPDATE {table} SET name = ?, content = ?, is_active = ? WHERE id = ?"
                ))
                .bind(&p.name)
                .bind(&p.content)
                .bind(p.is_active)
                .bind(internal_id)
                .execute(&mut *tx)
                .await?;
                internal_id
            } else {
                let row = sqlx::query(&format!(
                    "INSERT INTO {table} (name, content, is_active) VALUES (?, ?, ?)"
                ))
                .bind(&p.name)
                .bind(&p.content)
                .bind(p.is_active)
                .execute(&mut *tx)
                .await?;
                row.last_insert_rowid()
            };
            if is_reduce {
                reduce_ids.push(kept_id);
            } else {
                map_ids.push(kept_id);
            }
        }

        if map_ids.is_empty() {
            sqlx::query("DELETE FROM map_prompts").execute(&mut *tx).await?;
        } else {
            let placeholders = map_ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let mut q = sqlx::query(&format!("DELETE FROM map_prompts WHERE id NOT IN ({placeholders})"));
            for id in &map_ids {
                q = q.bind(id);
            }
            q.execute(&mut *tx).await?;
        }
        if reduce_ids.is_empty() {
            sqlx::query("DELETE FROM reduce_prompts").execute(&mut *tx).await?;
        } else {
            let placeholders = reduce_ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let mut q = sqlx::query(&format!("DELETE FROM reduce_prompts WHERE id NOT IN ({placeholders})"));
            for id in &reduce_ids {
                q = q.bind(id);
            }
            q.execute(&mut *tx).await?;
        }

        tx.commit().await?;
        self.reload().await
    }

    /// Same upsert-and-prune policy as `update_prompts`, over a single table.
    pub async fn update_channels(&self, channels: &[AlertChannel]) -> Result<(), ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let mut kept_ids: Vec<i64> = Vec::new();
        for c in channels {
            let kept_id = if c.id > 0 {
                sqlx::query(
                    "UPDATE alert_channels SET name = ?, provider = ?, webhook_url = ?, alert_threshold = ?, msg_template = ?, is_active = ?
                     WHERE id = ?",
                )
                .bind(&c.name)
                .bind(&c.provider)
                .bind(&c.webhook_url)
                .bind(&c.alert_threshold)
                .bind(&c.msg_template)
                .bind(c.is_active)
                .bind(c.id)
                .execute(&mut *tx)
                .await?;
                c.id
            } else {
                let row = sqlx::query(
                    "INSERT INTO alert_channels (name, provider, webhook_url, alert_threshold, msg_template, is_active)
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(&c.name)
                .bind(&c.provider)
                .bind(&c.webhook_url)
                .bind(&c.alert_threshold)
                .bind(&c.msg_template)
                .bind(c.is_active)
                .execute(&mut *tx)
                .await?;
                row.last_insert_rowid()
            };
            kept_ids.push(kept_id);
        }

        if kept_ids.is_empty() {
            sqlx::query("DELETE FROM alert_channels").execute(&mut *tx).await?;
        } else {
            let placeholders = kept_ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let mut q = sqlx::query(&format!("DELETE FROM alert_channels WHERE id NOT IN ({placeholders})"));
            for id in &kept_ids {
                q = q.bind(id);
            }
            q.execute(&mut *tx).await?;
        }

        tx.commit().await?;
        self.reload().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(id: i64, active: bool) -> PromptConfig {
        PromptConfig {
            id,
            name: "n".to_string(),
            content: format!("content-{id}"),
            is_active: active,
            prompt_type: PromptType::Map,
        }
    }

    #[test]
    fn resolve_active_prompt_prefers_exact_id_match() {
        let prompts = vec![prompt(1, false), prompt(2, true)];
        assert_eq!(resolve_active_prompt(&prompts, 1), "content-1");
    }

    #[test]
    fn resolve_active_prompt_falls_back_to_first_active() {
        let prompts = vec![prompt(1, false), prompt(2, true)];
        assert_eq!(resolve_active_prompt(&prompts, 999), "content-2");
    }

    #[test]
    fn resolve_active_prompt_empty_when_nothing_matches() {
        let prompts = vec![prompt(1, false)];
        assert_eq!(resolve_active_prompt(&prompts, 999), "");
    }

    #[test]
    fn to_external_id_offsets_reduce_prompts_only() {
        assert_eq!(to_external_id(5, false), 5);
        assert_eq!(to_external_id(5, true), 100_000_005);
    }

    #[test]
    fn parse_external_id_round_trips() {
        assert_eq!(parse_external_id(5), (5, false));
        assert_eq!(parse_external_id(100_000_005), (5, true));
    }

    #[test]
    fn parse_external_id_boundary_is_reduce() {
        assert_eq!(parse_external_id(100_000_000), (0, true));
        assert_eq!(parse_external_id(99_999_999), (99_999_999, false));
    }
}
