//! Item and usage record database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use playlog_common::{time, Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::db::ItemRepository;
use crate::models::{Attributes, Item, ItemDraft, UpsertOutcome, UsageRecord};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// SQLite-backed [`ItemRepository`]
#[derive(Clone)]
pub struct SqliteItemRepository {
    pool: SqlitePool,
}

impl SqliteItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemRepository for SqliteItemRepository {
    async fn upsert_item(&self, draft: &ItemDraft, at: DateTime<Utc>) -> Result<UpsertOutcome> {
        upsert_item(&self.pool, draft, at).await
    }

    async fn append_usage(
        &self,
        item_id: i64,
        usage_minutes: i64,
        at: DateTime<Utc>,
    ) -> Result<UsageRecord> {
        append_usage(&self.pool, item_id, usage_minutes, at).await
    }
}

/// Insert or fully replace an item keyed by external id
///
/// A single statement keeps concurrent upserts of the same id from
/// producing duplicates; the last writer's fields win. Each call binds a
/// fresh token that only an insert stores, so `created` does not depend on
/// timestamps.
pub async fn upsert_item(
    pool: &SqlitePool,
    draft: &ItemDraft,
    at: DateTime<Utc>,
) -> Result<UpsertOutcome> {
    let raw_attributes = serde_json::to_string(&draft.raw_attributes)
        .map_err(|e| Error::Internal(format!("Failed to serialize raw attributes: {}", e)))?;
    let timestamp = time::to_db(&at);
    let insert_token = Uuid::new_v4().to_string();

    retry_on_lock("upsert_item", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let row = sqlx::query(
            r#"
            INSERT INTO items (
                external_id, name, icon_url, usage_hours, raw_attributes, insert_token,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(external_id) DO UPDATE SET
                name = excluded.name,
                icon_url = excluded.icon_url,
                usage_hours = excluded.usage_hours,
                raw_attributes = excluded.raw_attributes,
                updated_at = excluded.updated_at
            RETURNING id, insert_token
            "#,
        )
        .bind(&draft.external_id)
        .bind(&draft.name)
        .bind(&draft.icon_url)
        .bind(draft.usage_hours)
        .bind(&raw_attributes)
        .bind(&insert_token)
        .bind(&timestamp)
        .bind(&timestamp)
        .fetch_one(pool)
        .await?;

        let item_id: i64 = row.get("id");
        let stored_token: String = row.get("insert_token");

        Ok::<_, Error>(UpsertOutcome {
            item_id,
            created: stored_token == insert_token,
        })
    })
    .await
}

/// Append a usage record for an item
pub async fn append_usage(
    pool: &SqlitePool,
    item_id: i64,
    usage_minutes: i64,
    at: DateTime<Utc>,
) -> Result<UsageRecord> {
    let timestamp = time::to_db(&at);

    let id = retry_on_lock("append_usage", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let result = sqlx::query(
            "INSERT INTO usage_records (item_id, usage_minutes, created_at) VALUES (?, ?, ?)",
        )
        .bind(item_id)
        .bind(usage_minutes)
        .bind(&timestamp)
        .execute(pool)
        .await?;
        Ok::<_, Error>(result.last_insert_rowid())
    })
    .await?;

    Ok(UsageRecord {
        id,
        item_id,
        usage_minutes,
        created_at: at,
    })
}

/// Load item by external identifier
pub async fn get_item_by_external_id(pool: &SqlitePool, external_id: &str) -> Result<Option<Item>> {
    let row = sqlx::query(
        r#"
        SELECT id, external_id, name, icon_url, usage_hours, raw_attributes, created_at, updated_at
        FROM items
        WHERE external_id = ?
        "#,
    )
    .bind(external_id)
    .fetch_optional(pool)
    .await?;

    row.map(|row| item_from_row(&row)).transpose()
}

/// Load item by row id
pub async fn get_item(pool: &SqlitePool, id: i64) -> Result<Option<Item>> {
    let row = sqlx::query(
        r#"
        SELECT id, external_id, name, icon_url, usage_hours, raw_attributes, created_at, updated_at
        FROM items
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(|row| item_from_row(&row)).transpose()
}

/// Usage history of an item, newest first
pub async fn usage_history(pool: &SqlitePool, item_id: i64, limit: i64) -> Result<Vec<UsageRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, item_id, usage_minutes, created_at
        FROM usage_records
        WHERE item_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(item_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let created_at: String = row.get("created_at");
            Ok(UsageRecord {
                id: row.get("id"),
                item_id: row.get("item_id"),
                usage_minutes: row.get("usage_minutes"),
                created_at: time::from_db(&created_at)?,
            })
        })
        .collect()
}

pub(crate) fn item_from_row(row: &SqliteRow) -> Result<Item> {
    let raw: String = row.get("raw_attributes");
    let raw_attributes: Attributes = serde_json::from_str(&raw)
        .map_err(|e| Error::Internal(format!("Failed to deserialize raw attributes: {}", e)))?;
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Item {
        id: row.get("id"),
        external_id: row.get("external_id"),
        name: row.get("name"),
        icon_url: row.get("icon_url"),
        usage_hours: row.get("usage_hours"),
        raw_attributes,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn draft(value: serde_json::Value) -> ItemDraft {
        ItemDraft::from_record(value.as_object().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let pool = playlog_common::db::init_memory_database().await.unwrap();
        let t0 = Utc::now();

        let first = upsert_item(&pool, &draft(json!({"appid": 440, "name": "TF2", "playtime_forever": 60})), t0)
            .await
            .unwrap();
        assert!(first.created);

        let second = upsert_item(
            &pool,
            &draft(json!({"appid": 440, "name": "Team Fortress 2", "playtime_forever": 120})),
            t0 + Duration::seconds(5),
        )
        .await
        .unwrap();
        assert!(!second.created);
        assert_eq!(first.item_id, second.item_id);

        let item = get_item_by_external_id(&pool, "440").await.unwrap().unwrap();
        assert_eq!(item.name, "Team Fortress 2");
        assert!((item.usage_hours - 2.0).abs() < f64::EPSILON);
        assert_eq!(item.created_at.timestamp_micros(), t0.timestamp_micros());
    }

    #[tokio::test]
    async fn test_update_at_same_instant_is_not_created() {
        let pool = playlog_common::db::init_memory_database().await.unwrap();
        let at = Utc::now();
        let record = draft(json!({"appid": 730, "playtime_forever": 5}));

        let first = upsert_item(&pool, &record, at).await.unwrap();
        let second = upsert_item(&pool, &record, at).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.item_id, second.item_id);
    }

    #[tokio::test]
    async fn test_update_replaces_raw_attributes() {
        let pool = playlog_common::db::init_memory_database().await.unwrap();
        let t0 = Utc::now();

        upsert_item(&pool, &draft(json!({"appid": 1, "metacritic": {"score": 90}})), t0)
            .await
            .unwrap();
        upsert_item(&pool, &draft(json!({"appid": 1})), t0 + Duration::seconds(1))
            .await
            .unwrap();

        let item = get_item_by_external_id(&pool, "1").await.unwrap().unwrap();
        assert!(!item.raw_attributes.contains_key("metacritic"));
    }

    #[tokio::test]
    async fn test_usage_history_newest_first() {
        let pool = playlog_common::db::init_memory_database().await.unwrap();
        let t0 = Utc::now();
        let outcome = upsert_item(&pool, &draft(json!({"appid": 7})), t0).await.unwrap();

        append_usage(&pool, outcome.item_id, 10, t0).await.unwrap();
        append_usage(&pool, outcome.item_id, 25, t0 + Duration::minutes(1)).await.unwrap();

        let history = usage_history(&pool, outcome.item_id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].usage_minutes, 25);
        assert_eq!(history[1].usage_minutes, 10);
    }

    #[tokio::test]
    async fn test_append_usage_for_unknown_item_fails() {
        let pool = playlog_common::db::init_memory_database().await.unwrap();
        assert!(append_usage(&pool, 999, 5, Utc::now()).await.is_err());
    }
}
