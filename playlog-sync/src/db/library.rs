//! Read-only library queries backing the list, detail and dashboard views

use chrono::{DateTime, Duration, Utc};
use playlog_common::{time, Result};
use sqlx::{Row, SqlitePool};

use crate::db::items::item_from_row;
use crate::models::{Item, ItemSummary, RecentlyPlayed, SessionSummary};

/// Items ordered by usage, most used first
pub async fn list_items(pool: &SqlitePool, offset: i64, limit: i64) -> Result<Vec<Item>> {
    let rows = sqlx::query(
        r#"
        SELECT id, external_id, name, icon_url, usage_hours, raw_attributes, created_at, updated_at
        FROM items
        ORDER BY usage_hours DESC, name ASC, id ASC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(item_from_row).collect()
}

pub async fn count_items(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// (total items, played items, total hours)
pub async fn usage_totals(pool: &SqlitePool) -> Result<(i64, i64, f64)> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS total,
               COALESCE(SUM(CASE WHEN usage_hours > 0 THEN 1 ELSE 0 END), 0) AS played,
               COALESCE(SUM(usage_hours), 0.0) AS hours
        FROM items
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok((row.get("total"), row.get("played"), row.get("hours")))
}

pub async fn top_items(pool: &SqlitePool, limit: i64) -> Result<Vec<ItemSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, icon_url, usage_hours
        FROM items
        WHERE usage_hours > 0
        ORDER BY usage_hours DESC, id ASC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ItemSummary {
            id: row.get("id"),
            name: row.get("name"),
            icon_url: row.get("icon_url"),
            usage_hours: row.get("usage_hours"),
        })
        .collect())
}

/// Per-item playtime gained between consecutive usage records
///
/// Records hold cumulative totals, so each record's gain is its value minus
/// the previous record of the same item. An item's first record is only a
/// baseline and has no gain.
const USAGE_GAINS_CTE: &str = r#"
    WITH gains AS (
        SELECT item_id,
               created_at,
               usage_minutes - LAG(usage_minutes) OVER (
                   PARTITION BY item_id ORDER BY created_at, id
               ) AS gained_minutes
        FROM usage_records
    )
"#;

/// Largest playtime gains between two imports
pub async fn longest_sessions(pool: &SqlitePool, limit: i64) -> Result<Vec<SessionSummary>> {
    let rows = sqlx::query(&format!(
        r#"
        {}
        SELECT g.item_id, i.name, g.gained_minutes, g.created_at
        FROM gains g
        JOIN items i ON i.id = g.item_id
        WHERE g.gained_minutes > 0
        ORDER BY g.gained_minutes DESC, g.created_at DESC
        LIMIT ?
        "#,
        USAGE_GAINS_CTE
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let created_at: String = row.get("created_at");
            Ok(SessionSummary {
                item_id: row.get("item_id"),
                name: row.get("name"),
                usage_minutes: row.get("gained_minutes"),
                recorded_at: time::from_db(&created_at)?,
            })
        })
        .collect()
}

/// Items ordered by the catalog's last-played timestamp
pub async fn recently_played(pool: &SqlitePool, limit: i64) -> Result<Vec<RecentlyPlayed>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, CAST(json_extract(raw_attributes, '$.rtime_last_played') AS INTEGER) AS last_played
        FROM items
        WHERE CAST(json_extract(raw_attributes, '$.rtime_last_played') AS INTEGER) > 0
        ORDER BY last_played DESC, id ASC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            let seconds: i64 = row.get("last_played");
            time::from_epoch_seconds(seconds).map(|last_played| RecentlyPlayed {
                item_id: row.get("id"),
                name: row.get("name"),
                last_played,
            })
        })
        .collect())
}

/// Playtime gained by records created during the last `days` days
///
/// Decreases (a reset upstream) count as zero.
pub async fn minutes_recorded_since(pool: &SqlitePool, now: DateTime<Utc>, days: i64) -> Result<i64> {
    let since = time::to_db(&(now - Duration::days(days)));
    let minutes: i64 = sqlx::query_scalar(&format!(
        r#"
        {}
        SELECT COALESCE(SUM(gained_minutes), 0)
        FROM gains
        WHERE gained_minutes > 0 AND created_at >= ?
        "#,
        USAGE_GAINS_CTE
    ))
    .bind(since)
    .fetch_one(pool)
    .await?;
    Ok(minutes)
}
