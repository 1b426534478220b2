//! Library views: paginated item list, item detail, dashboard statistics

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use playlog_common::{Error, Result};

use crate::db::{items, library};
use crate::models::{Item, LibraryStats, UsageRecord};

/// Entries in each dashboard ranking
pub const DASHBOARD_LIST_LIMIT: i64 = 5;

/// Usage records shown on the detail view
pub const DETAIL_HISTORY_LIMIT: i64 = 20;

/// One page of the item list
#[derive(Debug, Clone, Serialize)]
pub struct ItemPage {
    pub items: Vec<Item>,
    /// 1-based page actually served
    pub page: i64,
    pub page_size: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

/// An item with its derived display fields and recent history
#[derive(Debug, Clone, Serialize)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: Item,
    pub header_image_url: String,
    pub last_played: Option<DateTime<Utc>>,
    pub history: Vec<UsageRecord>,
}

/// Fetch page `page` (1-based) of items ordered by usage
///
/// Out-of-range pages are clamped to the first or last page.
pub async fn list_items(pool: &SqlitePool, page: i64, page_size: i64) -> Result<ItemPage> {
    if page_size <= 0 {
        return Err(Error::InvalidInput(format!("Invalid page size: {}", page_size)));
    }

    let total_items = library::count_items(pool).await?;
    let total_pages = ((total_items + page_size - 1) / page_size).max(1);
    let page = page.clamp(1, total_pages);

    let items = library::list_items(pool, (page - 1) * page_size, page_size).await?;

    Ok(ItemPage {
        items,
        page,
        page_size,
        total_items,
        total_pages,
    })
}

/// Load one item by row id with its newest usage records
pub async fn item_detail(pool: &SqlitePool, id: i64) -> Result<ItemDetail> {
    let item = items::get_item(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Item not found: {}", id)))?;

    let history = items::usage_history(pool, item.id, DETAIL_HISTORY_LIMIT).await?;

    Ok(ItemDetail {
        header_image_url: item.header_image_url(),
        last_played: item.last_played(),
        history,
        item,
    })
}

/// Aggregate statistics for the dashboard
pub async fn library_stats(pool: &SqlitePool, now: DateTime<Utc>) -> Result<LibraryStats> {
    let (total_items, played_items, total_hours) = library::usage_totals(pool).await?;

    let average_hours_per_played_item = if played_items > 0 {
        total_hours / played_items as f64
    } else {
        0.0
    };

    Ok(LibraryStats {
        total_items,
        played_items,
        total_hours,
        average_hours_per_played_item,
        top_items: library::top_items(pool, DASHBOARD_LIST_LIMIT).await?,
        longest_sessions: library::longest_sessions(pool, DASHBOARD_LIST_LIMIT).await?,
        recently_played: library::recently_played(pool, DASHBOARD_LIST_LIMIT).await?,
        minutes_last_7_days: library::minutes_recorded_since(pool, now, 7).await?,
        minutes_last_30_days: library::minutes_recorded_since(pool, now, 30).await?,
        generated_at: now,
    })
}
