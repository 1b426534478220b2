//! Dashboard statistics

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Aggregate view of the library
#[derive(Debug, Clone, Serialize)]
pub struct LibraryStats {
    pub total_items: i64,
    /// Items with any recorded usage
    pub played_items: i64,
    pub total_hours: f64,
    /// Average over played items only; 0 when nothing was played
    pub average_hours_per_played_item: f64,
    pub top_items: Vec<ItemSummary>,
    /// Largest playtime gains between consecutive imports of one item
    pub longest_sessions: Vec<SessionSummary>,
    pub recently_played: Vec<RecentlyPlayed>,
    /// Playtime gained by imports in the window, not lifetime totals
    pub minutes_last_7_days: i64,
    pub minutes_last_30_days: i64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemSummary {
    pub id: i64,
    pub name: String,
    pub icon_url: String,
    pub usage_hours: f64,
}

/// Playtime an item gained between two imports
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub item_id: i64,
    pub name: String,
    /// Minutes gained since the item's previous usage record
    pub usage_minutes: i64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentlyPlayed {
    pub item_id: i64,
    pub name: String,
    pub last_played: DateTime<Utc>,
}
