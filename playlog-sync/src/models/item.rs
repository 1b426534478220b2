//! Library items and their usage history
//!
//! Records coming from the catalog are kept as untyped JSON objects. Only a
//! fixed set of keys is ever read (see [`keys`]); everything else is passed
//! through verbatim into `raw_attributes`.

use chrono::{DateTime, Utc};
use playlog_common::{Error, Result};
use serde::Serialize;
use serde_json::Value;

/// Untyped attribute mapping, insertion ordered
pub type Attributes = serde_json::Map<String, Value>;

/// Keys read from catalog/store records
pub mod keys {
    pub const EXTERNAL_ID: &str = "appid";
    pub const NAME: &str = "name";
    pub const USAGE_MINUTES: &str = "playtime_forever";
    pub const ICON_HASH: &str = "img_icon_url";
    pub const LAST_PLAYED: &str = "rtime_last_played";
}

/// Name stored when the record carries none
pub const UNKNOWN_NAME: &str = "Unknown Game";

pub const ICON_BASE_URL: &str = "https://media.steampowered.com/steamcommunity/public/images/apps/";
pub const HEADER_IMAGE_BASE_URL: &str = "https://cdn.cloudflare.steamstatic.com/steam/apps/";

/// Stable external identifier of a record, if it has a usable one
///
/// The catalog reports numeric ids; string ids are accepted when non-blank.
pub fn external_id(record: &Attributes) -> Option<String> {
    match record.get(keys::EXTERNAL_ID)? {
        Value::Number(n) if n.is_u64() => n.as_u64().map(|id| id.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Cumulative usage in whole minutes
///
/// Missing or null means zero. Anything that is not a non-negative whole
/// number is malformed.
pub fn usage_minutes(record: &Attributes) -> Result<i64> {
    match record.get(keys::USAGE_MINUTES) {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => {
            if let Some(minutes) = n.as_i64() {
                if minutes >= 0 {
                    return Ok(minutes);
                }
            } else if let Some(minutes) = n.as_f64() {
                if minutes >= 0.0 && minutes.fract() == 0.0 && minutes <= i64::MAX as f64 {
                    return Ok(minutes as i64);
                }
            }
            Err(Error::InvalidInput(format!("invalid usage value: {}", n)))
        }
        Some(other) => Err(Error::InvalidInput(format!("invalid usage value: {}", other))),
    }
}

/// True when the record reports usage worth a detail lookup
pub fn has_usage(record: &Attributes) -> bool {
    matches!(usage_minutes(record), Ok(minutes) if minutes > 0)
}

/// Last time the item was used, from the catalog's epoch-seconds field
pub fn last_played(record: &Attributes) -> Option<DateTime<Utc>> {
    record
        .get(keys::LAST_PLAYED)
        .and_then(Value::as_i64)
        .and_then(playlog_common::time::from_epoch_seconds)
}

/// Minutes to hours, the unit persisted on the item row
pub fn minutes_to_hours(minutes: i64) -> f64 {
    minutes as f64 / 60.0
}

/// Fields derived from one merged record, ready to upsert
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDraft {
    pub external_id: String,
    pub name: String,
    pub icon_url: String,
    pub usage_minutes: i64,
    pub usage_hours: f64,
    pub raw_attributes: Attributes,
}

impl ItemDraft {
    /// Derive item fields from a merged record
    pub fn from_record(record: &Attributes) -> Result<Self> {
        let external_id = external_id(record).ok_or_else(|| {
            Error::InvalidInput(format!(
                "record has no usable '{}' field",
                keys::EXTERNAL_ID
            ))
        })?;

        let name = record
            .get(keys::NAME)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_NAME)
            .to_string();

        let usage_minutes = usage_minutes(record)?;

        let icon_url = match record.get(keys::ICON_HASH).and_then(Value::as_str) {
            Some(hash) if !hash.is_empty() => {
                format!("{}{}/{}.jpg", ICON_BASE_URL, external_id, hash)
            }
            _ => String::new(),
        };

        Ok(Self {
            external_id,
            name,
            icon_url,
            usage_minutes,
            usage_hours: minutes_to_hours(usage_minutes),
            raw_attributes: record.clone(),
        })
    }
}

/// Current state of one catalog entry
#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: i64,
    pub external_id: String,
    pub name: String,
    pub icon_url: String,
    pub usage_hours: f64,
    pub raw_attributes: Attributes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn header_image_url(&self) -> String {
        format!("{}{}/header.jpg", HEADER_IMAGE_BASE_URL, self.external_id)
    }

    pub fn last_played(&self) -> Option<DateTime<Utc>> {
        last_played(&self.raw_attributes)
    }
}

/// One immutable usage observation
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UsageRecord {
    pub id: i64,
    pub item_id: i64,
    pub usage_minutes: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of an item upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub item_id: i64,
    pub created: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_draft_from_full_record() {
        let draft = ItemDraft::from_record(&record(json!({
            "appid": 570,
            "name": "Dota 2",
            "playtime_forever": 90,
            "img_icon_url": "0bbb630d63262dd66d2fdd0f7d37e8661a410075",
        })))
        .unwrap();

        assert_eq!(draft.external_id, "570");
        assert_eq!(draft.name, "Dota 2");
        assert_eq!(draft.usage_minutes, 90);
        assert!((draft.usage_hours - 1.5).abs() < f64::EPSILON);
        assert_eq!(
            draft.icon_url,
            format!("{}570/0bbb630d63262dd66d2fdd0f7d37e8661a410075.jpg", ICON_BASE_URL)
        );
        assert_eq!(draft.raw_attributes.len(), 4);
    }

    #[test]
    fn test_draft_defaults_name_and_icon() {
        let draft = ItemDraft::from_record(&record(json!({ "appid": 10 }))).unwrap();
        assert_eq!(draft.name, UNKNOWN_NAME);
        assert_eq!(draft.icon_url, "");
        assert_eq!(draft.usage_minutes, 0);

        let draft =
            ItemDraft::from_record(&record(json!({ "appid": 10, "img_icon_url": "" }))).unwrap();
        assert_eq!(draft.icon_url, "");
    }

    #[test]
    fn test_draft_rejects_missing_or_bad_id() {
        assert!(ItemDraft::from_record(&record(json!({ "name": "x" }))).is_err());
        assert!(ItemDraft::from_record(&record(json!({ "appid": -3 }))).is_err());
        assert!(ItemDraft::from_record(&record(json!({ "appid": "  " }))).is_err());
        assert!(ItemDraft::from_record(&record(json!({ "appid": [1] }))).is_err());
    }

    #[test]
    fn test_draft_rejects_bad_usage() {
        assert!(ItemDraft::from_record(&record(json!({ "appid": 1, "playtime_forever": "lots" })))
            .is_err());
        assert!(ItemDraft::from_record(&record(json!({ "appid": 1, "playtime_forever": -1 })))
            .is_err());
        assert!(ItemDraft::from_record(&record(json!({ "appid": 1, "playtime_forever": 1.5 })))
            .is_err());
    }

    #[test]
    fn test_has_usage() {
        assert!(has_usage(&record(json!({ "playtime_forever": 1 }))));
        assert!(!has_usage(&record(json!({ "playtime_forever": 0 }))));
        assert!(!has_usage(&record(json!({}))));
        assert!(!has_usage(&record(json!({ "playtime_forever": "bad" }))));
    }

    #[test]
    fn test_last_played_and_header_url() {
        let item = Item {
            id: 1,
            external_id: "620".to_string(),
            name: "Portal 2".to_string(),
            icon_url: String::new(),
            usage_hours: 0.0,
            raw_attributes: record(json!({ "rtime_last_played": 1_700_000_000 })),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(item.last_played().unwrap().timestamp(), 1_700_000_000);
        assert_eq!(item.header_image_url(), format!("{}620/header.jpg", HEADER_IMAGE_BASE_URL));
    }
}
