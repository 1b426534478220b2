//! Catalog + detail fetch and merge
//!
//! Detail calls are the throttled resource, so only records with nonzero
//! usage get one. Calls are issued one after another in catalog order.

use std::sync::Arc;

use crate::models::item::{self, Attributes};
use crate::services::catalog_client::CatalogSource;
use crate::services::detail_client::DetailSource;

/// Produces merged records for one import run
pub struct FetchMerger {
    catalog: Arc<dyn CatalogSource>,
    detail: Arc<dyn DetailSource>,
}

impl FetchMerger {
    pub fn new(catalog: Arc<dyn CatalogSource>, detail: Arc<dyn DetailSource>) -> Self {
        Self { catalog, detail }
    }

    /// Fetch owned items and merge store details over the played ones
    ///
    /// Returns an empty batch without any detail call when the catalog
    /// returns nothing.
    pub async fn import(&self, user_id: &str, api_key: &str) -> Vec<Attributes> {
        let base_records = self.catalog.fetch_owned_items(user_id, api_key).await;
        if base_records.is_empty() {
            tracing::warn!(user_id = %user_id, "Catalog returned no items");
            return Vec::new();
        }

        let total = base_records.len();
        let mut merged = Vec::with_capacity(total);
        let mut detail_calls = 0usize;
        let mut detail_misses = 0usize;

        for mut record in base_records {
            if !item::has_usage(&record) {
                merged.push(record);
                continue;
            }

            let Some(item_id) = item::external_id(&record) else {
                // Reconciliation will count it as malformed
                merged.push(record);
                continue;
            };

            detail_calls += 1;
            let detail = self.detail.fetch_detail(&item_id).await;
            if detail.is_empty() {
                detail_misses += 1;
            }

            // Shallow merge, detail keys win
            for (key, value) in detail {
                record.insert(key, value);
            }
            merged.push(record);
        }

        tracing::info!(
            total,
            detail_calls,
            detail_misses,
            "Merged catalog records with store details"
        );

        merged
    }
}
