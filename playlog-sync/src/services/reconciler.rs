//! Batch reconciliation: per-record upsert plus usage append
//!
//! Records are processed independently in arrival order. A failing record
//! is counted and skipped; rows already written by earlier records stay.

use std::sync::Arc;

use playlog_common::{time, Result};

use crate::db::ItemRepository;
use crate::models::{Attributes, ItemDraft, ReconcileOutcome, UpsertOutcome};

pub struct Reconciler {
    items: Arc<dyn ItemRepository>,
}

impl Reconciler {
    pub fn new(items: Arc<dyn ItemRepository>) -> Self {
        Self { items }
    }

    /// Reconcile a merged batch
    ///
    /// `created` counts new items only; updates count toward neither field
    /// but still append a usage record.
    pub async fn reconcile(&self, records: &[Attributes]) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        for (index, record) in records.iter().enumerate() {
            match self.reconcile_one(record).await {
                Ok(upsert) if upsert.created => outcome.created += 1,
                Ok(_) => {}
                Err(e) => {
                    outcome.errors += 1;
                    tracing::warn!(
                        index,
                        external_id = ?crate::models::item::external_id(record),
                        error = %e,
                        "Failed to reconcile record"
                    );
                }
            }
        }

        tracing::info!(
            records = records.len(),
            created = outcome.created,
            errors = outcome.errors,
            "Reconciliation complete"
        );

        outcome
    }

    async fn reconcile_one(&self, record: &Attributes) -> Result<UpsertOutcome> {
        let draft = ItemDraft::from_record(record)?;
        let now = time::now();

        let upsert = self.items.upsert_item(&draft, now).await?;
        self.items
            .append_usage(upsert.item_id, draft.usage_minutes, now)
            .await?;

        Ok(upsert)
    }
}
