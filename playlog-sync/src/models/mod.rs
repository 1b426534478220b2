//! Data models for playlog-sync

pub mod import_job;
pub mod item;
pub mod stats;

pub use import_job::{ImportJob, ImportSummary, JobStatus, ReconcileOutcome, IMPORT_JOB_KIND};
pub use item::{Attributes, Item, ItemDraft, UpsertOutcome, UsageRecord};
pub use stats::{ItemSummary, LibraryStats, RecentlyPlayed, SessionSummary};
