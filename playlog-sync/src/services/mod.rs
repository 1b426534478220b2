//! Import pipeline services
//!
//! Leaves first: HTTP clients and the rate limiter, then the fetch/merge
//! stage, reconciliation, and the job manager that ties them to the task
//! executor.

pub mod catalog_client;
pub mod detail_client;
pub mod fetch_merger;
pub mod http_client;
pub mod job_manager;
pub mod library;
pub mod rate_limiter;
pub mod reconciler;

pub use catalog_client::{CatalogSource, SteamCatalogClient};
pub use detail_client::{DetailSource, StoreDetailClient};
pub use fetch_merger::FetchMerger;
pub use http_client::ClientError;
pub use job_manager::{JobManager, JobStatusReport};
pub use rate_limiter::RateLimiter;
pub use reconciler::Reconciler;
