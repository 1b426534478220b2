//! HTTP API handlers for playlog-sync

pub mod auth;
pub mod health;
pub mod import_workflow;
pub mod library;
pub mod settings;

pub use auth::{AuthenticatedOwner, OWNER_HEADER};
pub use health::health_routes;
pub use import_workflow::import_routes;
pub use library::library_routes;
pub use settings::settings_routes;
