//! HTTP API handlers for meetnote-server

pub mod analysis;
pub mod health;
pub mod hub;
pub mod meetings;

pub use analysis::analysis_routes;
pub use health::health_routes;
pub use hub::hub_routes;
pub use meetings::meeting_routes;
