//! # MeetNote Common Library
//!
//! Shared code for the MeetNote service crates:
//! - Realtime event vocabulary (`HubEvent`, `JobPhase`) and result payloads
//! - Error type
//! - Configuration loading and root folder resolution
//! - Server-Sent Events helpers
//! - Text preview helpers

pub mod config;
pub mod error;
pub mod events;
pub mod sse;
pub mod text;

pub use error::{Error, Result};
pub use events::{HubEvent, JobPhase};
