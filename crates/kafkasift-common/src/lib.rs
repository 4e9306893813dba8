//! Common types and utilities shared across kafkasift components.

pub mod error;
pub mod types;

pub use error::{Error, Result};

/// Re-export commonly used external types
pub use chrono::{DateTime, Utc};
