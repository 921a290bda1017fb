//! Market discovery engine: derives momentum, trend, relative-strength, anomaly and
//! pump/dump signals for a crypto asset universe, persists them into a SQLite
//! snapshot and serves ranked read-only views over it.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod latency;
pub mod run_state;
pub mod signals;
pub mod source;
pub mod types;

pub use engine::DiscoveryEngine;
pub use error::{AppError, Result};
