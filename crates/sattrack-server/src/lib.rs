//! Sattrack server: fleet refresh, proximity alerts and subscriber streaming.

pub mod api;
pub mod backoff;
pub mod config;
pub mod loops;
pub mod persistence;
pub mod state;
pub mod stream;
