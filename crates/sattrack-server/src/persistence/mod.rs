//! SQLite-backed alert log.

pub mod alerts;
pub mod db;

pub use db::{init_database, init_memory_database, Database};
