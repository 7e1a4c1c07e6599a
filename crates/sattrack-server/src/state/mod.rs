//! In-memory server state.

pub mod fleet;
pub mod store;

pub use fleet::{FleetSnapshot, FleetStore};
pub use store::{AppState, SourceStatus, Subscription};
