//! Sattrack SDK - dashboard client library
//!
//! [`DashboardClient`] wraps the REST endpoints and the push stream;
//! [`LiveFeed`] keeps a local [`DashboardView`] current over whichever
//! transport is available.

pub mod client;
pub mod error;
pub mod live;
pub mod view;

pub use client::{DashboardClient, EventStream};
pub use error::SdkError;
pub use live::{ConnectionStatus, LiveFeed, LiveFeedConfig};
pub use view::DashboardView;
