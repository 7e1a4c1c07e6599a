//! Sattrack sources - position providers and the fleet data source adapter.
//!
//! Providers fetch raw position records; the adapter normalizes them,
//! de-duplicates by id and falls back to the synthetic fleet when nothing
//! usable comes back.

pub mod adapter;
pub mod feed;
pub mod n2yo;
pub mod normalize;
pub mod provider;

pub use adapter::{BatchOrigin, DataSourceAdapter, FleetBatch, FleetSource, ProviderFailure};
pub use feed::JsonFeedProvider;
pub use n2yo::{N2yoClient, N2yoProvider, PositionSample, TleRecord};
pub use normalize::{merge_first_seen, normalize};
pub use provider::{PositionProvider, ProviderError, RawPosition};
