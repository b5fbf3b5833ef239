//! Client-side query cache with request deduplication and invalidation.
//!
//! This module provides a resource-agnostic cache that:
//! - Serves values fetched within a freshness window without a round trip
//! - Shares one in-flight request between concurrent readers of a key
//! - Orders results by fetch sequence so a slow, older response never
//!   replaces newer data
//! - Notifies subscribers with a fresh snapshot on every change

mod layer;
mod observer;
mod traits;

pub use layer::QueryCache;
pub use observer::QueryObserver;
pub use traits::QueryKey;
#[cfg(test)]
pub use traits::QuerySnapshot;
