//! Offline-first request interception engine
//!
//! Sits between a page and the network: classifies each request, resolves it
//! network-first or cache-first against two versioned cache namespaces,
//! records slow and failed requests, and serves an offline page for failed
//! navigations. Storage and network access go through the [`CacheStorage`],
//! [`Fetcher`] and [`DiagnosticsStore`] traits so the engine can run in any
//! host.

pub mod cache;
pub mod diagnostics;
pub mod error;
pub mod network;
pub mod offline;
pub mod request;
pub mod router;

mod control;
mod lifecycle;
mod strategy;
mod worker;

#[cfg(test)]
mod testing;

pub use cache::{CacheKey, CacheStorage, CachedResponse, MemoryCacheStorage};
pub use diagnostics::{DiagnosticsDrain, DiagnosticsSink, DiagnosticsStore, MemoryDiagnosticsStore};
pub use error::{CacheError, DiagnosticsError, FetchError, WorkerError};
pub use lifecycle::LifecycleState;
pub use network::Fetcher;
pub use request::{RequestMode, ResponseSource, WorkerRequest, WorkerResponse};
pub use worker::{FetchOutcome, ServiceWorker};
