//! Upstream fetch collaborator.
//!
//! The scraper behind this interface is slow, unreliable and throttled, so
//! the crate's whole job is to make calling it survivable: a trait seam the
//! workers depend on, an HTTP implementation with a hard time bound, a
//! process-wide limiter spacing requests out, and a scripted mock (behind
//! the `mock` feature) so the rest of the pipeline can be tested without a
//! network.

pub mod error;
mod http;
mod limit;
#[cfg(feature = "mock")]
mod mock;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub use crate::http::HttpFetcher;
pub use crate::limit::Limiter;
#[cfg(feature = "mock")]
pub use crate::mock::MockFetcher;
use crate::error::Result;

pub type FetcherHandle = Arc<dyn Fetcher + Send + Sync>;

/// The upstream fetch seam.
///
/// Returns the raw, un-canonicalized record for an id. Callers own
/// canonicalization and persistence; implementations own transport
/// concerns and error classification.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, id: u64) -> Result<Value>;
}
