//! Scripted in-memory fetcher for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::Fetcher;
use crate::error::{Error, ErrorKind, Result};

type Script = VecDeque<std::result::Result<Value, ErrorKind>>;

/// Scripted fetcher for worker and scheduler tests.
///
/// Each id gets a queue of responses consumed in order; the final response
/// repeats forever (so "always fails" and "succeeds after two attempts"
/// are both one-liners to script). Unscripted ids behave like records the
/// upstream never had.
///
/// Locks are plain `std::sync`; nothing is held across an await point and
/// it keeps the builder methods callable from synchronous test setup.
///
/// # Examples
///
/// ```
/// use koyomi_fetch::{Fetcher, MockFetcher};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let fetcher = MockFetcher::default()
///     .with_record(42, json!({"mal_id": 42, "title": "Cowboy Bebop"}));
/// assert!(fetcher.fetch(42).await.is_ok());
/// assert!(fetcher.fetch(7).await.is_err());
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockFetcher {
    scripts: Mutex<HashMap<u64, Script>>,
    calls: Mutex<Vec<u64>>,
}

impl MockFetcher {
    /// Script a successful response for an id.
    pub fn with_record(self, id: u64, record: Value) -> Self {
        self.push(id, Ok(record));
        self
    }

    /// Script a failure for an id.
    pub fn with_failure(self, id: u64, kind: ErrorKind) -> Self {
        self.push(id, Err(kind));
        self
    }

    fn push(&self, id: u64, response: std::result::Result<Value, ErrorKind>) {
        // Panics on a poisoned lock are deliberate; this type only exists
        // for test setup.
        self.scripts.lock().unwrap().entry(id).or_default().push_back(response);
    }

    /// Ids fetched so far, in call order.
    pub fn calls(&self) -> Vec<u64> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, id: u64) -> Result<Value> {
        self.calls.lock().unwrap().push(id);
        let mut scripts = self.scripts.lock().unwrap();
        let Some(script) = scripts.get_mut(&id) else {
            return Err(Error::from(ErrorKind::Missing(id)));
        };
        let response = if script.len() > 1 {
            script.pop_front().unwrap_or(Err(ErrorKind::Missing(id)))
        } else {
            // The last scripted response repeats.
            script.front().cloned().unwrap_or(Err(ErrorKind::Missing(id)))
        };
        response.map_err(Error::from)
    }
}
