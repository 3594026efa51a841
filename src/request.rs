use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_std::task::JoinHandle;

use crate::error::Error;
use crate::http::HttpClient;
use crate::response::Response;

/// Default `await` timeout when the caller doesn't ask for one explicitly.
pub const DEFAULT_AWAIT_TIMEOUT: Duration = Duration::from_secs(5);

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// A handle to an in-flight single-URL fetch plus user callback.
///
/// Exactly one owner may await it: the `JoinHandle` inside is move-only, so
/// Rust's ownership rules enforce the "only the owner awaits" invariant for
/// free, no runtime bookkeeping required.
pub struct Request<T> {
    id: u64,
    url: String,
    handle: JoinHandle<Result<T, Error>>,
}

impl<T: Send + 'static> Request<T> {
    /// Spawns a task that performs `GET url` and, on a 200 response, hands
    /// the resulting `Response` to `callback`. A 404 becomes
    /// `Error::NotFound`, any other non-200 status or transport failure
    /// becomes `Error::Transport`.
    pub fn spawn<F, Fut>(http: Arc<dyn HttpClient>, url: impl Into<String>, callback: F) -> Self
    where
        F: FnOnce(Response) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let url = url.into();
        let id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        let fetch_url = url.clone();

        let handle = async_std::task::spawn(async move {
            let raw = http.get(&fetch_url).await?;

            match raw.status {
                200 => callback(Response::new(raw.url, raw.body)).await,
                404 => Err(Error::NotFound { url: raw.url }),
                other => Err(Error::Transport(format!(
                    "unexpected status {} from {}",
                    other, raw.url
                ))),
            }
        });

        Request { id, url, handle }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Awaits with the default 5s timeout.
    pub async fn await_result(self) -> Result<T, Error> {
        self.await_timeout(Some(DEFAULT_AWAIT_TIMEOUT)).await
    }

    /// Awaits with an explicit timeout, or infinitely when `None`.
    pub async fn await_timeout(self, timeout: Option<Duration>) -> Result<T, Error> {
        let url = self.url.clone();
        let handle = self.handle;

        match timeout {
            None => handle.await,
            Some(duration) => async_std::future::timeout(duration, handle)
                .await
                .map_err(|_| Error::Timeout { url })?,
        }
    }
}
