use std::convert::TryInto;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};

use crate::error::Error;

const TOTAL_TIMEOUT: Duration = Duration::from_secs(30);
const BODY_TIMEOUT: Duration = Duration::from_secs(15);

/// The raw shape of a completed HTTP GET, before the 200/404/other-status
/// split the Engine performs on it.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// The pluggable transport capability `Request` dispatches through.
///
/// Swappable so tests can drive the Engine without a socket (see
/// `crate::testing::StubHttpClient`).
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse, Error>;
}

/// `surf`-backed default client: follow-redirects, 30s total timeout, 15s
/// body-read timeout.
pub struct SurfHttpClient {
    client: surf::Client,
}

impl SurfHttpClient {
    pub fn new() -> Self {
        let config = surf::Config::new().set_timeout(Some(TOTAL_TIMEOUT));
        let client: surf::Client = config
            .try_into()
            .expect("surf client config is always valid");
        let client = client.with(surf::middleware::Redirect::default());
        SurfHttpClient { client }
    }
}

impl Default for SurfHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for SurfHttpClient {
    async fn get(&self, url: &str) -> Result<RawResponse, Error> {
        debug!("fetching {}", url);

        let mut response = self
            .client
            .get(url)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status: u16 = response.status().into();

        let body = async_std::future::timeout(BODY_TIMEOUT, response.body_string())
            .await
            .map_err(|_| Error::Transport(format!("body read of {} timed out", url)))?
            .map_err(|e| Error::Transport(e.to_string()))?;

        if body.is_empty() {
            warn!("body length is 0 for {}", url);
        }

        // `response.url()` is the post-redirect URL; `Response.url` is
        // documented as the final URL, not the one originally requested.
        Ok(RawResponse {
            url: response.url().to_string(),
            status,
            body,
        })
    }
}
