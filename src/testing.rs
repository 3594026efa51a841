//! An in-process fake standing in for a socket-bound test HTTP server, behind
//! the `HttpClient` seam.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Error;
use crate::http::{HttpClient, RawResponse};

#[derive(Clone)]
struct Fixture {
    status: u16,
    body: String,
}

/// A canned-response `HttpClient`. Register pages with `with_page`/
/// `with_status`, then hand an `Arc<dyn HttpClient>` wrapping it to
/// `Engine::start_with_http`.
#[derive(Default)]
pub struct StubHttpClient {
    fixtures: Mutex<HashMap<String, Fixture>>,
    calls: Mutex<Vec<String>>,
}

impl StubHttpClient {
    pub fn new() -> Self {
        StubHttpClient::default()
    }

    pub fn with_page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.with_status(url, 200, body)
    }

    pub fn with_status(self, url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        self.fixtures.lock().unwrap().insert(
            url.into(),
            Fixture {
                status,
                body: body.into(),
            },
        );
        self
    }

    /// Replaces the fixture for `url` in place (for scenarios that need the
    /// page's content to change between crawl ticks).
    pub fn set_page(&self, url: impl Into<String>, body: impl Into<String>) {
        let url = url.into();
        let mut fixtures = self.fixtures.lock().unwrap();
        let status = fixtures.get(&url).map(|f| f.status).unwrap_or(200);
        fixtures.insert(url, Fixture { status, body: body.into() });
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for StubHttpClient {
    async fn get(&self, url: &str) -> Result<RawResponse, Error> {
        self.calls.lock().unwrap().push(url.to_string());

        let fixture = self
            .fixtures
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("no stub fixture for {}", url)))?;

        Ok(RawResponse {
            url: url.to_string(),
            status: fixture.status,
            body: fixture.body,
        })
    }
}
