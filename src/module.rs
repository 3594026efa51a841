use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Error;
use crate::http::HttpClient;
use crate::options::Options;
use crate::request::Request;
use crate::response::Response;

/// A single scraped record. Records are string-keyed maps or arbitrary
/// values, so `serde_json::Value` is the natural fit.
pub type Record = serde_json::Value;

/// What a module's `init` decided.
pub enum InitOutcome<S> {
    /// Start crawling immediately.
    Ready(S),
    /// Start crawling after `delay`.
    ReadyAfter(S, Duration),
    /// Don't create the Engine at all.
    Ignore,
    /// Fail startup with `reason`.
    Stop(String),
}

/// What a parse callback handed back for one top-level Request.
pub enum ParseOutcome {
    /// Terminal records for this seed.
    Data(Vec<Record>),
    /// Follow a single sub-Request; the Engine awaits it and recurses on the
    /// result.
    Follow(Box<Request<ParseOutcome>>),
    /// Follow several sub-Requests in order, concatenating their resolved
    /// records.
    FollowAll(Vec<Request<ParseOutcome>>),
    /// Ask the Engine to stop.
    Stop(String),
}

impl ParseOutcome {
    pub fn data(records: Vec<Record>) -> Self {
        ParseOutcome::Data(records)
    }
}

/// The capability record a caller plugs in to drive a crawl: `init` produces
/// shared state, `start_requests`/`make_request_url` pick which URLs to
/// fetch, `parse` turns a `Response` into `ParseOutcome`.
///
/// `parse` takes `&self` (not `&mut self`) because it runs concurrently, once
/// per in-flight top-level Request -- shared state lives behind `Arc`, not in
/// `&mut self`, so many Requests can be parsed at once without a lock around
/// the module itself.
#[async_trait]
pub trait SpiderModule: Send + Sync + 'static {
    type State: Send + Sync + Default + 'static;

    async fn init(&self, _options: &Options) -> InitOutcome<Self::State> {
        InitOutcome::Ready(Self::State::default())
    }

    /// Default: maps `make_request_url` over every seed.
    fn start_requests(&self, seeds: &[String], state: &Self::State) -> Vec<String> {
        seeds
            .iter()
            .map(|url| self.make_request_url(url, state))
            .collect()
    }

    /// Default: fetch the seed url unchanged.
    fn make_request_url(&self, url: &str, _state: &Self::State) -> String {
        url.to_string()
    }

    async fn parse(
        &self,
        response: Response,
        state: Arc<Self::State>,
        http: Arc<dyn HttpClient>,
    ) -> Result<ParseOutcome, Error>;
}
