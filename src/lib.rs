//! A generic spider runtime: a single-owner Engine that dispatches concurrent
//! HTTP fetches, lets parse callbacks spawn and synchronously await further
//! sub-requests, merges results into a keyed, seed-ordered table with
//! replace-on-refresh semantics, and serves on-demand exports alongside
//! periodic re-crawls.
//!
//! ```no_run
//! use async_trait::async_trait;
//! use scrapex_engine::{Engine, Error, HttpClient, Options, ParseOutcome, Response, SpiderModule};
//! use std::sync::Arc;
//!
//! struct TitleScraper;
//!
//! #[async_trait]
//! impl SpiderModule for TitleScraper {
//!     type State = ();
//!
//!     async fn parse(
//!         &self,
//!         response: Response,
//!         _state: Arc<()>,
//!         _http: Arc<dyn HttpClient>,
//!     ) -> Result<ParseOutcome, Error> {
//!         Ok(ParseOutcome::data(vec![serde_json::json!(response.body)]))
//!     }
//! }
//!
//! #[async_std::main]
//! async fn main() -> Result<(), Error> {
//!     let opts = Options::new().with_urls(vec!["https://www.rust-lang.org/"]);
//!     let engine = Engine::start(TitleScraper, opts).await?.expect("module did not decline to start");
//!     let data = engine.export(scrapex_engine::ExportFormat::Raw, false).await?;
//!     println!("{:?}", data);
//!     Ok(())
//! }
//! ```

mod data_table;
pub mod error;
pub mod export;
mod engine;
pub mod http;
pub mod module;
pub mod options;
pub mod registry;
pub mod request;
pub mod response;
pub mod selector;
pub mod testing;
pub mod webscraper;

#[cfg(feature = "debug")]
pub(crate) fn enable_logging() {
    femme::with_level(femme::LevelFilter::Info);
}

#[cfg(not(feature = "debug"))]
pub(crate) fn enable_logging() {}

pub use engine::Engine;
pub use error::{Error, Result};
pub use export::{encode, ExportData, ExportFormat};
pub use http::{HttpClient, RawResponse, SurfHttpClient};
pub use module::{InitOutcome, ParseOutcome, Record, SpiderModule};
pub use options::Options;
pub use registry::{lookup, EngineHandle};
pub use request::Request;
pub use response::Response;
pub use selector::Selector;
