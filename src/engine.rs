use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_std::channel::{unbounded, Receiver, Sender};
use futures::future::{BoxFuture, Shared};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use log::{debug, error, info, warn};

use crate::data_table::DataTable;
use crate::error::Error;
use crate::export::{encode, ExportData, ExportFormat};
use crate::http::{HttpClient, SurfHttpClient};
use crate::module::{InitOutcome, ParseOutcome, Record, SpiderModule};
use crate::options::Options;
use crate::registry::{self, EngineHandle};
use crate::request::Request;
use crate::response::Response;

/// Messages the Engine's own task consumes off its command channel.
pub(crate) enum Command {
    Tick,
    Export {
        format: ExportFormat,
        override_refresh: bool,
        reply: futures::channel::oneshot::Sender<Result<ExportData, Error>>,
    },
    Stop {
        reason: String,
    },
}

/// Round-trips an export RPC through `cmd_tx`. Shared by `Engine::export`
/// and `EngineHandle::export` so a spider reachable only through
/// `registry::lookup` behaves identically to one held directly.
pub(crate) async fn send_export(
    cmd_tx: &Sender<Command>,
    format: ExportFormat,
    override_refresh: bool,
) -> Result<ExportData, Error> {
    let (reply_tx, reply_rx) = futures::channel::oneshot::channel();

    cmd_tx
        .send(Command::Export {
            format,
            override_refresh,
            reply: reply_tx,
        })
        .await
        .map_err(|_| Error::ChannelClosed)?;

    reply_rx.await.map_err(|_| Error::ChannelClosed)?
}

/// Round-trips a stop request through `cmd_tx`.
pub(crate) async fn send_stop(cmd_tx: &Sender<Command>, reason: String) -> Result<(), Error> {
    cmd_tx
        .send(Command::Stop { reason })
        .await
        .map_err(|_| Error::ChannelClosed)
}

type Completion = (String, Result<ParseOutcome, Error>);

/// One "resolve this completion all the way down" step: either terminal
/// records, or a request to stop the Engine.
enum MergeAction {
    Records(Vec<Record>),
    Stop(String),
}

/// A handle to a running Engine. Cheap to clone; every clone talks to the
/// same underlying actor task over its command channel.
pub struct Engine<M: SpiderModule> {
    cmd_tx: Sender<Command>,
    name: Option<String>,
    stop: Shared<BoxFuture<'static, String>>,
    _module: PhantomData<M>,
}

impl<M: SpiderModule> Clone for Engine<M> {
    fn clone(&self) -> Self {
        Engine {
            cmd_tx: self.cmd_tx.clone(),
            name: self.name.clone(),
            stop: self.stop.clone(),
            _module: PhantomData,
        }
    }
}

impl<M: SpiderModule> Engine<M> {
    /// Runs `module.init(&options)`, then -- unless it declines or asks to
    /// stop -- spawns the Engine's actor task and schedules the first tick.
    ///
    /// `Ok(None)` means the module's `init` returned `InitOutcome::Ignore`.
    pub async fn start(module: M, options: Options) -> Result<Option<Engine<M>>, Error> {
        Self::start_with_http(module, options, Arc::new(SurfHttpClient::new())).await
    }

    /// As `start`, but with an explicit `HttpClient` -- this is the seam
    /// tests use to substitute `crate::testing::StubHttpClient`.
    pub async fn start_with_http(
        module: M,
        options: Options,
        http: Arc<dyn HttpClient>,
    ) -> Result<Option<Engine<M>>, Error> {
        crate::enable_logging();

        let module = Arc::new(module);

        let init_outcome = match options.timeout() {
            Some(budget) => async_std::future::timeout(budget, module.init(&options))
                .await
                .map_err(|_| Error::InitStop("init exceeded configured timeout".into()))?,
            None => module.init(&options).await,
        };
        let (state, delay) = match init_outcome {
            InitOutcome::Ready(state) => (state, Duration::from_secs(0)),
            InitOutcome::ReadyAfter(state, delay) => (state, delay),
            InitOutcome::Ignore => {
                info!("module declined to start");
                return Ok(None);
            }
            InitOutcome::Stop(reason) => {
                error!("module init asked to stop: {}", reason);
                return Err(Error::InitStop(reason));
            }
        };

        let (cmd_tx, cmd_rx) = unbounded();
        let (stop_tx, stop_rx) = futures::channel::oneshot::channel::<String>();
        let name = options.name().map(str::to_string);

        let actor = EngineActor {
            module,
            http,
            state: Arc::new(state),
            data_table: DataTable::new(options.urls().to_vec()),
            interval: options.interval(),
            pending: FuturesUnordered::new(),
            cmd_rx,
            self_tx: cmd_tx.clone(),
            timer_generation: Arc::new(AtomicU64::new(0)),
            name: name.clone(),
            stop_tx: Some(stop_tx),
        };

        if let Some(name) = &name {
            registry::register(
                name.clone(),
                EngineHandle {
                    cmd_tx: cmd_tx.clone(),
                },
            );
        }

        let initial_tx = cmd_tx.clone();
        async_std::task::spawn(async move {
            async_std::task::sleep(delay).await;
            let _ = initial_tx.send(Command::Tick).await;
        });

        async_std::task::spawn(actor.run());

        let stop: BoxFuture<'static, String> = async move {
            stop_rx.await.unwrap_or_else(|_| "normal".to_string())
        }
        .boxed();

        Ok(Some(Engine {
            cmd_tx,
            name,
            stop: stop.shared(),
            _module: PhantomData,
        }))
    }

    /// Blocking export RPC: drains pending top-level Requests, then emits
    /// the merged DataTable in `format`.
    pub async fn export(&self, format: ExportFormat, override_refresh: bool) -> Result<ExportData, Error> {
        send_export(&self.cmd_tx, format, override_refresh).await
    }

    /// Asks the Engine to stop with `reason`, as if a parse callback had
    /// returned `ParseOutcome::Stop(reason)`.
    pub async fn stop(&self, reason: impl Into<String>) -> Result<(), Error> {
        send_stop(&self.cmd_tx, reason.into()).await
    }

    /// Waits for the Engine to stop, returning the reason it stopped with --
    /// `"normal"` for a clean shutdown (e.g. a completed partial export), or
    /// whatever reason a `ParseOutcome::Stop`/`Command::Stop` propagated.
    /// Resolves immediately, and repeatably, for every clone once the
    /// Engine has stopped.
    pub async fn join(&self) -> String {
        self.stop.clone().await
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

struct EngineActor<M: SpiderModule> {
    module: Arc<M>,
    http: Arc<dyn HttpClient>,
    state: Arc<M::State>,
    data_table: DataTable,
    interval: Option<Duration>,
    pending: FuturesUnordered<BoxFuture<'static, Completion>>,
    cmd_rx: Receiver<Command>,
    self_tx: Sender<Command>,
    timer_generation: Arc<AtomicU64>,
    name: Option<String>,
    stop_tx: Option<futures::channel::oneshot::Sender<String>>,
}

impl<M: SpiderModule> EngineActor<M> {
    /// Runs the command/completion loop until something asks the Engine to
    /// stop, then reports the stop reason to every `Engine::join` caller.
    async fn run(mut self) {
        let reason = loop {
            futures::select_biased! {
                cmd = self.cmd_rx.next().fuse() => {
                    match cmd {
                        None => {
                            debug!("command channel closed, stopping engine");
                            break "normal".to_string();
                        }
                        Some(Command::Tick) => self.start_crawl().await,
                        Some(Command::Stop { reason }) => break reason,
                        Some(Command::Export { format, override_refresh, reply }) => {
                            if let Some(reason) = self.handle_export(format, override_refresh, reply).await {
                                break reason;
                            }
                        }
                    }
                }
                completion = self.pending.select_next_some() => {
                    let (url, result) = completion;
                    match self.resolve_outcome(url.clone(), result).await {
                        MergeAction::Records(records) => {
                            self.data_table.set(&url, records);
                            if self.pending.is_empty() {
                                self.arm_timer();
                            }
                        }
                        MergeAction::Stop(reason) => break reason,
                    }
                }
            }
        };

        self.finish_stop(&reason);
        self.shutdown(reason);
    }

    fn shutdown(&mut self, reason: String) {
        if let Some(name) = &self.name {
            registry::unregister(name);
        }
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(reason);
        }
        debug!("engine actor shut down");
    }

    fn finish_stop(&self, reason: &str) {
        if reason == "normal" {
            info!("engine stopped normally");
        } else {
            warn!("engine stopped with reason: {}", reason);
        }
    }

    fn spawn_request(&self, url: String) -> BoxFuture<'static, Completion> {
        let module = self.module.clone();
        let state = self.state.clone();
        let http = self.http.clone();
        let callback_http = self.http.clone();
        let req_url = url.clone();

        let request: Request<ParseOutcome> = Request::spawn(http, url, move |response: Response| {
            let module = module.clone();
            let state = state.clone();
            let http = callback_http.clone();
            async move { module.parse(response, state, http).await }
        });

        Box::pin(async move {
            let result = request.await_timeout(None).await;
            (req_url, result)
        })
    }

    async fn start_crawl(&mut self) {
        let seeds = self.data_table.seeds().to_vec();
        let urls = self.module.start_requests(&seeds, &self.state);
        debug!("starting crawl tick over {} url(s)", urls.len());

        for url in urls {
            self.pending.push(self.spawn_request(url));
        }

        if self.pending.is_empty() {
            self.arm_timer();
        }
    }

    /// Recursively resolves a completion into terminal records, following
    /// any `Follow`/`FollowAll` sub-requests with an infinite await timeout,
    /// and pruning the seed on `NotFound`.
    fn resolve_outcome<'a>(
        &'a mut self,
        url: String,
        result: Result<ParseOutcome, Error>,
    ) -> Pin<Box<dyn Future<Output = MergeAction> + 'a>> {
        Box::pin(async move {
            match result {
                Err(Error::NotFound { url }) => {
                    warn!("pruning not-found seed {}", url);
                    self.data_table.prune(&url);
                    MergeAction::Records(vec![])
                }
                Err(other) => {
                    warn!("request for {} failed: {}", url, other);
                    MergeAction::Records(vec![])
                }
                Ok(ParseOutcome::Data(records)) => MergeAction::Records(records),
                Ok(ParseOutcome::Stop(reason)) => MergeAction::Stop(reason),
                Ok(ParseOutcome::Follow(request)) => {
                    let inner = request.await_timeout(None).await;
                    self.resolve_outcome(url, inner).await
                }
                Ok(ParseOutcome::FollowAll(requests)) => {
                    let mut all = Vec::new();
                    for request in requests {
                        let inner = request.await_timeout(None).await;
                        match self.resolve_outcome(url.clone(), inner).await {
                            MergeAction::Records(mut records) => all.append(&mut records),
                            MergeAction::Stop(reason) => return MergeAction::Stop(reason),
                        }
                    }
                    MergeAction::Records(all)
                }
            }
        })
    }

    /// Export RPC. Returns `Some(reason)` when the Engine should stop after
    /// replying.
    ///
    /// Every drain here mirrors a "pending became empty" transition that,
    /// outside of `export`, is handled by the completion branch of `run`
    /// (which re-arms the interval timer). Since `export` drains pending
    /// Requests itself rather than going through that branch, it has to
    /// re-arm the timer at the same points, or an Engine whose last
    /// in-flight Request happens to be drained by `export` -- or whose
    /// override-refresh path always drains this way -- would silently stop
    /// re-crawling.
    async fn handle_export(
        &mut self,
        format: ExportFormat,
        override_refresh: bool,
        reply: futures::channel::oneshot::Sender<Result<ExportData, Error>>,
    ) -> Option<String> {
        let had_pending = !self.pending.is_empty();
        let mut stop_reason = self.drain_pending().await;
        if had_pending && stop_reason.is_none() {
            self.arm_timer();
        }

        if override_refresh && format.is_raw() && stop_reason.is_none() {
            self.timer_generation.fetch_add(1, Ordering::SeqCst);
            self.start_crawl().await;
            stop_reason = self.drain_pending().await;
            if stop_reason.is_none() {
                self.arm_timer();
            }
        }

        let (records, complete) = self.data_table.export();
        let encoded = encode(&format, records);

        let final_stop = stop_reason.or_else(|| {
            if complete {
                None
            } else {
                info!("export served partial data, engine stopping");
                Some("normal".to_string())
            }
        });

        let _ = reply.send(encoded);
        final_stop
    }

    /// Drains every pending top-level Request, merging each completion.
    /// Returns `Some(reason)` if a drained completion asked to stop.
    async fn drain_pending(&mut self) -> Option<String> {
        while let Some((url, result)) = self.pending.next().await {
            match self.resolve_outcome(url.clone(), result).await {
                MergeAction::Records(records) => self.data_table.set(&url, records),
                MergeAction::Stop(reason) => return Some(reason),
            }
        }
        None
    }

    fn arm_timer(&mut self) {
        let interval = match self.interval {
            Some(i) => i,
            None => return,
        };

        let generation = self.timer_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation_ref = self.timer_generation.clone();
        let tx = self.self_tx.clone();

        async_std::task::spawn(async move {
            async_std::task::sleep(interval).await;
            if generation_ref.load(Ordering::SeqCst) == generation {
                let _ = tx.send(Command::Tick).await;
            }
        });
    }
}
