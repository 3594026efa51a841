use std::collections::HashMap;
use std::sync::RwLock;

use async_std::channel::Sender;
use once_cell::sync::Lazy;

use crate::engine::{self, Command};
use crate::error::Error;
use crate::export::{ExportData, ExportFormat};

/// A lightweight, type-erased handle on a running Engine's command channel.
/// Cloning it is cheap; it outlives the `Engine<M>` value that created it.
///
/// Unlike `Engine<M>`, a `EngineHandle` has forgotten which `SpiderModule`
/// is driving the spider -- that's the point of looking one up by name
/// instead of holding onto the typed handle -- so it only exposes the
/// module-agnostic operations: `export` and `stop`.
#[derive(Clone)]
pub struct EngineHandle {
    pub(crate) cmd_tx: Sender<Command>,
}

impl EngineHandle {
    /// As `Engine::export`, round-tripped through the same command channel.
    pub async fn export(&self, format: ExportFormat, override_refresh: bool) -> Result<ExportData, Error> {
        engine::send_export(&self.cmd_tx, format, override_refresh).await
    }

    /// As `Engine::stop`.
    pub async fn stop(&self, reason: impl Into<String>) -> Result<(), Error> {
        engine::send_stop(&self.cmd_tx, reason.into()).await
    }
}

static REGISTRY: Lazy<RwLock<HashMap<String, EngineHandle>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

pub(crate) fn register(name: String, handle: EngineHandle) {
    REGISTRY
        .write()
        .expect("registry lock poisoned")
        .insert(name, handle);
}

pub(crate) fn unregister(name: &str) {
    REGISTRY.write().expect("registry lock poisoned").remove(name);
}

/// Looks up a running Engine previously started with `Options::with_name`.
pub fn lookup(name: &str) -> Option<EngineHandle> {
    REGISTRY
        .read()
        .expect("registry lock poisoned")
        .get(name)
        .cloned()
}
