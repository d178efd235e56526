//! `run` command handler
//!
//! Wires the configuration, the stdio host bridge, the store and the
//! event stream into a [`Runtime`] and drives it until the host closes
//! stdin or a shutdown signal arrives.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cli::args::RunArgs;
use crate::config::{ConfigLoader, GameConfig};
use crate::error::AxethrowError;
use crate::host::{FileStore, GameContext, LineHost, MemoryStore, Store};
use crate::observability::EventEmitter;
use crate::runtime::Runtime;

/// Capacity of the channel between the stdin pump and the runtime.
const INBOUND_BUFFER: usize = 256;

/// Run the game.
///
/// # Errors
///
/// Returns an error if configuration loading fails, the event file cannot
/// be opened, the saved calibration cannot be read or the host bridge
/// fails while reading stdin.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), AxethrowError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let config = if let Some(ref path) = args.config {
        tracing::info!(config = %path.display(), "loading configuration");
        let load_result = ConfigLoader::with_defaults().load(path)?;

        for warning in &load_result.warnings {
            tracing::warn!(
                location = warning.location.as_deref().unwrap_or("<unknown>"),
                "{}",
                warning.message
            );
        }

        load_result.config
    } else {
        tracing::info!("no configuration given, using defaults");
        Arc::new(GameConfig::default())
    };

    let events = match args.events_file {
        Some(ref path) => EventEmitter::from_file(path)?,
        None => EventEmitter::stderr(),
    };

    let store: Arc<dyn Store> = match args.store {
        Some(ref path) => {
            tracing::info!(store = %path.display(), "using file store");
            Arc::new(FileStore::new(path))
        }
        None => {
            tracing::info!("no store given, state is kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let host = Arc::new(LineHost::stdout());
    let ctx = GameContext {
        config,
        console: Arc::clone(&host) as _,
        world: Arc::clone(&host) as _,
        store,
        events: Arc::new(events),
    };

    let runtime = Runtime::with_console_feed(ctx)?;
    runtime.initialize().await?;

    let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
    let pump = {
        let host = Arc::clone(&host);
        let cancel = cancel.clone();
        tokio::spawn(async move { host.pump(tokio::io::stdin(), tx, cancel).await })
    };

    runtime.run(rx, cancel.clone()).await;
    cancel.cancel();

    match pump.await {
        Ok(result) => result.map_err(AxethrowError::from),
        Err(e) => {
            tracing::error!(error = %e, "stdin pump task failed");
            Ok(())
        }
    }
}
