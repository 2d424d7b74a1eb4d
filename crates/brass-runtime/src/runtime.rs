//! Runtime orchestration around the [`Dispatcher`].
//!
//! The runtime loads configuration, initializes logging, builds the
//! dispatcher and keeps a background sweeper evicting expired abuse
//! counters and bans.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use brass_runtime::BrassRuntime;
//!
//! let runtime = BrassRuntime::builder()
//!     .config_file("config/brass.toml")
//!     .registry(registry)
//!     .senders(senders)
//!     .build()?;
//!
//! runtime.start().await;
//! // For every incoming message:
//! runtime.handle(session);
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{BrassConfig, ConfigLoader, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use brass_core::BoxedSession;
use brass_framework::{
    DispatchReport, Dispatcher, MemorySenderPolicy, ModuleRegistry, Sanction, SenderPolicy,
};

/// A running sweeper task and the token that stops it.
struct Sweeper {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// The Brass runtime.
///
/// Cheap to share: wrap it in an `Arc` and call [`handle`](Self::handle)
/// from every transport task.
pub struct BrassRuntime {
    config: BrassConfig,
    dispatcher: Arc<Dispatcher>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl BrassRuntime {
    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &BrassConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Dispatches one message on the current task.
    pub async fn dispatch(&self, session: BoxedSession) -> DispatchReport {
        self.dispatcher.dispatch(session).await
    }

    /// Dispatches one message on a new task.
    ///
    /// Messages from different senders proceed concurrently; the
    /// dispatcher's per-sender lock rejects overlapping commands from the
    /// same sender.
    pub fn handle(&self, session: BoxedSession) -> JoinHandle<DispatchReport> {
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move { dispatcher.dispatch(session).await })
    }

    /// Returns whether the sweeper is running.
    pub async fn is_running(&self) -> bool {
        self.sweeper.lock().await.is_some()
    }

    /// Starts the background sweeper.
    pub async fn start(&self) {
        let mut sweeper = self.sweeper.lock().await;
        if sweeper.is_some() {
            warn!("Runtime is already running");
            return;
        }

        let token = CancellationToken::new();
        let period = self.config.dispatch.sweep_interval();
        let dispatcher = Arc::clone(&self.dispatcher);
        let cancelled = token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        dispatcher.sweep(Instant::now());
                    }
                }
            }
            debug!("Sweeper stopped");
        });

        *sweeper = Some(Sweeper { token, task });
        info!(interval = ?period, "Runtime started");
    }

    /// Stops the background sweeper and waits for it to exit.
    pub async fn shutdown(&self) {
        let Some(Sweeper { token, task }) = self.sweeper.lock().await.take() else {
            warn!("Runtime is not running");
            return;
        };

        token.cancel();
        if let Err(e) = task.await {
            error!(error = %e, "Sweeper task failed");
        }
        info!("Runtime stopped");
    }

    /// Starts, waits for `shutdown` to resolve, then stops.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: std::future::Future<Output = ()>,
    {
        self.start().await;
        shutdown.await;
        self.shutdown().await;
    }

    /// Runs until Ctrl+C (or SIGTERM on unix) is received.
    pub async fn run(&self) {
        self.run_until(wait_for_signal()).await;
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

impl std::fmt::Debug for BrassRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrassRuntime")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for [`BrassRuntime`].
///
/// A module registry is required. The sender policy defaults to an empty
/// [`MemorySenderPolicy`] and the sanction sink to the dispatcher's
/// logging sink.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<BrassConfig>,
    registry: Option<Arc<dyn ModuleRegistry>>,
    senders: Option<Arc<dyn SenderPolicy>>,
    sanction: Option<Arc<dyn Sanction>>,
    init_logging: bool,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            config: None,
            registry: None,
            senders: None,
            sanction: None,
            init_logging: true,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration below files and environment variables.
    pub fn merge(mut self, config: BrassConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses `config` as-is, skipping file and environment loading.
    pub fn config(mut self, config: BrassConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn registry(mut self, registry: Arc<dyn ModuleRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn senders(mut self, senders: Arc<dyn SenderPolicy>) -> Self {
        self.senders = Some(senders);
        self
    }

    pub fn sanction(mut self, sanction: Arc<dyn Sanction>) -> Self {
        self.sanction = Some(sanction);
        self
    }

    /// Leaves the global tracing subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> RuntimeResult<BrassRuntime> {
        let registry = self.registry.ok_or(RuntimeError::MissingRegistry)?;

        let config = match self.config {
            Some(config) => {
                validate_config(&config)?;
                config
            }
            None => self.config_loader.load()?,
        };

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let senders = self
            .senders
            .unwrap_or_else(|| Arc::new(MemorySenderPolicy::new()));
        let mut dispatcher =
            Dispatcher::with_settings(registry, senders, config.dispatch_settings());
        if let Some(sanction) = self.sanction {
            dispatcher = dispatcher.sanction(sanction);
        }

        info!(
            log_level = %config.logging.level,
            prefixes = ?config.dispatch.prefixes,
            max_chained = config.dispatch.max_chained,
            "Runtime initialized from configuration"
        );

        Ok(BrassRuntime {
            config,
            dispatcher: Arc::new(dispatcher),
            sweeper: Mutex::new(None),
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
