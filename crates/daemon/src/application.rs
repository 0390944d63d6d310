// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application shell: composes the components, owns the daemon's own
//! shutdown consumer, and drives the startup and shutdown sequences.
//!
//! Startup failures are the only fatal errors in the daemon; everything
//! after the run loop starts is logged and survived.

use crate::consumers::{ConsumerTable, ConsumerTarget};
use crate::env;
use crate::jobs::JobManager;
use crate::legacy::LegacyAppHandler;
use crate::listener::{ListenCtx, Listener};
use crate::luc_starter::LucStarter;
use crate::monitor::TargetStartupMonitor;
use crate::proxies::{
    LifecycleControlProxy, ManagerProxy, NsmConsumerProxy, ProxyError, RemoteLifecycleControl,
    RemoteManager, RemoteNsmConsumer,
};
use crate::registry::LucRegistry;
use fs2::FileExt;
use nsc_core::{ErrorStatus, LucType, ShutdownMode};
use nsc_storage::LucStore;
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;

/// Shutdown mode of the daemon's own consumer.
const OWN_SHUTDOWN_MODE: ShutdownMode = ShutdownMode::NORMAL;
/// Timeout of the daemon's own consumer.
const OWN_TIMEOUT_MS: u32 = 1000;

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket on which the controller interface is offered.
    pub socket_path: PathBuf,
    /// Path to the lock/PID file.
    pub lock_path: PathBuf,
    /// Socket of the service supervisor.
    pub manager_socket: PathBuf,
    /// Socket of the node state manager.
    pub nsm_socket: PathBuf,
    /// Default path of the last user context file.
    pub luc_path: PathBuf,
    /// Application types restored first.
    pub prioritised_luc_types: Vec<LucType>,
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Self {
        Self {
            socket_path: env::controller_socket_path(),
            lock_path: env::lock_path(),
            manager_socket: env::manager_socket_path(),
            nsm_socket: env::nsm_socket_path(),
            luc_path: env::default_luc_path(),
            prioritised_luc_types: env::prioritised_luc_types(),
        }
    }
}

/// Startup errors. These exit the process; nothing mid-run does.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to create the runtime directory {0}: {1}")]
    RuntimeDir(PathBuf, std::io::Error),

    #[error("failed to acquire the daemon lock at {0}: another instance running?")]
    Lock(PathBuf),

    #[error("failed to bind the controller socket at {0}: {1}")]
    Bind(PathBuf, std::io::Error),

    #[error("failed to subscribe to supervisor job events: {0}")]
    Subscribe(ProxyError),

    #[error("failed to install the signal handler: {0}")]
    Signal(std::io::Error),
}

/// The four-step shutdown sequence, shared by the SIGTERM path and the
/// daemon's own lifecycle requests. A flag guards against re-entry.
pub struct ShutdownFlow {
    luc_starter: Arc<LucStarter>,
    legacy: Arc<LegacyAppHandler>,
    nsm: Arc<dyn NsmConsumerProxy>,
    own_object_path: String,
    shutdown: CancellationToken,
    in_progress: AtomicBool,
}

impl ShutdownFlow {
    pub fn new(
        luc_starter: Arc<LucStarter>,
        legacy: Arc<LegacyAppHandler>,
        nsm: Arc<dyn NsmConsumerProxy>,
        own_object_path: String,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            luc_starter,
            legacy,
            nsm,
            own_object_path,
            shutdown,
            in_progress: AtomicBool::new(false),
        })
    }

    /// Token cancelled once the daemon's own client is unregistered.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// SIGTERM path: run all four steps, then release the run loop.
    pub async fn initiate(&self) {
        if self.in_progress.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("shutting down");
        self.luc_starter.cancel();
        self.legacy.deregister_consumers().await;
        self.unregister_own_client().await;
    }

    /// Lifecycle-request path: cancel and deregister synchronously, reply
    /// `Ok` to the node state manager, and unregister the daemon's own
    /// client in the background.
    pub async fn handle_lifecycle_request(self: &Arc<Self>, mode: ShutdownMode) -> ErrorStatus {
        if self.in_progress.swap(true, Ordering::SeqCst) {
            return ErrorStatus::Ok;
        }
        tracing::info!(mode = %mode, "lifecycle request for the controller itself");
        self.luc_starter.cancel();
        self.legacy.deregister_consumers().await;

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.unregister_own_client().await;
        });
        ErrorStatus::Ok
    }

    async fn unregister_own_client(&self) {
        match self
            .nsm
            .unregister_shutdown_client(env::BUS_NAME, &self.own_object_path, OWN_SHUTDOWN_MODE)
            .await
        {
            Err(error) => {
                tracing::error!(error = %error, "failed to unregister the controller's own shutdown consumer");
            }
            Ok(status) if status != ErrorStatus::Ok => {
                tracing::error!(status = %status, "failed to unregister the controller's own shutdown consumer");
            }
            Ok(_) => {
                tracing::info!("unregistered the controller's own shutdown consumer");
            }
        }
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application").finish_non_exhaustive()
    }
}

/// The composed daemon.
pub struct Application {
    config: Config,
    // NOTE(lifetime): held to keep the exclusive lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    manager: Arc<dyn ManagerProxy>,
    shutdown_flow: Arc<ShutdownFlow>,
    listener: Option<Listener>,
    luc_starter: Arc<LucStarter>,
}

impl Application {
    /// Bring the daemon up: claim the socket, subscribe to the supervisor,
    /// compose the components, and register the daemon's own shutdown
    /// consumer. Errors here are fatal.
    pub async fn start_up(config: Config) -> Result<Self, StartupError> {
        if let Some(dir) = config.socket_path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|err| StartupError::RuntimeDir(dir.to_path_buf(), err))?;
        }
        let lock_file = acquire_lock(&config.lock_path)?;

        // Claiming the well-known name: bind the controller socket.
        if config.socket_path.exists() {
            let _ = std::fs::remove_file(&config.socket_path);
        }
        let socket = UnixListener::bind(&config.socket_path)
            .map_err(|err| StartupError::Bind(config.socket_path.clone(), err))?;

        let manager: Arc<dyn ManagerProxy> = Arc::new(RemoteManager::new(&config.manager_socket));
        manager.subscribe().await.map_err(StartupError::Subscribe)?;

        let nsm: Arc<dyn NsmConsumerProxy> = Arc::new(RemoteNsmConsumer::new(&config.nsm_socket));
        let lifecycle: Arc<dyn LifecycleControlProxy> =
            Arc::new(RemoteLifecycleControl::new(&config.nsm_socket));

        Ok(Self::compose(config, lock_file, socket, manager, nsm, Some(lifecycle)).await)
    }

    /// Wire the components together around the given proxies.
    pub async fn compose(
        config: Config,
        lock_file: File,
        socket: UnixListener,
        manager: Arc<dyn ManagerProxy>,
        nsm: Arc<dyn NsmConsumerProxy>,
        lifecycle: Option<Arc<dyn LifecycleControlProxy>>,
    ) -> Self {
        let job_manager = JobManager::new(Arc::clone(&manager));
        let registry = Arc::new(LucRegistry::new(LucStore::new(&config.luc_path)));
        let consumers = Arc::new(ConsumerTable::new());
        let legacy =
            LegacyAppHandler::new(Arc::clone(&job_manager), Arc::clone(&nsm), Arc::clone(&consumers));
        let luc_starter = LucStarter::new(
            job_manager,
            Arc::clone(&registry),
            lifecycle.clone(),
            config.prioritised_luc_types.clone(),
        );
        if let Some(lifecycle) = lifecycle {
            let _monitor = TargetStartupMonitor::spawn(Arc::clone(&manager), lifecycle);
        }

        // The daemon's own shutdown consumer at the distinguished suffix 0.
        let own_object_path = format!("{}/0", env::CONSUMER_PATH_PREFIX);
        consumers.export(own_object_path.clone(), ConsumerTarget::Controller);

        let shutdown = CancellationToken::new();
        let shutdown_flow = ShutdownFlow::new(
            Arc::clone(&luc_starter),
            Arc::clone(&legacy),
            Arc::clone(&nsm),
            own_object_path.clone(),
            shutdown,
        );

        match nsm
            .register_shutdown_client(env::BUS_NAME, &own_object_path, OWN_SHUTDOWN_MODE, OWN_TIMEOUT_MS)
            .await
        {
            Err(error) => {
                tracing::error!(error = %error, "failed to register the controller as a shutdown consumer");
            }
            Ok(status) if status != ErrorStatus::Ok => {
                tracing::error!(status = %status, "failed to register the controller as a shutdown consumer");
            }
            Ok(_) => {
                tracing::info!("registered the controller as a shutdown consumer");
            }
        }

        let listener = Listener::new(
            socket,
            Arc::new(ListenCtx {
                registry,
                legacy,
                consumers,
                shutdown_flow: Arc::clone(&shutdown_flow),
            }),
        );

        Self {
            config,
            lock_file,
            manager,
            shutdown_flow,
            listener: Some(listener),
            luc_starter,
        }
    }

    pub fn shutdown_flow(&self) -> Arc<ShutdownFlow> {
        Arc::clone(&self.shutdown_flow)
    }

    /// Run until shutdown completes.
    pub async fn run(mut self) -> Result<(), StartupError> {
        if let Some(listener) = self.listener.take() {
            tokio::spawn(listener.run());
        }

        // Hand control back to the supervisor once the restore settles.
        {
            let luc_starter = Arc::clone(&self.luc_starter);
            let manager = Arc::clone(&self.manager);
            tokio::spawn(async move {
                luc_starter.luc_groups_started().await;
                if let Err(error) = manager.ready().await {
                    tracing::error!(error = %error, "failed to notify the supervisor of readiness");
                }
            });
        }

        // Kick off the restore.
        {
            let luc_starter = Arc::clone(&self.luc_starter);
            tokio::spawn(async move { luc_starter.start_groups().await });
        }

        // Watchdog keepalive, half the configured window.
        if let Some(interval) = env::watchdog_interval() {
            tracing::info!(interval = ?interval, "supervisor watchdog keepalive enabled");
            let manager = Arc::clone(&self.manager);
            let shutdown = self.shutdown_flow.shutdown_token();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = ticker.tick() => {
                            if let Err(error) = manager.watchdog_ping().await {
                                tracing::warn!(error = %error, "watchdog keepalive failed");
                            }
                        }
                    }
                }
            });
        }

        // SIGTERM feeds the same shutdown sequence as a lifecycle request.
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .map_err(StartupError::Signal)?;
        {
            let flow = Arc::clone(&self.shutdown_flow);
            tokio::spawn(async move {
                while sigterm.recv().await.is_some() {
                    flow.initiate().await;
                }
            });
        }

        self.shutdown_flow.shutdown_token().cancelled().await;

        // Leave no stale socket or PID file behind.
        if self.config.socket_path.exists() {
            let _ = std::fs::remove_file(&self.config.socket_path);
        }
        if self.config.lock_path.exists() {
            let _ = std::fs::remove_file(&self.config.lock_path);
        }
        tracing::info!("node startup controller stopped");
        Ok(())
    }
}

fn acquire_lock(path: &std::path::Path) -> Result<File, StartupError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .map_err(|err| StartupError::RuntimeDir(dir.to_path_buf(), err))?;
    }
    let file = File::create(path).map_err(|_| StartupError::Lock(path.to_path_buf()))?;
    file.try_lock_exclusive().map_err(|_| StartupError::Lock(path.to_path_buf()))?;
    Ok(file)
}

#[cfg(test)]
#[path = "application_tests.rs"]
mod tests;
