// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy seams to the two external authorities.
//!
//! The daemon consumes the service supervisor's manager interface and the
//! node state manager's consumer and lifecycle-control interfaces. Each is a
//! trait here; production impls speak the wire protocol, tests use the
//! recording fakes.

mod remote;

pub use remote::{RemoteLifecycleControl, RemoteManager, RemoteNsmConsumer};

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

use async_trait::async_trait;
use nsc_core::{ErrorStatus, JobId, JobMode, JobRemoved, NodeState, ShutdownMode, UnitName};
use thiserror::Error;
use tokio::sync::broadcast;

/// Transport-level failure of an outbound call.
#[derive(Debug, Clone, Error)]
#[error("transport error calling {operation}: {message}")]
pub struct ProxyError {
    pub operation: &'static str,
    pub message: String,
}

impl ProxyError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self { operation, message: message.into() }
    }
}

/// The service supervisor's manager interface.
#[async_trait]
pub trait ManagerProxy: Send + Sync {
    /// Ask the supervisor to push `job-removed` events. Called once at
    /// startup; failure is fatal for the daemon.
    async fn subscribe(&self) -> Result<(), ProxyError>;

    /// A fresh receiver for the `job-removed` stream.
    fn job_removed_events(&self) -> broadcast::Receiver<JobRemoved>;

    async fn start_unit(&self, unit: &UnitName, mode: JobMode) -> Result<JobId, ProxyError>;

    async fn stop_unit(&self, unit: &UnitName, mode: JobMode) -> Result<JobId, ProxyError>;

    async fn restart_unit(&self, unit: &UnitName, mode: JobMode) -> Result<JobId, ProxyError>;

    async fn kill_unit(&self, unit: &UnitName, signal: i32) -> Result<(), ProxyError>;

    /// Object path of a loaded unit.
    async fn get_unit(&self, unit: &UnitName) -> Result<String, ProxyError>;

    /// The `active_state` property of the unit at `object_path`.
    async fn unit_active_state(&self, object_path: &str) -> Result<String, ProxyError>;

    /// Readiness notification once the last-user-context restore settles.
    async fn ready(&self) -> Result<(), ProxyError>;

    /// Watchdog keepalive.
    async fn watchdog_ping(&self) -> Result<(), ProxyError>;
}

/// The node state manager's consumer interface.
#[async_trait]
pub trait NsmConsumerProxy: Send + Sync {
    async fn register_shutdown_client(
        &self,
        bus_name: &str,
        object_path: &str,
        mode: ShutdownMode,
        timeout_ms: u32,
    ) -> Result<ErrorStatus, ProxyError>;

    async fn unregister_shutdown_client(
        &self,
        bus_name: &str,
        object_path: &str,
        mode: ShutdownMode,
    ) -> Result<ErrorStatus, ProxyError>;

    async fn lifecycle_request_complete(
        &self,
        request_id: u32,
        status: ErrorStatus,
    ) -> Result<ErrorStatus, ProxyError>;
}

/// The node state manager's lifecycle-control interface.
#[async_trait]
pub trait LifecycleControlProxy: Send + Sync {
    async fn set_node_state(&self, state: NodeState) -> Result<ErrorStatus, ProxyError>;

    async fn check_luc_required(&self) -> Result<bool, ProxyError>;
}
