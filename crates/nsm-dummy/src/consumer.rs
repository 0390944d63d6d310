// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Consumer service and shutdown scheduler.
//!
//! Clients register with a bus name, object path, mode mask, and timeout.
//! On the shutdown trigger the scheduler walks them in reverse registration
//! order, `FAST` pass first, then `NORMAL`, with at most one lifecycle
//! request in flight. A client that answers `ResponsePending` gets its
//! registered timeout to call `lifecycle_request_complete` before the
//! scheduler moves on without it.

use async_trait::async_trait;
use nsc_core::{ErrorStatus, ShutdownMode};
use nsc_wire::{ControllerReply, ControllerRequest, ProtocolError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// A registered shutdown client.
#[derive(Debug, Clone)]
pub struct RegisteredClient {
    /// Stable request id, assigned at first registration.
    pub request_id: u32,
    pub bus_name: String,
    pub object_path: String,
    pub mode: ShutdownMode,
    pub timeout: Duration,
}

/// Outbound path to a consumer's `lifecycle_request` method.
#[async_trait]
pub trait ConsumerGateway: Send + Sync {
    async fn lifecycle_request(
        &self,
        client: &RegisteredClient,
        mode: ShutdownMode,
        request_id: u32,
    ) -> Result<ErrorStatus, ProtocolError>;
}

/// Gateway that dials the consumer's socket per request.
pub struct WireConsumerGateway {
    socket: PathBuf,
}

impl WireConsumerGateway {
    /// `socket` is where the controller serves its exported consumers.
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self { socket: socket.into() }
    }
}

#[async_trait]
impl ConsumerGateway for WireConsumerGateway {
    async fn lifecycle_request(
        &self,
        client: &RegisteredClient,
        mode: ShutdownMode,
        request_id: u32,
    ) -> Result<ErrorStatus, ProtocolError> {
        let request = ControllerRequest::LifecycleRequest {
            object_path: client.object_path.clone(),
            mode,
            request_id,
        };
        let reply: ControllerReply = nsc_wire::call(&self.socket, &request).await?;
        match reply {
            ControllerReply::Status { status } => Ok(status),
            ControllerReply::Ok => Ok(ErrorStatus::Ok),
            ControllerReply::Error { message } => Err(ProtocolError::Io(std::io::Error::other(message))),
        }
    }
}

#[derive(Default)]
struct ConsumerState {
    clients: Vec<RegisteredClient>,
    next_request_id: u32,
    queue_active: bool,
    /// Request id the scheduler is waiting on, with its wake-up channel.
    awaited: Option<(u32, oneshot::Sender<()>)>,
}

/// The consumer interface plus the shutdown scheduler.
pub struct NsmConsumerService {
    gateway: Arc<dyn ConsumerGateway>,
    state: Mutex<ConsumerState>,
}

impl NsmConsumerService {
    pub fn new(gateway: Arc<dyn ConsumerGateway>) -> Arc<Self> {
        Arc::new(Self { gateway, state: Mutex::new(ConsumerState::default()) })
    }

    /// Register a shutdown client, or re-register an existing one by bus
    /// name and object path (mode and timeout are overwritten).
    pub fn register_shutdown_client(
        &self,
        bus_name: &str,
        object_path: &str,
        mode: ShutdownMode,
        timeout_ms: u32,
    ) -> ErrorStatus {
        let timeout = Duration::from_millis(u64::from(timeout_ms));
        let mut state = self.state.lock();
        if let Some(client) = state
            .clients
            .iter_mut()
            .find(|client| client.bus_name == bus_name && client.object_path == object_path)
        {
            client.mode = mode;
            client.timeout = timeout;
            tracing::info!(
                bus_name,
                object_path,
                mode = %mode,
                timeout_ms,
                "re-registered shutdown client"
            );
            return ErrorStatus::Ok;
        }

        state.next_request_id += 1;
        let client = RegisteredClient {
            request_id: state.next_request_id,
            bus_name: bus_name.to_owned(),
            object_path: object_path.to_owned(),
            mode,
            timeout,
        };
        tracing::info!(
            bus_name,
            object_path,
            mode = %mode,
            timeout_ms,
            request_id = client.request_id,
            "shutdown client registered"
        );
        state.clients.push(client);
        ErrorStatus::Ok
    }

    /// Drop the given mode bits from a client; the client is removed once no
    /// bits remain. Unknown clients yield `Error`.
    pub fn unregister_shutdown_client(
        &self,
        bus_name: &str,
        object_path: &str,
        mode: ShutdownMode,
    ) -> ErrorStatus {
        let mut state = self.state.lock();
        let Some(pos) = state
            .clients
            .iter()
            .position(|client| client.bus_name == bus_name && client.object_path == object_path)
        else {
            return ErrorStatus::Error;
        };

        state.clients[pos].mode = state.clients[pos].mode.without(mode);
        if state.clients[pos].mode.is_empty() {
            tracing::info!(bus_name, object_path, "shutdown client unregistered");
            state.clients.remove(pos);
        }
        ErrorStatus::Ok
    }

    /// A consumer finished a pending lifecycle request.
    pub fn lifecycle_request_complete(&self, request_id: u32, status: ErrorStatus) -> ErrorStatus {
        tracing::info!(request_id, status = %status, "finished shutting down client");
        let mut state = self.state.lock();
        match &state.awaited {
            Some((awaited_id, _)) if *awaited_id == request_id => {
                if let Some((_, wake)) = state.awaited.take() {
                    let _ = wake.send(());
                }
            }
            Some((awaited_id, _)) => {
                tracing::warn!(
                    awaited = awaited_id,
                    completed = request_id,
                    "completion received for a different lifecycle request"
                );
            }
            None => {
                tracing::warn!(request_id, "lifecycle request completed too late");
            }
        }
        ErrorStatus::Ok
    }

    /// Trigger a shutdown run. A no-op while a run is active or when no
    /// clients are registered.
    pub async fn shutdown_consumers(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if state.queue_active || state.clients.is_empty() {
                return;
            }
            state.queue_active = true;
        }
        self.drain().await;
        self.state.lock().queue_active = false;
        tracing::info!("all clients have been shut down");
    }

    /// Snapshot of the registered clients, for assertions and the listener.
    pub fn clients(&self) -> Vec<RegisteredClient> {
        self.state.lock().clients.clone()
    }

    async fn drain(self: &Arc<Self>) {
        let mut mode = ShutdownMode::FAST;
        let mut remaining = self.queue_for_pass();

        loop {
            let Some(request_id) = remaining.pop_front() else {
                if mode == ShutdownMode::FAST {
                    tracing::info!("transitioning to normal shutdown mode");
                    mode = ShutdownMode::NORMAL;
                    remaining = self.queue_for_pass();
                    continue;
                }
                break;
            };

            // The client may have unregistered while the queue was waiting.
            let Some(client) = self.client_by_request_id(request_id) else {
                continue;
            };
            if !client.mode.contains(mode) {
                tracing::info!(
                    object_path = %client.object_path,
                    mode = %mode,
                    "skipping client not registered for this shutdown mode"
                );
                continue;
            }

            tracing::info!(
                bus_name = %client.bus_name,
                object_path = %client.object_path,
                mode = %mode,
                request_id,
                "shutting down a client"
            );
            match self.gateway.lifecycle_request(&client, mode, request_id).await {
                Err(error) => {
                    tracing::error!(
                        object_path = %client.object_path,
                        error = %error,
                        "failed to shut down a client"
                    );
                }
                Ok(ErrorStatus::Ok) => {
                    tracing::info!(object_path = %client.object_path, "client shut down");
                }
                Ok(ErrorStatus::ResponsePending) => {
                    tracing::info!(request_id, "waiting for client to shut down");
                    self.wait_for_completion(request_id, client.timeout).await;
                }
                Ok(status) => {
                    tracing::error!(
                        object_path = %client.object_path,
                        status = %status,
                        "client rejected the lifecycle request"
                    );
                }
            }
        }
    }

    /// Reverse registration order: last registered shuts down first.
    fn queue_for_pass(&self) -> VecDeque<u32> {
        self.state.lock().clients.iter().rev().map(|client| client.request_id).collect()
    }

    fn client_by_request_id(&self, request_id: u32) -> Option<RegisteredClient> {
        self.state.lock().clients.iter().find(|c| c.request_id == request_id).cloned()
    }

    async fn wait_for_completion(&self, request_id: u32, timeout: Duration) {
        let completed = {
            let (wake, completed) = oneshot::channel();
            self.state.lock().awaited = Some((request_id, wake));
            completed
        };

        tokio::select! {
            _ = completed => {}
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(request_id, "timed out waiting for a client to shut down");
                self.state.lock().awaited = None;
            }
        }
    }
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;
