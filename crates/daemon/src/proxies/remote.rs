// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire-backed proxies.
//!
//! Method calls use one connection per round trip. The supervisor's event
//! stream uses a long-lived subscription connection whose frames are fanned
//! out on a broadcast channel.

use super::{LifecycleControlProxy, ManagerProxy, NsmConsumerProxy, ProxyError};
use async_trait::async_trait;
use nsc_core::{ErrorStatus, JobId, JobMode, JobRemoved, NodeState, ShutdownMode, UnitName};
use nsc_wire::{ManagerEvent, ManagerReply, ManagerRequest, NsmReply, NsmRequest};
use std::path::PathBuf;
use tokio::net::UnixStream;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Client of the service supervisor's manager interface.
pub struct RemoteManager {
    socket: PathBuf,
    events: broadcast::Sender<JobRemoved>,
}

impl RemoteManager {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { socket: socket.into(), events }
    }

    async fn call(
        &self,
        operation: &'static str,
        request: &ManagerRequest,
    ) -> Result<ManagerReply, ProxyError> {
        let reply: ManagerReply = nsc_wire::call(&self.socket, request)
            .await
            .map_err(|err| ProxyError::new(operation, err.to_string()))?;
        if let ManagerReply::Error { message } = reply {
            return Err(ProxyError::new(operation, message));
        }
        Ok(reply)
    }

    async fn call_for_job(
        &self,
        operation: &'static str,
        request: &ManagerRequest,
    ) -> Result<JobId, ProxyError> {
        match self.call(operation, request).await? {
            ManagerReply::Job { job } => Ok(job),
            other => Err(ProxyError::new(operation, format!("unexpected reply: {other:?}"))),
        }
    }
}

#[async_trait]
impl ManagerProxy for RemoteManager {
    async fn subscribe(&self) -> Result<(), ProxyError> {
        let mut stream = UnixStream::connect(&self.socket)
            .await
            .map_err(|err| ProxyError::new("subscribe", err.to_string()))?;
        nsc_wire::write_frame(&mut stream, &ManagerRequest::Subscribe)
            .await
            .map_err(|err| ProxyError::new("subscribe", err.to_string()))?;
        let reply: ManagerReply = nsc_wire::read_frame(&mut stream)
            .await
            .map_err(|err| ProxyError::new("subscribe", err.to_string()))?;
        if let ManagerReply::Error { message } = reply {
            return Err(ProxyError::new("subscribe", message));
        }

        let events = self.events.clone();
        tokio::spawn(async move {
            loop {
                match nsc_wire::read_frame::<_, ManagerEvent>(&mut stream).await {
                    Ok(ManagerEvent::JobRemoved(event)) => {
                        let _ = events.send(event);
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "supervisor event stream closed");
                        break;
                    }
                }
            }
        });
        Ok(())
    }

    fn job_removed_events(&self) -> broadcast::Receiver<JobRemoved> {
        self.events.subscribe()
    }

    async fn start_unit(&self, unit: &UnitName, mode: JobMode) -> Result<JobId, ProxyError> {
        self.call_for_job(
            "start_unit",
            &ManagerRequest::StartUnit { unit: unit.clone(), mode },
        )
        .await
    }

    async fn stop_unit(&self, unit: &UnitName, mode: JobMode) -> Result<JobId, ProxyError> {
        self.call_for_job("stop_unit", &ManagerRequest::StopUnit { unit: unit.clone(), mode })
            .await
    }

    async fn restart_unit(&self, unit: &UnitName, mode: JobMode) -> Result<JobId, ProxyError> {
        self.call_for_job(
            "restart_unit",
            &ManagerRequest::RestartUnit { unit: unit.clone(), mode },
        )
        .await
    }

    async fn kill_unit(&self, unit: &UnitName, signal: i32) -> Result<(), ProxyError> {
        self.call(
            "kill_unit",
            &ManagerRequest::KillUnit {
                unit: unit.clone(),
                who: "all".to_owned(),
                mode: "control-group".to_owned(),
                signal,
            },
        )
        .await
        .map(|_| ())
    }

    async fn get_unit(&self, unit: &UnitName) -> Result<String, ProxyError> {
        match self.call("get_unit", &ManagerRequest::GetUnit { unit: unit.clone() }).await? {
            ManagerReply::Unit { object_path } => Ok(object_path),
            other => Err(ProxyError::new("get_unit", format!("unexpected reply: {other:?}"))),
        }
    }

    async fn unit_active_state(&self, object_path: &str) -> Result<String, ProxyError> {
        let request = ManagerRequest::GetUnitActiveState { object_path: object_path.to_owned() };
        match self.call("unit_active_state", &request).await? {
            ManagerReply::ActiveState { state } => Ok(state),
            other => {
                Err(ProxyError::new("unit_active_state", format!("unexpected reply: {other:?}")))
            }
        }
    }

    async fn ready(&self) -> Result<(), ProxyError> {
        self.call("ready", &ManagerRequest::Ready).await.map(|_| ())
    }

    async fn watchdog_ping(&self) -> Result<(), ProxyError> {
        self.call("watchdog_ping", &ManagerRequest::WatchdogPing).await.map(|_| ())
    }
}

/// Client of the node state manager's consumer interface.
pub struct RemoteNsmConsumer {
    socket: PathBuf,
}

impl RemoteNsmConsumer {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self { socket: socket.into() }
    }
}

async fn nsm_status_call(
    socket: &std::path::Path,
    operation: &'static str,
    request: &NsmRequest,
) -> Result<ErrorStatus, ProxyError> {
    let reply: NsmReply = nsc_wire::call(socket, request)
        .await
        .map_err(|err| ProxyError::new(operation, err.to_string()))?;
    match reply {
        NsmReply::Status { status } => Ok(status),
        NsmReply::Error { message } => Err(ProxyError::new(operation, message)),
        other => Err(ProxyError::new(operation, format!("unexpected reply: {other:?}"))),
    }
}

#[async_trait]
impl NsmConsumerProxy for RemoteNsmConsumer {
    async fn register_shutdown_client(
        &self,
        bus_name: &str,
        object_path: &str,
        mode: ShutdownMode,
        timeout_ms: u32,
    ) -> Result<ErrorStatus, ProxyError> {
        let request = NsmRequest::RegisterShutdownClient {
            bus_name: bus_name.to_owned(),
            object_path: object_path.to_owned(),
            mode,
            timeout_ms,
        };
        nsm_status_call(&self.socket, "register_shutdown_client", &request).await
    }

    async fn unregister_shutdown_client(
        &self,
        bus_name: &str,
        object_path: &str,
        mode: ShutdownMode,
    ) -> Result<ErrorStatus, ProxyError> {
        let request = NsmRequest::UnregisterShutdownClient {
            bus_name: bus_name.to_owned(),
            object_path: object_path.to_owned(),
            mode,
        };
        nsm_status_call(&self.socket, "unregister_shutdown_client", &request).await
    }

    async fn lifecycle_request_complete(
        &self,
        request_id: u32,
        status: ErrorStatus,
    ) -> Result<ErrorStatus, ProxyError> {
        let request = NsmRequest::LifecycleRequestComplete { request_id, status };
        nsm_status_call(&self.socket, "lifecycle_request_complete", &request).await
    }
}

/// Client of the node state manager's lifecycle-control interface.
pub struct RemoteLifecycleControl {
    socket: PathBuf,
}

impl RemoteLifecycleControl {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self { socket: socket.into() }
    }
}

#[async_trait]
impl LifecycleControlProxy for RemoteLifecycleControl {
    async fn set_node_state(&self, state: NodeState) -> Result<ErrorStatus, ProxyError> {
        let request = NsmRequest::SetNodeState { state: state.raw() };
        nsm_status_call(&self.socket, "set_node_state", &request).await
    }

    async fn check_luc_required(&self) -> Result<bool, ProxyError> {
        let reply: NsmReply = nsc_wire::call(&self.socket, &NsmRequest::CheckLucRequired)
            .await
            .map_err(|err| ProxyError::new("check_luc_required", err.to_string()))?;
        match reply {
            NsmReply::LucRequired { required } => Ok(required),
            NsmReply::Error { message } => Err(ProxyError::new("check_luc_required", message)),
            other => Err(ProxyError::new(
                "check_luc_required",
                format!("unexpected reply: {other:?}"),
            )),
        }
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
