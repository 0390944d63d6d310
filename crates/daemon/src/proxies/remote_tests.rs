// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire round trips for the remote proxies against a scripted peer.

use super::*;
use nsc_core::{ErrorStatus, JobId, JobMode, JobRemoved, JobResult, NodeState, ShutdownMode, UnitName};
use nsc_wire::{ManagerEvent, ManagerReply, ManagerRequest, NsmReply, NsmRequest};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::UnixListener;
use tokio::sync::mpsc;

/// A scripted supervisor: records requests, replies per request kind, and
/// pushes events handed to `push_event` on the subscription connection.
struct ScriptedManager {
    requests: Mutex<Vec<ManagerRequest>>,
    events: mpsc::UnboundedSender<JobRemoved>,
    fail_start: Mutex<bool>,
}

impl ScriptedManager {
    fn spawn(path: PathBuf) -> Arc<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let server = Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            events: event_tx,
            fail_start: Mutex::new(false),
        });
        let socket = std::os::unix::net::UnixListener::bind(&path).unwrap();
        socket.set_nonblocking(true).unwrap();
        let socket = UnixListener::from_std(socket).unwrap();

        let this = Arc::clone(&server);
        let event_rx = Arc::new(tokio::sync::Mutex::new(event_rx));
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = socket.accept().await else {
                    break;
                };
                let this = Arc::clone(&this);
                let event_rx = Arc::clone(&event_rx);
                tokio::spawn(async move {
                    let Ok(request) =
                        nsc_wire::read_frame::<_, ManagerRequest>(&mut stream).await
                    else {
                        return;
                    };
                    this.requests.lock().push(request.clone());
                    let reply = this.reply_for(&request);
                    if nsc_wire::write_frame(&mut stream, &reply).await.is_err() {
                        return;
                    }
                    if matches!(request, ManagerRequest::Subscribe) {
                        let mut event_rx = event_rx.lock().await;
                        while let Some(event) = event_rx.recv().await {
                            let frame = ManagerEvent::JobRemoved(event);
                            if nsc_wire::write_frame(&mut stream, &frame).await.is_err() {
                                break;
                            }
                        }
                    }
                });
            }
        });
        server
    }

    fn reply_for(&self, request: &ManagerRequest) -> ManagerReply {
        match request {
            ManagerRequest::StartUnit { unit, .. } if *self.fail_start.lock() => {
                ManagerReply::Error { message: format!("unit {unit} masked") }
            }
            ManagerRequest::StartUnit { .. }
            | ManagerRequest::StopUnit { .. }
            | ManagerRequest::RestartUnit { .. } => {
                ManagerReply::Job { job: JobId::new("/job/scripted") }
            }
            ManagerRequest::GetUnit { unit } => {
                ManagerReply::Unit { object_path: format!("/unit/{unit}") }
            }
            ManagerRequest::GetUnitActiveState { .. } => {
                ManagerReply::ActiveState { state: "active".to_owned() }
            }
            _ => ManagerReply::Ok,
        }
    }

    fn push_event(&self, event: JobRemoved) {
        let _ = self.events.send(event);
    }

    fn requests(&self) -> Vec<ManagerRequest> {
        self.requests.lock().clone()
    }
}

#[tokio::test]
async fn subscription_delivers_pushed_events() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("manager.sock");
    let server = ScriptedManager::spawn(path.clone());

    let manager = RemoteManager::new(&path);
    manager.subscribe().await.unwrap();
    let mut events = manager.job_removed_events();

    let event = JobRemoved {
        id: 5,
        job: JobId::new("/job/5"),
        unit: UnitName::new("a.service"),
        result: JobResult::Done,
    };
    server.push_event(event.clone());

    assert_eq!(events.recv().await.unwrap(), event);
}

#[tokio::test]
async fn start_unit_returns_the_correlation_id() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("manager.sock");
    let server = ScriptedManager::spawn(path.clone());

    let manager = RemoteManager::new(&path);
    let job = manager.start_unit(&UnitName::new("a.service"), JobMode::Fail).await.unwrap();

    assert_eq!(job, JobId::new("/job/scripted"));
    assert_eq!(
        server.requests(),
        vec![ManagerRequest::StartUnit { unit: UnitName::new("a.service"), mode: JobMode::Fail }]
    );
}

#[tokio::test]
async fn error_replies_surface_as_transport_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("manager.sock");
    let server = ScriptedManager::spawn(path.clone());
    *server.fail_start.lock() = true;

    let manager = RemoteManager::new(&path);
    let error = manager
        .start_unit(&UnitName::new("bad.service"), JobMode::Fail)
        .await
        .expect_err("should fail");

    assert_eq!(error.operation, "start_unit");
    assert!(error.message.contains("masked"));
}

#[tokio::test]
async fn unit_lookup_and_active_state_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("manager.sock");
    let _server = ScriptedManager::spawn(path.clone());

    let manager = RemoteManager::new(&path);
    let object_path = manager.get_unit(&UnitName::new("focussed.target")).await.unwrap();
    assert_eq!(object_path, "/unit/focussed.target");

    let state = manager.unit_active_state(&object_path).await.unwrap();
    assert_eq!(state, "active");
}

#[tokio::test]
async fn calls_without_a_listening_peer_fail_at_the_transport() {
    let dir = TempDir::new().unwrap();
    let manager = RemoteManager::new(dir.path().join("absent.sock"));

    let error = manager.ready().await.expect_err("should fail");
    assert_eq!(error.operation, "ready");

    let nsm = RemoteNsmConsumer::new(dir.path().join("absent.sock"));
    let error = nsm
        .lifecycle_request_complete(1, ErrorStatus::Ok)
        .await
        .expect_err("should fail");
    assert_eq!(error.operation, "lifecycle_request_complete");
}

/// A one-shot NSM peer answering a fixed reply on an already-bound socket.
async fn serve_one_nsm_reply(socket: UnixListener, reply: NsmReply) -> NsmRequest {
    let (mut stream, _) = socket.accept().await.unwrap();
    let request = nsc_wire::read_frame(&mut stream).await.unwrap();
    nsc_wire::write_frame(&mut stream, &reply).await.unwrap();
    request
}

#[tokio::test]
async fn nsm_registration_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nsm.sock");
    let socket = UnixListener::bind(&path).unwrap();
    let peer =
        tokio::spawn(serve_one_nsm_reply(socket, NsmReply::Status { status: ErrorStatus::Ok }));

    let nsm = RemoteNsmConsumer::new(&path);
    let status = nsm
        .register_shutdown_client("org.test", "/consumer/1", ShutdownMode::NORMAL, 500)
        .await
        .unwrap();

    assert_eq!(status, ErrorStatus::Ok);
    assert_eq!(
        peer.await.unwrap(),
        NsmRequest::RegisterShutdownClient {
            bus_name: "org.test".to_owned(),
            object_path: "/consumer/1".to_owned(),
            mode: ShutdownMode::NORMAL,
            timeout_ms: 500,
        }
    );
}

#[tokio::test]
async fn lifecycle_control_round_trips() {
    let dir = TempDir::new().unwrap();

    let path = dir.path().join("nsm.sock");
    let socket = UnixListener::bind(&path).unwrap();
    let peer =
        tokio::spawn(serve_one_nsm_reply(socket, NsmReply::Status { status: ErrorStatus::Ok }));
    let control = RemoteLifecycleControl::new(&path);
    assert_eq!(control.set_node_state(NodeState::BaseRunning).await.unwrap(), ErrorStatus::Ok);
    assert_eq!(peer.await.unwrap(), NsmRequest::SetNodeState { state: 2 });

    let path = dir.path().join("nsm2.sock");
    let socket = UnixListener::bind(&path).unwrap();
    let peer =
        tokio::spawn(serve_one_nsm_reply(socket, NsmReply::LucRequired { required: false }));
    let control = RemoteLifecycleControl::new(&path);
    assert!(!control.check_luc_required().await.unwrap());
    assert_eq!(peer.await.unwrap(), NsmRequest::CheckLucRequired);
}
