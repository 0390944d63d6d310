// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket service of the dummy: one request per connection.

use crate::consumer::NsmConsumerService;
use crate::lifecycle_control::LifecycleControlService;
use nsc_wire::{NsmReply, NsmRequest, ProtocolError};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;

/// Serve the consumer and lifecycle-control interfaces until the task is
/// dropped.
pub async fn serve(
    socket: UnixListener,
    consumers: Arc<NsmConsumerService>,
    lifecycle: Arc<LifecycleControlService>,
) {
    loop {
        match socket.accept().await {
            Ok((stream, _)) => {
                let consumers = Arc::clone(&consumers);
                let lifecycle = Arc::clone(&lifecycle);
                tokio::spawn(async move {
                    let (reader, writer) = stream.into_split();
                    if let Err(error) =
                        handle_connection(reader, writer, &consumers, &lifecycle).await
                    {
                        tracing::debug!(error = %error, "connection error");
                    }
                });
            }
            Err(error) => tracing::error!(error = %error, "accept error"),
        }
    }
}

async fn handle_connection<R, W>(
    mut reader: R,
    mut writer: W,
    consumers: &Arc<NsmConsumerService>,
    lifecycle: &Arc<LifecycleControlService>,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let request: NsmRequest = nsc_wire::read_frame(&mut reader).await?;
    let reply = dispatch(request, consumers, lifecycle);
    nsc_wire::write_frame(&mut writer, &reply).await
}

fn dispatch(
    request: NsmRequest,
    consumers: &Arc<NsmConsumerService>,
    lifecycle: &Arc<LifecycleControlService>,
) -> NsmReply {
    match request {
        NsmRequest::RegisterShutdownClient { bus_name, object_path, mode, timeout_ms } => {
            let status =
                consumers.register_shutdown_client(&bus_name, &object_path, mode, timeout_ms);
            NsmReply::Status { status }
        }
        NsmRequest::UnregisterShutdownClient { bus_name, object_path, mode } => {
            let status = consumers.unregister_shutdown_client(&bus_name, &object_path, mode);
            NsmReply::Status { status }
        }
        NsmRequest::LifecycleRequestComplete { request_id, status } => {
            let status = consumers.lifecycle_request_complete(request_id, status);
            NsmReply::Status { status }
        }
        NsmRequest::SetNodeState { state } => {
            NsmReply::Status { status: lifecycle.set_node_state(state) }
        }
        NsmRequest::CheckLucRequired => {
            NsmReply::LucRequired { required: lifecycle.check_luc_required() }
        }
        NsmRequest::ShutdownConsumers => {
            let consumers = Arc::clone(consumers);
            tokio::spawn(async move {
                consumers.shutdown_consumers().await;
            });
            NsmReply::Status { status: nsc_core::ErrorStatus::Ok }
        }
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
