// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for the daemon's offered interfaces.
//!
//! Accepts connections on the controller socket and serves one request per
//! connection: the last-user-context registration triple, legacy application
//! registration, and lifecycle requests addressed to exported shutdown
//! consumers.

use crate::application::ShutdownFlow;
use crate::consumers::{ConsumerTable, ConsumerTarget};
use crate::legacy::LegacyAppHandler;
use crate::registry::LucRegistry;
use nsc_core::ErrorStatus;
use nsc_wire::{ControllerReply, ControllerRequest, ProtocolError};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;

/// Shared daemon context for all request handlers.
pub struct ListenCtx {
    pub registry: Arc<LucRegistry>,
    pub legacy: Arc<LegacyAppHandler>,
    pub consumers: Arc<ConsumerTable>,
    pub shutdown_flow: Arc<ShutdownFlow>,
}

/// Listener task for accepting socket connections.
pub struct Listener {
    socket: UnixListener,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    pub fn new(socket: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { socket, ctx }
    }

    /// Run the accept loop, spawning a task per connection.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        if let Err(error) = handle_connection(reader, writer, &ctx).await {
                            tracing::debug!(error = %error, "connection error");
                        }
                    });
                }
                Err(error) => tracing::error!(error = %error, "accept error"),
            }
        }
    }
}

async fn handle_connection<R, W>(
    mut reader: R,
    mut writer: W,
    ctx: &ListenCtx,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let request: ControllerRequest = nsc_wire::read_frame(&mut reader).await?;
    let reply = dispatch(request, ctx).await;
    nsc_wire::write_frame(&mut writer, &reply).await
}

async fn dispatch(request: ControllerRequest, ctx: &ListenCtx) -> ControllerReply {
    match request {
        ControllerRequest::BeginLucRegistration => {
            ctx.registry.begin();
            ControllerReply::Ok
        }
        ControllerRequest::RegisterWithLuc { apps } => {
            ctx.registry.register(&apps);
            ControllerReply::Ok
        }
        ControllerRequest::FinishLucRegistration => {
            ctx.registry.finish();
            ControllerReply::Ok
        }
        ControllerRequest::Register { unit, mode, timeout_ms } => {
            ctx.legacy.register(unit, mode, timeout_ms).await;
            ControllerReply::Ok
        }
        ControllerRequest::LifecycleRequest { object_path, mode, request_id } => {
            let status = match ctx.consumers.resolve(&object_path) {
                Some(ConsumerTarget::Controller) => {
                    ctx.shutdown_flow.handle_lifecycle_request(mode).await
                }
                Some(ConsumerTarget::LegacyUnit(client_id)) => {
                    ctx.legacy.handle_lifecycle_request(client_id, request_id)
                }
                None => {
                    tracing::error!(
                        object_path = %object_path,
                        request_id,
                        "lifecycle request for an unexported object path"
                    );
                    ErrorStatus::Error
                }
            };
            ControllerReply::Status { status }
        }
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
