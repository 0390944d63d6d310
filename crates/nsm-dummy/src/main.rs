// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! nsm-dummy: node state manager stand-in.
//!
//! Serves the consumer and lifecycle-control interfaces on a unix socket.
//! SIGTERM runs the two-phase shutdown over all registered consumers and
//! exits.

use nsc_nsm_dummy::{LifecycleControlService, NsmConsumerService, WireConsumerGateway};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::UnixListener;
use tracing_subscriber::EnvFilter;

fn socket_path() -> PathBuf {
    match std::env::var("NSC_NSM_SOCKET") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from("/run/nsc/nsm.sock"),
    }
}

fn consumer_socket_path() -> PathBuf {
    match std::env::var("NSC_CONTROLLER_SOCKET") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from("/run/nsc/controller.sock"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = socket_path();
    if let Some(dir) = path.parent() {
        if let Err(error) = std::fs::create_dir_all(dir) {
            tracing::error!(dir = %dir.display(), error = %error, "failed to create the runtime directory");
            return ExitCode::FAILURE;
        }
    }
    if path.exists() {
        let _ = std::fs::remove_file(&path);
    }
    let socket = match UnixListener::bind(&path) {
        Ok(socket) => socket,
        Err(error) => {
            tracing::error!(path = %path.display(), error = %error, "failed to bind the NSM socket");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(path = %path.display(), "nsm dummy listening");

    let gateway = Arc::new(WireConsumerGateway::new(consumer_socket_path()));
    let consumers = NsmConsumerService::new(gateway);
    let lifecycle = Arc::new(LifecycleControlService::new());

    tokio::spawn(nsc_nsm_dummy::serve(socket, Arc::clone(&consumers), lifecycle));

    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(signal) => signal,
        Err(error) => {
            tracing::error!(error = %error, "failed to install the signal handler");
            return ExitCode::FAILURE;
        }
    };
    sigterm.recv().await;

    // Shut every registered consumer down, then leave.
    consumers.shutdown_consumers().await;
    let _ = std::fs::remove_file(&path);
    ExitCode::SUCCESS
}
