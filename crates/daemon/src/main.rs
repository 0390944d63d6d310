// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! nscd: the node startup controller daemon.

use nsc_daemon::application::{Application, Config};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load();
    tracing::info!(socket = %config.socket_path.display(), "node startup controller starting");

    let application = match Application::start_up(config).await {
        Ok(application) => application,
        Err(error) => {
            tracing::error!(error = %error, "node startup controller failed to start");
            return ExitCode::FAILURE;
        }
    };

    match application.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "node startup controller failed");
            ExitCode::FAILURE
        }
    }
}
