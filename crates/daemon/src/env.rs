// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use nsc_core::LucType;
use std::path::PathBuf;
use std::time::Duration;

/// Well-known name under which the daemon offers its interfaces.
pub const BUS_NAME: &str = "org.genivi.NodeStartupController1";

/// Prefix for exported shutdown-consumer object paths. The monotonic
/// registration counter is appended as a decimal suffix; suffix `0` is the
/// daemon's own consumer.
pub const CONSUMER_PATH_PREFIX: &str = "/org/genivi/NodeStartupController1/ShutdownConsumer";

/// Resolve the runtime directory: NSC_RUNTIME_DIR > XDG_RUNTIME_DIR/nsc > /run/nsc
pub fn runtime_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("NSC_RUNTIME_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(xdg).join("nsc");
    }
    PathBuf::from("/run/nsc")
}

/// Socket on which the daemon offers its controller interface.
pub fn controller_socket_path() -> PathBuf {
    runtime_dir().join("controller.sock")
}

/// Path to the lock/PID file.
pub fn lock_path() -> PathBuf {
    runtime_dir().join("controller.pid")
}

/// Socket of the service supervisor's manager interface.
pub fn manager_socket_path() -> PathBuf {
    match std::env::var("NSC_MANAGER_SOCKET") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => runtime_dir().join("manager.sock"),
    }
}

/// Socket of the node state manager.
pub fn nsm_socket_path() -> PathBuf {
    match std::env::var("NSC_NSM_SOCKET") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => runtime_dir().join("nsm.sock"),
    }
}

/// Default path of the last user context file. The `LUC_PATH` environment
/// variable overrides this at access time (handled by the store).
pub fn default_luc_path() -> PathBuf {
    PathBuf::from(option_env!("LUC_PATH").unwrap_or("/var/lib/node-startup-controller/luc"))
}

/// Application types started first when restoring the last user context.
///
/// Baked in at build time via `PRIORITISED_LUC_TYPES` (comma-separated
/// integers); the environment variable of the same name wins at runtime.
pub fn prioritised_luc_types() -> Vec<LucType> {
    let raw = std::env::var("PRIORITISED_LUC_TYPES")
        .ok()
        .or_else(|| option_env!("PRIORITISED_LUC_TYPES").map(String::from))
        .unwrap_or_default();
    parse_luc_types(&raw)
}

fn parse_luc_types(raw: &str) -> Vec<LucType> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| match part.parse::<LucType>() {
            Ok(luc_type) => Some(luc_type),
            Err(_) => {
                tracing::warn!(value = part, "ignoring unparsable prioritised LUC type");
                None
            }
        })
        .collect()
}

/// Watchdog keepalive interval: half of `WATCHDOG_USEC`, when set and
/// positive. The supervisor must be notified twice per watchdog window.
pub fn watchdog_interval() -> Option<Duration> {
    let usec = std::env::var("WATCHDOG_USEC").ok()?.parse::<u64>().ok()?;
    if usec == 0 {
        return None;
    }
    Some(Duration::from_micros(usec / 2))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
