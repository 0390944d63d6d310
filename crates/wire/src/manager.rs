// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messages of the service supervisor's manager interface.
//!
//! The daemon is a client of this interface. Method calls are one frame per
//! connection; `Subscribe` keeps its connection open and the supervisor pushes
//! [`ManagerEvent`] frames on it until either side disconnects.

use nsc_core::{JobId, JobMode, JobRemoved, UnitName};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ManagerRequest {
    /// Ask for `job-removed` events on this connection.
    Subscribe,
    StartUnit {
        unit: UnitName,
        mode: JobMode,
    },
    StopUnit {
        unit: UnitName,
        mode: JobMode,
    },
    RestartUnit {
        unit: UnitName,
        mode: JobMode,
    },
    KillUnit {
        unit: UnitName,
        who: String,
        mode: String,
        signal: i32,
    },
    GetUnit {
        unit: UnitName,
    },
    GetUnitActiveState {
        object_path: String,
    },
    /// Startup has settled; the supervisor may continue with later targets.
    Ready,
    /// Watchdog keepalive.
    WatchdogPing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ManagerReply {
    Ok,
    /// A start/stop/restart request was accepted under this correlation id.
    Job { job: JobId },
    Unit { object_path: String },
    ActiveState { state: String },
    Error { message: String },
}

/// Frames pushed on a subscribed connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ManagerEvent {
    JobRemoved(JobRemoved),
}
