// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messages of the node state manager's consumer and lifecycle-control
//! interfaces.

use nsc_core::{ErrorStatus, ShutdownMode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NsmRequest {
    RegisterShutdownClient {
        bus_name: String,
        object_path: String,
        mode: ShutdownMode,
        timeout_ms: u32,
    },
    UnregisterShutdownClient {
        bus_name: String,
        object_path: String,
        mode: ShutdownMode,
    },
    LifecycleRequestComplete {
        request_id: u32,
        status: ErrorStatus,
    },
    /// Raw node-state value; out-of-range values are rejected with
    /// `parameter`.
    SetNodeState {
        state: i32,
    },
    CheckLucRequired,
    /// Trigger a full shutdown run over all registered consumers.
    ShutdownConsumers,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NsmReply {
    Status { status: ErrorStatus },
    LucRequired { required: bool },
    Error { message: String },
}
