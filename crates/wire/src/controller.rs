// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messages of the surface the daemon itself offers: last-user-context
//! registration, legacy application registration, and inbound lifecycle
//! requests for the shutdown consumers it exports.

use nsc_core::{ErrorStatus, LastUserContext, ShutdownMode, UnitName};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControllerRequest {
    /// Open a last-user-context registration transaction.
    BeginLucRegistration,
    /// Merge a batch of applications into the open transaction.
    RegisterWithLuc { apps: LastUserContext },
    /// Persist the open transaction and close it.
    FinishLucRegistration,
    /// Register a legacy application for supervised shutdown.
    Register {
        unit: UnitName,
        mode: ShutdownMode,
        timeout_ms: u32,
    },
    /// Lifecycle request addressed to an exported shutdown consumer.
    LifecycleRequest {
        object_path: String,
        mode: ShutdownMode,
        request_id: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControllerReply {
    Ok,
    Status { status: ErrorStatus },
    Error { message: String },
}
