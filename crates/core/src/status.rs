// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node state manager status and node-state enumerations.
//!
//! The numeric values are part of the external protocol and must not change.

/// Status code returned by node state manager operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(i32)]
pub enum ErrorStatus {
    NotSet = 0,
    Ok = 1,
    Error = 2,
    Dbus = 3,
    Internal = 4,
    Parameter = 5,
    WrongSession = 6,
    ResponsePending = 7,
    Last = 8,
}

impl ErrorStatus {
    pub const fn raw(self) -> i32 {
        self as i32
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::NotSet),
            1 => Some(Self::Ok),
            2 => Some(Self::Error),
            3 => Some(Self::Dbus),
            4 => Some(Self::Internal),
            5 => Some(Self::Parameter),
            6 => Some(Self::WrongSession),
            7 => Some(Self::ResponsePending),
            8 => Some(Self::Last),
            _ => None,
        }
    }
}

crate::simple_display! {
    ErrorStatus {
        NotSet => "not-set",
        Ok => "ok",
        Error => "error",
        Dbus => "dbus",
        Internal => "internal",
        Parameter => "parameter",
        WrongSession => "wrong-session",
        ResponsePending => "response-pending",
        Last => "last",
    }
}

/// Coarse node progress code published to the node state manager as
/// well-known targets become active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(i32)]
pub enum NodeState {
    NotSet = 0,
    StartUp = 1,
    BaseRunning = 2,
    LucRunning = 3,
    FullyRunning = 4,
    FullyOperational = 5,
    ShuttingDown = 6,
    ShutdownDelay = 7,
    FastShutdown = 8,
    DegradedPower = 9,
    Shutdown = 10,
    Last = 11,
}

impl NodeState {
    pub const fn raw(self) -> i32 {
        self as i32
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::NotSet),
            1 => Some(Self::StartUp),
            2 => Some(Self::BaseRunning),
            3 => Some(Self::LucRunning),
            4 => Some(Self::FullyRunning),
            5 => Some(Self::FullyOperational),
            6 => Some(Self::ShuttingDown),
            7 => Some(Self::ShutdownDelay),
            8 => Some(Self::FastShutdown),
            9 => Some(Self::DegradedPower),
            10 => Some(Self::Shutdown),
            11 => Some(Self::Last),
            _ => None,
        }
    }
}

crate::simple_display! {
    NodeState {
        NotSet => "not-set",
        StartUp => "start-up",
        BaseRunning => "base-running",
        LucRunning => "luc-running",
        FullyRunning => "fully-running",
        FullyOperational => "fully-operational",
        ShuttingDown => "shutting-down",
        ShutdownDelay => "shutdown-delay",
        FastShutdown => "fast-shutdown",
        DegradedPower => "degraded-power",
        Shutdown => "shutdown",
        Last => "last",
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
