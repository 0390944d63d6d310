// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle-control service of the dummy.

use nsc_core::{ErrorStatus, NodeState};
use parking_lot::Mutex;

struct ControlState {
    /// When false, node-state updates are refused with `Error`.
    accept_state: bool,
    /// Answer handed out by `check_luc_required`.
    luc_required: bool,
    node_state: NodeState,
    history: Vec<NodeState>,
}

/// Records node states and answers the LUC-required query.
pub struct LifecycleControlService {
    state: Mutex<ControlState>,
}

impl Default for LifecycleControlService {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleControlService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ControlState {
                accept_state: true,
                luc_required: true,
                node_state: NodeState::NotSet,
                history: Vec::new(),
            }),
        }
    }

    /// Accept a raw node-state value. Out-of-range values are rejected with
    /// `Parameter`.
    pub fn set_node_state(&self, raw: i32) -> ErrorStatus {
        let Some(node_state) = NodeState::from_raw(raw) else {
            tracing::error!(raw, "rejecting out-of-range node state");
            return ErrorStatus::Parameter;
        };

        let mut state = self.state.lock();
        if !state.accept_state {
            return ErrorStatus::Error;
        }
        tracing::info!(state = %node_state, "node state set");
        state.node_state = node_state;
        state.history.push(node_state);
        ErrorStatus::Ok
    }

    pub fn check_luc_required(&self) -> bool {
        self.state.lock().luc_required
    }

    pub fn set_luc_required(&self, required: bool) {
        self.state.lock().luc_required = required;
    }

    pub fn set_accept_state(&self, accept: bool) {
        self.state.lock().accept_state = accept;
    }

    pub fn node_state(&self) -> NodeState {
        self.state.lock().node_state
    }

    /// Every accepted node state, in order.
    pub fn history(&self) -> Vec<NodeState> {
        self.state.lock().history.clone()
    }
}

#[cfg(test)]
#[path = "lifecycle_control_tests.rs"]
mod tests;
