// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Target startup monitor.
//!
//! Watches the supervisor's `job-removed` stream for a small set of
//! well-known targets and publishes the matching node state whenever one of
//! them reports active. The mandatory early-boot target is already up before
//! this daemon starts, so construction immediately publishes `BaseRunning`.

use crate::proxies::{LifecycleControlProxy, ManagerProxy};
use nsc_core::{ErrorStatus, JobRemoved, NodeState, UnitName};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Maps target activations to node-state updates.
pub struct TargetStartupMonitor {
    manager: Arc<dyn ManagerProxy>,
    lifecycle: Arc<dyn LifecycleControlProxy>,
    targets_to_states: HashMap<UnitName, NodeState>,
}

impl TargetStartupMonitor {
    /// Create the monitor and spawn its event loop.
    pub fn spawn(
        manager: Arc<dyn ManagerProxy>,
        lifecycle: Arc<dyn LifecycleControlProxy>,
    ) -> Arc<Self> {
        let targets_to_states = HashMap::from([
            (UnitName::new("focussed.target"), NodeState::LucRunning),
            (UnitName::new("unfocussed.target"), NodeState::FullyRunning),
            (UnitName::new("lazy.target"), NodeState::FullyOperational),
        ]);
        let events = manager.job_removed_events();
        let monitor = Arc::new(Self { manager, lifecycle, targets_to_states });
        tokio::spawn(Arc::clone(&monitor).run(events));
        monitor
    }

    async fn run(self: Arc<Self>, mut events: broadcast::Receiver<JobRemoved>) {
        self.set_node_state(NodeState::BaseRunning).await;
        loop {
            match events.recv().await {
                Ok(event) => self.handle_job_removed(event).await,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "job-removed events dropped, node states may lag");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    async fn handle_job_removed(&self, event: JobRemoved) {
        let Some(&state) = self.targets_to_states.get(&event.unit) else {
            return;
        };

        let object_path = match self.manager.get_unit(&event.unit).await {
            Ok(path) => path,
            Err(error) => {
                tracing::error!(unit = %event.unit, error = %error, "failed to get unit from the supervisor");
                return;
            }
        };
        let active_state = match self.manager.unit_active_state(&object_path).await {
            Ok(state) => state,
            Err(error) => {
                tracing::error!(unit = %event.unit, error = %error, "failed to read the unit's active state");
                return;
            }
        };

        tracing::debug!(unit = %event.unit, active_state = %active_state, "target state changed");
        if active_state == "active" {
            self.set_node_state(state).await;
        }
    }

    async fn set_node_state(&self, state: NodeState) {
        match self.lifecycle.set_node_state(state).await {
            Err(error) => {
                tracing::error!(state = %state, error = %error, "failed to set the node state");
            }
            Ok(status) if status != ErrorStatus::Ok => {
                tracing::error!(state = %state, status = %status, "node state manager rejected the node state");
            }
            Ok(_) => {
                tracing::debug!(state = %state, "node state published");
            }
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
