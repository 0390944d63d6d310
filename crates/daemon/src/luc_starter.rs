// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered, cancelable restore of the last user context.
//!
//! Units are grouped by application type. Groups start one after another in
//! priority order; the units inside a group start concurrently. A single
//! failing unit never aborts the restore.

use crate::jobs::JobManager;
use crate::proxies::LifecycleControlProxy;
use crate::registry::LucRegistry;
use nsc_core::{LucType, UnitName};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct StartState {
    /// Group tags still to start; the head is the currently draining group.
    order: Vec<LucType>,
    groups: HashMap<LucType, Vec<UnitName>>,
}

/// Restores the last user context after boot.
pub struct LucStarter {
    job_manager: Arc<JobManager>,
    registry: Arc<LucRegistry>,
    lifecycle: Option<Arc<dyn LifecycleControlProxy>>,
    /// Application types started first, in this order.
    prioritised: Vec<LucType>,
    state: Mutex<StartState>,
    /// Cancel handle per unit whose start is outstanding.
    cancellables: Mutex<HashMap<UnitName, CancellationToken>>,
    started: Notify,
}

impl LucStarter {
    pub fn new(
        job_manager: Arc<JobManager>,
        registry: Arc<LucRegistry>,
        lifecycle: Option<Arc<dyn LifecycleControlProxy>>,
        prioritised: Vec<LucType>,
    ) -> Arc<Self> {
        Arc::new(Self {
            job_manager,
            registry,
            lifecycle,
            prioritised,
            state: Mutex::new(StartState::default()),
            cancellables: Mutex::new(HashMap::new()),
            started: Notify::new(),
        })
    }

    /// Resolves once the restore has settled: completed, skipped because the
    /// context is not required, or cancelled to completion.
    pub async fn luc_groups_started(&self) {
        self.started.notified().await;
    }

    /// Run the restore. Emits `luc_groups_started` exactly once, except when
    /// reading the persisted context fails.
    pub async fn start_groups(self: &Arc<Self>) {
        if !self.check_luc_required().await {
            tracing::info!("last user context not required");
            self.started.notify_one();
            return;
        }

        tracing::info!(prioritised = ?self.prioritised, "restoring the last user context");
        let context = match self.registry.read() {
            Ok(context) => context,
            Err(error) => {
                // No notification on this path; the restore never ran.
                tracing::error!(error = %error, "error reading last user context");
                return;
            }
        };

        self.cancellables.lock().clear();
        {
            let mut state = self.state.lock();
            state.groups = context.iter().map(|(ty, units)| (ty, units.to_vec())).collect();
            let mut order: Vec<LucType> = state.groups.keys().copied().collect();
            order.sort_unstable();
            order.sort_by_key(|ty| self.priority_index(*ty));
            state.order = order;
        }

        loop {
            let Some(group) = self.state.lock().order.first().copied() else {
                break;
            };
            let units = self.state.lock().groups.get(&group).cloned().unwrap_or_default();
            if units.is_empty() {
                let mut state = self.state.lock();
                state.groups.remove(&group);
                if state.order.first() == Some(&group) {
                    state.order.remove(0);
                }
                continue;
            }
            tracing::debug!(group, "starting group");

            let starts: Vec<_> = units
                .into_iter()
                .map(|unit| {
                    let token = CancellationToken::new();
                    self.cancellables.lock().insert(unit.clone(), token.clone());
                    let this = Arc::clone(self);
                    async move {
                        tracing::debug!(unit = %unit, "starting application");
                        let completion = this.job_manager.start(unit.clone(), token).await;
                        if completion.is_failure() {
                            tracing::error!(
                                unit = %unit,
                                result = %completion.result,
                                "failed to start a last user context application"
                            );
                        }
                        this.finish_unit(&unit);
                    }
                })
                .collect();
            futures_util::future::join_all(starts).await;
        }

        tracing::debug!("last user context groups started");
        self.started.notify_one();
    }

    /// Cancel every outstanding start. The restore still runs to completion
    /// through the regular completion path.
    pub fn cancel(&self) {
        for (unit, token) in self.cancellables.lock().iter() {
            tracing::debug!(unit = %unit, "cancelling start");
            token.cancel();
        }
    }

    async fn check_luc_required(&self) -> bool {
        let Some(lifecycle) = &self.lifecycle else {
            tracing::error!("node state manager unavailable, restoring the last user context unconditionally");
            return true;
        };
        match lifecycle.check_luc_required().await {
            Ok(required) => required,
            Err(error) => {
                tracing::error!(error = %error, "failed checking whether the last user context is required");
                tracing::info!("assuming the last user context should be restored");
                true
            }
        }
    }

    fn priority_index(&self, luc_type: LucType) -> usize {
        self.prioritised.iter().position(|ty| *ty == luc_type).unwrap_or(usize::MAX)
    }

    /// Book-keeping when a unit's start resolves: drop its cancel handle,
    /// remove it from the head group, and retire the group once empty.
    fn finish_unit(&self, unit: &UnitName) {
        self.cancellables.lock().remove(unit);

        let mut state = self.state.lock();
        let Some(&group) = state.order.first() else {
            return;
        };
        let Some(units) = state.groups.get_mut(&group) else {
            return;
        };
        if let Some(pos) = units.iter().position(|u| u == unit) {
            units.remove(pos);
        }
        if units.is_empty() {
            state.groups.remove(&group);
            state.order.remove(0);
            tracing::debug!(group, "group finished");
        }
    }

    /// Number of starts whose completion is still outstanding.
    pub fn outstanding_starts(&self) -> usize {
        self.cancellables.lock().len()
    }

    /// Snapshot of the remaining group order.
    pub fn start_order(&self) -> Vec<LucType> {
        self.state.lock().order.clone()
    }
}

#[cfg(test)]
#[path = "luc_starter_tests.rs"]
mod tests;
