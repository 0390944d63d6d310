// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory recording proxies for tests.
//!
//! `FakeManager` stands in for the service supervisor: it records every call
//! in order, mints correlation ids, and lets tests complete accepted jobs by
//! hand (or automatically). `FakeNsm` records the node state manager side.

use super::{LifecycleControlProxy, ManagerProxy, NsmConsumerProxy, ProxyError};
use async_trait::async_trait;
use nsc_core::{ErrorStatus, JobId, JobMode, JobRemoved, JobResult, NodeState, ShutdownMode, UnitName};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A recorded call on the fake supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerCall {
    Subscribe,
    Start(UnitName),
    Stop(UnitName),
    Restart(UnitName),
    Kill(UnitName),
    GetUnit(UnitName),
    ActiveState(String),
    Ready,
    WatchdogPing,
}

#[derive(Debug, Clone)]
struct AcceptedJob {
    id: u32,
    job: JobId,
    unit: UnitName,
}

#[derive(Default)]
struct FakeManagerState {
    next_id: u32,
    calls: Vec<ManagerCall>,
    accepted: Vec<AcceptedJob>,
    /// When set, accepted jobs complete immediately with this result.
    auto_result: Option<JobResult>,
    /// When set, the next start/stop/restart fails at the transport.
    fail_next_job_call: Option<String>,
    /// When set, every accepted job reuses this correlation id.
    forced_job_id: Option<JobId>,
    unit_paths: HashMap<UnitName, String>,
    active_states: HashMap<String, String>,
    fail_get_unit: bool,
    fail_active_state: bool,
    fail_subscribe: bool,
}

/// Recording stand-in for the supervisor's manager interface.
pub struct FakeManager {
    events: broadcast::Sender<JobRemoved>,
    state: Mutex<FakeManagerState>,
    changed: Notify,
}

impl FakeManager {
    /// A fake whose accepted jobs stay pending until completed by the test.
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self { events, state: Mutex::new(FakeManagerState::default()), changed: Notify::new() })
    }

    /// A fake whose accepted jobs complete immediately with `result`.
    pub fn auto(result: JobResult) -> Arc<Self> {
        let fake = Self::new();
        fake.state.lock().auto_result = Some(result);
        fake
    }

    pub fn set_auto_result(&self, result: Option<JobResult>) {
        self.state.lock().auto_result = result;
    }

    pub fn fail_next_job_call(&self, message: impl Into<String>) {
        self.state.lock().fail_next_job_call = Some(message.into());
    }

    pub fn force_job_id(&self, job: JobId) {
        self.state.lock().forced_job_id = Some(job);
    }

    pub fn fail_subscribe(&self) {
        self.state.lock().fail_subscribe = true;
    }

    pub fn set_unit_path(&self, unit: impl Into<UnitName>, object_path: impl Into<String>) {
        self.state.lock().unit_paths.insert(unit.into(), object_path.into());
    }

    pub fn set_active_state(&self, object_path: impl Into<String>, state: impl Into<String>) {
        self.state.lock().active_states.insert(object_path.into(), state.into());
    }

    pub fn set_fail_get_unit(&self, fail: bool) {
        self.state.lock().fail_get_unit = fail;
    }

    pub fn set_fail_active_state(&self, fail: bool) {
        self.state.lock().fail_active_state = fail;
    }

    pub fn calls(&self) -> Vec<ManagerCall> {
        self.state.lock().calls.clone()
    }

    pub fn started_units(&self) -> Vec<UnitName> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ManagerCall::Start(unit) => Some(unit.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn stopped_units(&self) -> Vec<UnitName> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ManagerCall::Stop(unit) => Some(unit.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn ready_count(&self) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == ManagerCall::Ready).count()
    }

    pub fn pending_units(&self) -> Vec<UnitName> {
        self.state.lock().accepted.iter().map(|job| job.unit.clone()).collect()
    }

    /// Complete the oldest pending job for `unit`.
    pub fn complete(&self, unit: &str, result: JobResult) -> bool {
        let job = {
            let mut state = self.state.lock();
            match state.accepted.iter().position(|job| job.unit == unit) {
                Some(pos) => state.accepted.remove(pos),
                None => return false,
            }
        };
        self.emit(JobRemoved { id: job.id, job: job.job, unit: job.unit, result });
        true
    }

    /// Push a raw `job-removed` event, matching nothing the fake accepted.
    pub fn emit(&self, event: JobRemoved) {
        let _ = self.events.send(event);
    }

    /// Wait until at least `n` jobs are pending.
    pub async fn wait_for_pending(&self, n: usize) {
        loop {
            let notified = self.changed.notified();
            if self.state.lock().accepted.len() >= n {
                return;
            }
            notified.await;
        }
    }

    /// Wait until a job for `unit` is pending.
    pub async fn wait_for_pending_unit(&self, unit: &str) {
        loop {
            let notified = self.changed.notified();
            if self.state.lock().accepted.iter().any(|job| job.unit == unit) {
                return;
            }
            notified.await;
        }
    }

    /// Wait until at least `n` calls of any kind were recorded.
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            let notified = self.changed.notified();
            if self.state.lock().calls.len() >= n {
                return;
            }
            notified.await;
        }
    }

    fn accept_job(
        &self,
        call: ManagerCall,
        unit: &UnitName,
        operation: &'static str,
    ) -> Result<JobId, ProxyError> {
        let (job, auto) = {
            let mut state = self.state.lock();
            state.calls.push(call);
            if let Some(message) = state.fail_next_job_call.take() {
                self.changed.notify_waiters();
                return Err(ProxyError::new(operation, message));
            }
            state.next_id += 1;
            let id = state.next_id;
            let job = state
                .forced_job_id
                .clone()
                .unwrap_or_else(|| JobId::new(format!("/job/{id}")));
            let accepted = AcceptedJob { id, job: job.clone(), unit: unit.clone() };
            state.accepted.push(accepted);
            (job, state.auto_result)
        };
        self.changed.notify_waiters();

        if let Some(result) = auto {
            // Deferred so the caller can file the correlation id first, the
            // way a real supervisor replies before the job terminates.
            let taken = {
                let mut state = self.state.lock();
                let pos = state
                    .accepted
                    .iter()
                    .position(|accepted| accepted.job == job && accepted.unit == *unit);
                pos.map(|pos| state.accepted.remove(pos))
            };
            if let Some(accepted) = taken {
                let events = self.events.clone();
                tokio::spawn(async move {
                    let _ = events.send(JobRemoved {
                        id: accepted.id,
                        job: accepted.job,
                        unit: accepted.unit,
                        result,
                    });
                });
            }
        }
        Ok(job)
    }
}

#[async_trait]
impl ManagerProxy for FakeManager {
    async fn subscribe(&self) -> Result<(), ProxyError> {
        let fail = {
            let mut state = self.state.lock();
            state.calls.push(ManagerCall::Subscribe);
            state.fail_subscribe
        };
        self.changed.notify_waiters();
        if fail {
            return Err(ProxyError::new("subscribe", "supervisor unavailable"));
        }
        Ok(())
    }

    fn job_removed_events(&self) -> broadcast::Receiver<JobRemoved> {
        self.events.subscribe()
    }

    async fn start_unit(&self, unit: &UnitName, _mode: JobMode) -> Result<JobId, ProxyError> {
        self.accept_job(ManagerCall::Start(unit.clone()), unit, "start_unit")
    }

    async fn stop_unit(&self, unit: &UnitName, _mode: JobMode) -> Result<JobId, ProxyError> {
        self.accept_job(ManagerCall::Stop(unit.clone()), unit, "stop_unit")
    }

    async fn restart_unit(&self, unit: &UnitName, _mode: JobMode) -> Result<JobId, ProxyError> {
        self.accept_job(ManagerCall::Restart(unit.clone()), unit, "restart_unit")
    }

    async fn kill_unit(&self, unit: &UnitName, _signal: i32) -> Result<(), ProxyError> {
        self.state.lock().calls.push(ManagerCall::Kill(unit.clone()));
        self.changed.notify_waiters();
        Ok(())
    }

    async fn get_unit(&self, unit: &UnitName) -> Result<String, ProxyError> {
        let result = {
            let mut state = self.state.lock();
            state.calls.push(ManagerCall::GetUnit(unit.clone()));
            if state.fail_get_unit {
                Err(ProxyError::new("get_unit", "no such unit"))
            } else {
                state
                    .unit_paths
                    .get(unit)
                    .cloned()
                    .ok_or_else(|| ProxyError::new("get_unit", format!("unit {unit} not loaded")))
            }
        };
        self.changed.notify_waiters();
        result
    }

    async fn unit_active_state(&self, object_path: &str) -> Result<String, ProxyError> {
        let result = {
            let mut state = self.state.lock();
            state.calls.push(ManagerCall::ActiveState(object_path.to_owned()));
            if state.fail_active_state {
                Err(ProxyError::new("unit_active_state", "proxy failed"))
            } else {
                state
                    .active_states
                    .get(object_path)
                    .cloned()
                    .ok_or_else(|| ProxyError::new("unit_active_state", "unknown object path"))
            }
        };
        self.changed.notify_waiters();
        result
    }

    async fn ready(&self) -> Result<(), ProxyError> {
        self.state.lock().calls.push(ManagerCall::Ready);
        self.changed.notify_waiters();
        Ok(())
    }

    async fn watchdog_ping(&self) -> Result<(), ProxyError> {
        self.state.lock().calls.push(ManagerCall::WatchdogPing);
        self.changed.notify_waiters();
        Ok(())
    }
}

/// A registration recorded by [`FakeNsm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRecord {
    pub bus_name: String,
    pub object_path: String,
    pub mode: ShutdownMode,
    pub timeout_ms: u32,
}

#[derive(Default)]
struct FakeNsmState {
    registrations: Vec<RegistrationRecord>,
    unregistrations: Vec<(String, String, ShutdownMode)>,
    completions: Vec<(u32, ErrorStatus)>,
    node_states: Vec<NodeState>,
    luc_required: Option<bool>,
    fail_check_luc: bool,
    fail_unregister: bool,
    register_status: Option<ErrorStatus>,
}

/// Recording stand-in for the node state manager.
pub struct FakeNsm {
    state: Mutex<FakeNsmState>,
    changed: Notify,
}

impl FakeNsm {
    pub fn new() -> Arc<Self> {
        let mut state = FakeNsmState::default();
        state.luc_required = Some(true);
        Arc::new(Self { state: Mutex::new(state), changed: Notify::new() })
    }

    pub fn set_luc_required(&self, required: bool) {
        self.state.lock().luc_required = Some(required);
    }

    pub fn fail_check_luc_required(&self) {
        self.state.lock().fail_check_luc = true;
    }

    pub fn fail_unregister(&self) {
        self.state.lock().fail_unregister = true;
    }

    pub fn set_register_status(&self, status: ErrorStatus) {
        self.state.lock().register_status = Some(status);
    }

    pub fn registrations(&self) -> Vec<RegistrationRecord> {
        self.state.lock().registrations.clone()
    }

    pub fn unregistrations(&self) -> Vec<(String, String, ShutdownMode)> {
        self.state.lock().unregistrations.clone()
    }

    pub fn completions(&self) -> Vec<(u32, ErrorStatus)> {
        self.state.lock().completions.clone()
    }

    pub fn node_states(&self) -> Vec<NodeState> {
        self.state.lock().node_states.clone()
    }

    /// Wait until at least `n` lifecycle completions were reported.
    pub async fn wait_for_completions(&self, n: usize) {
        loop {
            let notified = self.changed.notified();
            if self.state.lock().completions.len() >= n {
                return;
            }
            notified.await;
        }
    }

    /// Wait until at least `n` node states were published.
    pub async fn wait_for_node_states(&self, n: usize) {
        loop {
            let notified = self.changed.notified();
            if self.state.lock().node_states.len() >= n {
                return;
            }
            notified.await;
        }
    }

    /// Wait until at least `n` unregistrations were recorded.
    pub async fn wait_for_unregistrations(&self, n: usize) {
        loop {
            let notified = self.changed.notified();
            if self.state.lock().unregistrations.len() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl NsmConsumerProxy for FakeNsm {
    async fn register_shutdown_client(
        &self,
        bus_name: &str,
        object_path: &str,
        mode: ShutdownMode,
        timeout_ms: u32,
    ) -> Result<ErrorStatus, ProxyError> {
        let status = {
            let mut state = self.state.lock();
            state.registrations.push(RegistrationRecord {
                bus_name: bus_name.to_owned(),
                object_path: object_path.to_owned(),
                mode,
                timeout_ms,
            });
            state.register_status.unwrap_or(ErrorStatus::Ok)
        };
        self.changed.notify_waiters();
        Ok(status)
    }

    async fn unregister_shutdown_client(
        &self,
        bus_name: &str,
        object_path: &str,
        mode: ShutdownMode,
    ) -> Result<ErrorStatus, ProxyError> {
        let fail = {
            let mut state = self.state.lock();
            state.unregistrations.push((bus_name.to_owned(), object_path.to_owned(), mode));
            state.fail_unregister
        };
        self.changed.notify_waiters();
        if fail {
            return Err(ProxyError::new("unregister_shutdown_client", "nsm unavailable"));
        }
        Ok(ErrorStatus::Ok)
    }

    async fn lifecycle_request_complete(
        &self,
        request_id: u32,
        status: ErrorStatus,
    ) -> Result<ErrorStatus, ProxyError> {
        self.state.lock().completions.push((request_id, status));
        self.changed.notify_waiters();
        Ok(ErrorStatus::Ok)
    }
}

#[async_trait]
impl LifecycleControlProxy for FakeNsm {
    async fn set_node_state(&self, state: NodeState) -> Result<ErrorStatus, ProxyError> {
        self.state.lock().node_states.push(state);
        self.changed.notify_waiters();
        Ok(ErrorStatus::Ok)
    }

    async fn check_luc_required(&self) -> Result<bool, ProxyError> {
        let state = self.state.lock();
        if state.fail_check_luc {
            return Err(ProxyError::new("check_luc_required", "nsm unavailable"));
        }
        Ok(state.luc_required.unwrap_or(true))
    }
}
