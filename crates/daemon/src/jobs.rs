// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job manager: correlates unit operations with their completion events.
//!
//! The supervisor acknowledges a start/stop with a correlation id and only
//! later reports the outcome in a `job-removed` event. The job manager files
//! every accepted request under its id and resolves the caller when the
//! matching event arrives, turning the two-step protocol into a single
//! "operate on unit X and tell me how it went" call.

use crate::proxies::{ManagerProxy, ProxyError};
use nsc_core::{JobId, JobMode, JobRemoved, JobResult, UnitName};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;

/// Outcome of a start or stop, delivered exactly once per call.
#[derive(Debug)]
pub struct JobCompletion {
    pub unit: UnitName,
    pub result: JobResult,
    /// Transport error, when the request never reached a completion event.
    pub error: Option<ProxyError>,
}

impl JobCompletion {
    fn finished(unit: UnitName, result: JobResult) -> Self {
        Self { unit, result, error: None }
    }

    fn canceled(unit: UnitName) -> Self {
        Self { unit, result: JobResult::Canceled, error: None }
    }

    fn failed(unit: UnitName, error: ProxyError) -> Self {
        Self { unit, result: JobResult::Failed, error: Some(error) }
    }

    /// True when the unit operation did not succeed: the supervisor reported
    /// `failed` or the request died at the transport.
    pub fn is_failure(&self) -> bool {
        self.result.is_failed() || self.error.is_some()
    }
}

enum JobOp {
    Start,
    Stop,
}

struct PendingJob {
    unit: UnitName,
    complete: oneshot::Sender<JobCompletion>,
}

/// Async proxy to the supervisor for unit start/stop jobs.
pub struct JobManager {
    manager: Arc<dyn ManagerProxy>,
    jobs: Mutex<HashMap<JobId, PendingJob>>,
}

impl JobManager {
    /// Create the job manager and spawn its completion pump on the
    /// supervisor's `job-removed` stream.
    pub fn new(manager: Arc<dyn ManagerProxy>) -> Arc<Self> {
        let events = manager.job_removed_events();
        let job_manager = Arc::new(Self { manager, jobs: Mutex::new(HashMap::new()) });
        tokio::spawn(Self::pump(Arc::clone(&job_manager), events));
        job_manager
    }

    /// Start `unit`, resolving when the supervisor reports the job gone.
    pub async fn start(&self, unit: UnitName, cancel: CancellationToken) -> JobCompletion {
        self.run(JobOp::Start, unit, cancel).await
    }

    /// Stop `unit`, resolving when the supervisor reports the job gone.
    pub async fn stop(&self, unit: UnitName, cancel: CancellationToken) -> JobCompletion {
        self.run(JobOp::Stop, unit, cancel).await
    }

    async fn run(&self, op: JobOp, unit: UnitName, cancel: CancellationToken) -> JobCompletion {
        let operation = match op {
            JobOp::Start => "start_unit",
            JobOp::Stop => "stop_unit",
        };
        let request = async {
            match op {
                JobOp::Start => self.manager.start_unit(&unit, JobMode::Fail).await,
                JobOp::Stop => self.manager.stop_unit(&unit, JobMode::Fail).await,
            }
        };

        let accepted = tokio::select! {
            _ = cancel.cancelled() => None,
            accepted = request => Some(accepted),
        };
        let job = match accepted {
            None => return JobCompletion::canceled(unit),
            Some(Err(error)) => {
                tracing::error!(unit = %unit, error = %error, "unit job request failed");
                return JobCompletion::failed(unit, error);
            }
            Some(Ok(job)) => job,
        };

        let (tx, rx) = oneshot::channel();
        {
            let mut jobs = self.jobs.lock();
            if jobs.contains_key(&job) {
                // Two live jobs under one correlation id is a programming
                // error on the supervisor side; the first one wins.
                tracing::error!(job = %job, unit = %unit, "job id already tracked, dropping the new job");
                return JobCompletion::failed(
                    unit,
                    ProxyError::new(operation, "duplicate job correlation id"),
                );
            }
            jobs.insert(job.clone(), PendingJob { unit: unit.clone(), complete: tx });
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                self.jobs.lock().remove(&job);
                JobCompletion::canceled(unit)
            }
            completion = rx => completion.unwrap_or_else(|_| {
                JobCompletion::failed(unit, ProxyError::new(operation, "completion channel closed"))
            }),
        }
    }

    async fn pump(this: Arc<Self>, mut events: broadcast::Receiver<JobRemoved>) {
        loop {
            match events.recv().await {
                Ok(event) => this.complete(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "job-removed events dropped, completions may stall");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    fn complete(&self, event: JobRemoved) {
        // Events for jobs we never issued belong to other supervisor clients.
        let Some(pending) = self.jobs.lock().remove(&event.job) else {
            return;
        };
        let _ = pending
            .complete
            .send(JobCompletion::finished(pending.unit, event.result));
    }

    /// Number of jobs awaiting their completion event.
    pub fn in_flight(&self) -> usize {
        self.jobs.lock().len()
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
