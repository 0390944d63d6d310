// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor job types.
//!
//! A job is the supervisor's handle for an accepted start/stop request. The
//! supervisor assigns a correlation id when the request is accepted and echoes
//! it in the `job-removed` event once the job terminates, which is the only
//! way to learn the outcome of a unit operation.

use crate::unit::UnitName;
use smol_str::SmolStr;

/// Opaque job correlation id assigned by the supervisor.
///
/// Unique per in-flight job; echoed verbatim in the completion event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct JobId(SmolStr);

impl JobId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(SmolStr::new(id.as_ref()))
    }

    /// Mint a fresh random id. Only the supervisor side mints ids; this is
    /// for in-memory supervisors used in tests.
    pub fn random() -> Self {
        Self(SmolStr::new(format!("job-{}", nanoid::nanoid!(19))))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// How the supervisor should treat conflicting jobs for the same unit.
///
/// `Fail` rejects the new request instead of queueing it and is what the
/// daemon uses for every unit operation. `Isolate` turns a start into an
/// isolate request for target units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    Fail,
    Replace,
    Isolate,
}

crate::simple_display! {
    JobMode {
        Fail => "fail",
        Replace => "replace",
        Isolate => "isolate",
    }
}

/// Completion code reported by the supervisor when a job leaves the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobResult {
    Done,
    Canceled,
    Timeout,
    Failed,
    Dependency,
    Skipped,
}

impl JobResult {
    pub fn is_failed(self) -> bool {
        self == JobResult::Failed
    }
}

crate::simple_display! {
    JobResult {
        Done => "done",
        Canceled => "canceled",
        Timeout => "timeout",
        Failed => "failed",
        Dependency => "dependency",
        Skipped => "skipped",
    }
}

/// The supervisor's `job-removed` event.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JobRemoved {
    /// Numeric job id, unused for correlation.
    pub id: u32,
    /// Correlation id returned by the accepting start/stop call.
    pub job: JobId,
    pub unit: UnitName,
    pub result: JobResult,
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
