// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::proxies::fake::FakeManager;
use nsc_core::JobRemoved;

#[tokio::test]
async fn start_resolves_with_the_completion_event_result() {
    let manager = FakeManager::new();
    let jobs = JobManager::new(manager.clone());

    let handle = tokio::spawn({
        let jobs = Arc::clone(&jobs);
        async move { jobs.start(UnitName::new("app.service"), CancellationToken::new()).await }
    });

    manager.wait_for_pending(1).await;
    assert!(manager.complete("app.service", JobResult::Done));

    let completion = handle.await.unwrap();
    assert_eq!(completion.unit, "app.service");
    assert_eq!(completion.result, JobResult::Done);
    assert!(!completion.is_failure());
    assert_eq!(jobs.in_flight(), 0);
}

#[tokio::test]
async fn stop_reports_a_failed_job() {
    let manager = FakeManager::new();
    let jobs = JobManager::new(manager.clone());

    let handle = tokio::spawn({
        let jobs = Arc::clone(&jobs);
        async move { jobs.stop(UnitName::new("app.service"), CancellationToken::new()).await }
    });

    manager.wait_for_pending(1).await;
    assert!(manager.complete("app.service", JobResult::Failed));

    let completion = handle.await.unwrap();
    assert_eq!(completion.result, JobResult::Failed);
    assert!(completion.is_failure());
    assert_eq!(manager.stopped_units(), vec![UnitName::new("app.service")]);
}

#[tokio::test]
async fn synchronous_request_failure_resolves_as_failed() {
    let manager = FakeManager::new();
    let jobs = JobManager::new(manager.clone());
    manager.fail_next_job_call("supervisor gone");

    let completion = jobs.start(UnitName::new("app.service"), CancellationToken::new()).await;

    assert_eq!(completion.result, JobResult::Failed);
    let error = completion.error.expect("should carry the transport error");
    assert!(error.message.contains("supervisor gone"));
    assert_eq!(jobs.in_flight(), 0);
}

#[tokio::test]
async fn unknown_completion_events_are_ignored() {
    let manager = FakeManager::new();
    let jobs = JobManager::new(manager.clone());

    let handle = tokio::spawn({
        let jobs = Arc::clone(&jobs);
        async move { jobs.start(UnitName::new("app.service"), CancellationToken::new()).await }
    });
    manager.wait_for_pending(1).await;

    // A completion for some other supervisor client.
    manager.emit(JobRemoved {
        id: 999,
        job: JobId::new("/job/other"),
        unit: UnitName::new("other.service"),
        result: JobResult::Done,
    });
    tokio::task::yield_now().await;
    assert_eq!(jobs.in_flight(), 1);

    assert!(manager.complete("app.service", JobResult::Done));
    let completion = handle.await.unwrap();
    assert_eq!(completion.result, JobResult::Done);
}

#[tokio::test]
async fn duplicate_correlation_ids_keep_the_original_job() {
    let manager = FakeManager::new();
    let jobs = JobManager::new(manager.clone());
    manager.force_job_id(JobId::new("/job/dup"));

    let first = tokio::spawn({
        let jobs = Arc::clone(&jobs);
        async move { jobs.start(UnitName::new("first.service"), CancellationToken::new()).await }
    });
    manager.wait_for_pending(1).await;

    // Same correlation id again: the new job is dropped immediately.
    let second = jobs.start(UnitName::new("second.service"), CancellationToken::new()).await;
    assert_eq!(second.result, JobResult::Failed);
    assert!(second.error.is_some());

    // The original still completes normally.
    assert!(manager.complete("first.service", JobResult::Done));
    let completion = first.await.unwrap();
    assert_eq!(completion.unit, "first.service");
    assert_eq!(completion.result, JobResult::Done);
}

#[tokio::test]
async fn cancellation_resolves_with_canceled_and_clears_the_table() {
    let manager = FakeManager::new();
    let jobs = JobManager::new(manager.clone());
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let jobs = Arc::clone(&jobs);
        let cancel = cancel.clone();
        async move { jobs.start(UnitName::new("app.service"), cancel).await }
    });
    manager.wait_for_pending(1).await;

    cancel.cancel();
    let completion = handle.await.unwrap();
    assert_eq!(completion.result, JobResult::Canceled);
    assert_eq!(jobs.in_flight(), 0);

    // The late completion event now matches nothing and is ignored.
    assert!(manager.complete("app.service", JobResult::Done));
    tokio::task::yield_now().await;
    assert_eq!(jobs.in_flight(), 0);
}

#[tokio::test]
async fn cancelling_twice_is_a_noop() {
    let manager = FakeManager::new();
    let jobs = JobManager::new(manager.clone());
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let jobs = Arc::clone(&jobs);
        let cancel = cancel.clone();
        async move { jobs.start(UnitName::new("app.service"), cancel).await }
    });
    manager.wait_for_pending(1).await;

    cancel.cancel();
    cancel.cancel();
    let completion = handle.await.unwrap();
    assert_eq!(completion.result, JobResult::Canceled);
}

#[tokio::test]
async fn concurrent_jobs_resolve_independently() {
    let manager = FakeManager::new();
    let jobs = JobManager::new(manager.clone());

    let a = tokio::spawn({
        let jobs = Arc::clone(&jobs);
        async move { jobs.start(UnitName::new("a.service"), CancellationToken::new()).await }
    });
    let b = tokio::spawn({
        let jobs = Arc::clone(&jobs);
        async move { jobs.start(UnitName::new("b.service"), CancellationToken::new()).await }
    });
    manager.wait_for_pending(2).await;

    assert!(manager.complete("b.service", JobResult::Failed));
    assert!(manager.complete("a.service", JobResult::Done));

    assert_eq!(a.await.unwrap().result, JobResult::Done);
    assert_eq!(b.await.unwrap().result, JobResult::Failed);
}
