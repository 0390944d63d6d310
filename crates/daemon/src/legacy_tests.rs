// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::proxies::fake::{FakeManager, FakeNsm};
use nsc_core::JobResult;

struct Setup {
    manager: Arc<FakeManager>,
    nsm: Arc<FakeNsm>,
    consumers: Arc<ConsumerTable>,
    handler: Arc<LegacyAppHandler>,
}

fn setup() -> Setup {
    let manager = FakeManager::new();
    let nsm = FakeNsm::new();
    let consumers = Arc::new(ConsumerTable::new());
    let jobs = JobManager::new(manager.clone());
    let handler = LegacyAppHandler::new(jobs, nsm.clone(), consumers.clone());
    Setup { manager, nsm, consumers, handler }
}

#[tokio::test]
async fn register_exports_an_endpoint_and_registers_with_the_nsm() {
    let s = setup();
    s.handler.register(UnitName::new("u.service"), ShutdownMode::NORMAL, 500).await;

    let client = s.handler.client_for_unit(&UnitName::new("u.service")).unwrap();
    assert_eq!(client.id, 1);
    assert_eq!(client.bus_name, env::BUS_NAME);
    assert_eq!(client.object_path, format!("{}/1", env::CONSUMER_PATH_PREFIX));
    assert_eq!(client.mode, ShutdownMode::NORMAL);
    assert_eq!(client.timeout, Duration::from_millis(500));

    assert_eq!(
        s.consumers.resolve(&client.object_path),
        Some(ConsumerTarget::LegacyUnit(client.id))
    );

    let registrations = s.nsm.registrations();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].object_path, client.object_path);
    assert_eq!(registrations[0].mode, ShutdownMode::NORMAL);
    assert_eq!(registrations[0].timeout_ms, 500);
    assert!(s.handler.maps_symmetric());
}

#[tokio::test]
async fn invalid_shutdown_modes_are_refused_quietly() {
    let s = setup();

    s.handler.register(UnitName::new("u.service"), ShutdownMode::NONE, 500).await;
    s.handler.register(UnitName::new("u.service"), ShutdownMode::RUNUP, 500).await;
    s.handler
        .register(UnitName::new("u.service"), ShutdownMode::NORMAL | ShutdownMode::RUNUP, 500)
        .await;

    assert_eq!(s.handler.client_count(), 0);
    assert!(s.nsm.registrations().is_empty());
    assert!(s.consumers.is_empty());
}

#[tokio::test]
async fn reregistration_overwrites_mode_and_timeout() {
    let s = setup();

    s.handler.register(UnitName::new("u.service"), ShutdownMode::NORMAL, 500).await;
    s.handler.register(UnitName::new("u.service"), ShutdownMode::FAST, 1200).await;

    // One client, same object path, two NSM registrations.
    assert_eq!(s.handler.client_count(), 1);
    let client = s.handler.client_for_unit(&UnitName::new("u.service")).unwrap();
    assert_eq!(client.mode, ShutdownMode::FAST);
    assert_eq!(client.timeout, Duration::from_millis(1200));

    let registrations = s.nsm.registrations();
    assert_eq!(registrations.len(), 2);
    assert_eq!(registrations[0].object_path, registrations[1].object_path);
    assert_eq!(registrations[1].mode, ShutdownMode::FAST);
    assert_eq!(registrations[1].timeout_ms, 1200);
}

#[tokio::test]
async fn object_path_counter_is_monotonic() {
    let s = setup();

    s.handler.register(UnitName::new("a.service"), ShutdownMode::NORMAL, 100).await;
    s.handler.register(UnitName::new("b.service"), ShutdownMode::FAST, 100).await;
    s.handler.register(UnitName::new("c.service"), ShutdownMode::NORMAL, 100).await;

    let paths: Vec<String> = ["a.service", "b.service", "c.service"]
        .iter()
        .map(|u| s.handler.client_for_unit(&UnitName::new(u)).unwrap().object_path)
        .collect();
    assert_eq!(
        paths,
        vec![
            format!("{}/1", env::CONSUMER_PATH_PREFIX),
            format!("{}/2", env::CONSUMER_PATH_PREFIX),
            format!("{}/3", env::CONSUMER_PATH_PREFIX),
        ]
    );
    assert!(s.handler.maps_symmetric());
}

#[tokio::test]
async fn lifecycle_request_stops_the_unit_and_completes_with_ok() {
    let s = setup();
    s.handler.register(UnitName::new("u.service"), ShutdownMode::NORMAL, 500).await;
    let client = s.handler.client_for_unit(&UnitName::new("u.service")).unwrap();

    let status = s.handler.handle_lifecycle_request(client.id, 42);
    assert_eq!(status, ErrorStatus::ResponsePending);

    s.manager.wait_for_pending(1).await;
    assert_eq!(s.manager.stopped_units(), vec![UnitName::new("u.service")]);
    assert!(s.manager.complete("u.service", JobResult::Done));

    s.nsm.wait_for_completions(1).await;
    assert_eq!(s.nsm.completions(), vec![(42, ErrorStatus::Ok)]);
}

#[tokio::test]
async fn failed_stop_completes_with_error() {
    let s = setup();
    s.handler.register(UnitName::new("u.service"), ShutdownMode::NORMAL, 500).await;
    let client = s.handler.client_for_unit(&UnitName::new("u.service")).unwrap();

    assert_eq!(s.handler.handle_lifecycle_request(client.id, 7), ErrorStatus::ResponsePending);
    s.manager.wait_for_pending(1).await;
    assert!(s.manager.complete("u.service", JobResult::Failed));

    s.nsm.wait_for_completions(1).await;
    assert_eq!(s.nsm.completions(), vec![(7, ErrorStatus::Error)]);
}

#[tokio::test]
async fn lifecycle_request_for_an_unknown_client_returns_error() {
    let s = setup();

    let status = s.handler.handle_lifecycle_request(99, 13);
    assert_eq!(status, ErrorStatus::Error);
    assert!(s.manager.stopped_units().is_empty());
}

#[tokio::test]
async fn deregister_unregisters_every_client_and_clears_the_maps() {
    let s = setup();
    s.handler.register(UnitName::new("a.service"), ShutdownMode::NORMAL, 100).await;
    s.handler.register(UnitName::new("b.service"), ShutdownMode::FAST, 100).await;

    s.handler.deregister_consumers().await;

    assert_eq!(s.nsm.unregistrations().len(), 2);
    assert_eq!(s.handler.client_count(), 0);
    assert!(s.handler.maps_symmetric());
    assert!(s.consumers.is_empty());
}

#[tokio::test]
async fn deregister_continues_past_nsm_failures() {
    let s = setup();
    s.handler.register(UnitName::new("a.service"), ShutdownMode::NORMAL, 100).await;
    s.handler.register(UnitName::new("b.service"), ShutdownMode::FAST, 100).await;
    s.nsm.fail_unregister();

    s.handler.deregister_consumers().await;

    // Both unregistrations were attempted despite the failures.
    assert_eq!(s.nsm.unregistrations().len(), 2);
    assert_eq!(s.handler.client_count(), 0);
}

#[tokio::test]
async fn registration_survives_an_nsm_refusal() {
    let s = setup();
    s.nsm.set_register_status(ErrorStatus::Error);

    s.handler.register(UnitName::new("u.service"), ShutdownMode::NORMAL, 500).await;

    // The local tables keep the client; only the NSM side is degraded.
    assert_eq!(s.handler.client_count(), 1);
    assert!(s.handler.maps_symmetric());
}
