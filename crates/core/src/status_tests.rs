// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn error_status_values_match_the_protocol() {
    assert_eq!(ErrorStatus::NotSet.raw(), 0);
    assert_eq!(ErrorStatus::Ok.raw(), 1);
    assert_eq!(ErrorStatus::Error.raw(), 2);
    assert_eq!(ErrorStatus::Dbus.raw(), 3);
    assert_eq!(ErrorStatus::Internal.raw(), 4);
    assert_eq!(ErrorStatus::Parameter.raw(), 5);
    assert_eq!(ErrorStatus::WrongSession.raw(), 6);
    assert_eq!(ErrorStatus::ResponsePending.raw(), 7);
    assert_eq!(ErrorStatus::Last.raw(), 8);
}

#[test]
fn error_status_from_raw_round_trips() {
    for raw in 0..=8 {
        let status = ErrorStatus::from_raw(raw).unwrap();
        assert_eq!(status.raw(), raw);
    }
    assert_eq!(ErrorStatus::from_raw(9), None);
    assert_eq!(ErrorStatus::from_raw(-1), None);
}

#[test]
fn node_state_values_match_the_protocol() {
    assert_eq!(NodeState::NotSet.raw(), 0);
    assert_eq!(NodeState::StartUp.raw(), 1);
    assert_eq!(NodeState::BaseRunning.raw(), 2);
    assert_eq!(NodeState::LucRunning.raw(), 3);
    assert_eq!(NodeState::FullyRunning.raw(), 4);
    assert_eq!(NodeState::FullyOperational.raw(), 5);
    assert_eq!(NodeState::ShuttingDown.raw(), 6);
    assert_eq!(NodeState::ShutdownDelay.raw(), 7);
    assert_eq!(NodeState::FastShutdown.raw(), 8);
    assert_eq!(NodeState::DegradedPower.raw(), 9);
    assert_eq!(NodeState::Shutdown.raw(), 10);
    assert_eq!(NodeState::Last.raw(), 11);
}

#[test]
fn node_state_from_raw_rejects_out_of_range_values() {
    assert_eq!(NodeState::from_raw(5), Some(NodeState::FullyOperational));
    assert_eq!(NodeState::from_raw(12), None);
    assert_eq!(NodeState::from_raw(-3), None);
}

#[test]
fn display_uses_kebab_case() {
    assert_eq!(ErrorStatus::ResponsePending.to_string(), "response-pending");
    assert_eq!(NodeState::FullyOperational.to_string(), "fully-operational");
}
