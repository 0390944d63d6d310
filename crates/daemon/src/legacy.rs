// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Legacy application handler.
//!
//! Applications that do not talk to the node state manager themselves are
//! registered here. The handler exports a shutdown-consumer endpoint per
//! unit, registers it with the node state manager, and answers lifecycle
//! requests by stopping the unit through the job manager.
//!
//! The handler owns two symmetric maps, unit → client and client → unit.
//! Entries are created and removed strictly as pairs.

use crate::consumers::{ConsumerTable, ConsumerTarget};
use crate::env;
use crate::jobs::JobManager;
use crate::proxies::NsmConsumerProxy;
use nsc_core::{ErrorStatus, ShutdownMode, UnitName};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Token identifying a registered shutdown client. Doubles as the decimal
/// suffix of the client's object path.
pub type ShutdownClientId = u32;

/// A shutdown-consumer registration owned by the handler.
#[derive(Debug, Clone)]
pub struct ShutdownClient {
    pub id: ShutdownClientId,
    pub bus_name: String,
    pub object_path: String,
    pub mode: ShutdownMode,
    /// Per-endpoint call timeout, re-applied on every re-registration.
    pub timeout: Duration,
}

#[derive(Default)]
struct HandlerState {
    units_to_clients: HashMap<UnitName, ShutdownClientId>,
    clients_to_units: HashMap<ShutdownClientId, UnitName>,
    clients: HashMap<ShutdownClientId, ShutdownClient>,
    next_index: u32,
}

/// Registers legacy applications as shutdown consumers and drives their
/// shutdown on lifecycle requests.
pub struct LegacyAppHandler {
    job_manager: Arc<JobManager>,
    nsm: Arc<dyn NsmConsumerProxy>,
    consumers: Arc<ConsumerTable>,
    state: Mutex<HandlerState>,
}

impl LegacyAppHandler {
    pub fn new(
        job_manager: Arc<JobManager>,
        nsm: Arc<dyn NsmConsumerProxy>,
        consumers: Arc<ConsumerTable>,
    ) -> Arc<Self> {
        // Suffix 0 belongs to the daemon's own consumer.
        let state = HandlerState { next_index: 1, ..Default::default() };
        Arc::new(Self { job_manager, nsm, consumers, state: Mutex::new(state) })
    }

    /// Register `unit` for supervised shutdown, or re-register it with a new
    /// mode and timeout. Completes normally even when the registration is
    /// refused or the node state manager cannot be reached.
    pub async fn register(&self, unit: UnitName, mode: ShutdownMode, timeout_ms: u32) {
        if !mode.is_storable() {
            tracing::error!(
                unit = %unit,
                mode = %mode,
                "failed to register legacy application: invalid shutdown mode"
            );
            return;
        }

        let timeout = Duration::from_millis(u64::from(timeout_ms));
        let (bus_name, object_path, exported) = {
            let mut state = self.state.lock();
            if let Some(&id) = state.units_to_clients.get(&unit) {
                // Re-registration: overwrite the stored mode, do not merge.
                let Some(client) = state.clients.get_mut(&id) else {
                    return;
                };
                client.mode = mode;
                client.timeout = timeout;
                (client.bus_name.clone(), client.object_path.clone(), None)
            } else {
                let id = state.next_index;
                state.next_index += 1;
                let object_path = format!("{}/{}", env::CONSUMER_PATH_PREFIX, id);
                let client = ShutdownClient {
                    id,
                    bus_name: env::BUS_NAME.to_owned(),
                    object_path: object_path.clone(),
                    mode,
                    timeout,
                };
                state.units_to_clients.insert(unit.clone(), id);
                state.clients_to_units.insert(id, unit.clone());
                state.clients.insert(id, client);
                (env::BUS_NAME.to_owned(), object_path, Some(id))
            }
        };

        if let Some(id) = exported {
            self.consumers.export(object_path.clone(), ConsumerTarget::LegacyUnit(id));
            tracing::info!(unit = %unit, object_path = %object_path, "shutdown consumer exported");
        }

        match self.nsm.register_shutdown_client(&bus_name, &object_path, mode, timeout_ms).await {
            Err(error) => {
                tracing::error!(
                    unit = %unit,
                    object_path = %object_path,
                    error = %error,
                    "failed to register a shutdown consumer"
                );
            }
            Ok(status) if status != ErrorStatus::Ok => {
                tracing::error!(
                    unit = %unit,
                    object_path = %object_path,
                    status = %status,
                    "node state manager refused the shutdown consumer"
                );
            }
            Ok(_) => {
                tracing::debug!(unit = %unit, object_path = %object_path, mode = %mode, "shutdown consumer registered");
            }
        }
    }

    /// Answer a lifecycle request addressed to one of the handler's
    /// endpoints. Returns the status to send back to the node state manager;
    /// `ResponsePending` means a stop is under way and
    /// `lifecycle_request_complete` will follow.
    pub fn handle_lifecycle_request(
        self: &Arc<Self>,
        client_id: ShutdownClientId,
        request_id: u32,
    ) -> ErrorStatus {
        let (unit, call_timeout) = {
            let state = self.state.lock();
            let Some(unit) = state.clients_to_units.get(&client_id) else {
                // A request for a consumer we never registered.
                tracing::error!(
                    client_id,
                    request_id,
                    "lifecycle request for an unknown shutdown consumer"
                );
                return ErrorStatus::Error;
            };
            let timeout = state
                .clients
                .get(&client_id)
                .map(|client| client.timeout)
                .unwrap_or(Duration::from_secs(5));
            (unit.clone(), timeout)
        };

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let completion = this.job_manager.stop(unit, CancellationToken::new()).await;
            let status = if completion.is_failure() {
                tracing::error!(
                    unit = %completion.unit,
                    result = %completion.result,
                    "failed to shut down a shutdown consumer"
                );
                ErrorStatus::Error
            } else {
                ErrorStatus::Ok
            };
            this.complete_lifecycle_request(request_id, status, call_timeout).await;
        });

        ErrorStatus::ResponsePending
    }

    async fn complete_lifecycle_request(
        &self,
        request_id: u32,
        status: ErrorStatus,
        call_timeout: Duration,
    ) {
        tracing::info!(request_id, status = %status, "completing a lifecycle request");
        let call = self.nsm.lifecycle_request_complete(request_id, status);
        match tokio::time::timeout(call_timeout, call).await {
            Err(_) => {
                tracing::error!(
                    request_id,
                    "timed out notifying the node state manager about a completed lifecycle request"
                );
            }
            Ok(Err(error)) => {
                tracing::error!(
                    request_id,
                    error = %error,
                    "failed to notify the node state manager about a completed lifecycle request"
                );
            }
            Ok(Ok(ErrorStatus::Ok)) => {
                tracing::info!(
                    request_id,
                    "notified the node state manager about a completed lifecycle request"
                );
            }
            Ok(Ok(status)) => {
                tracing::error!(
                    request_id,
                    status = %status,
                    "node state manager rejected the lifecycle completion"
                );
            }
        }
    }

    /// Unregister every shutdown client from the node state manager.
    ///
    /// Errors are logged and iteration continues; the map entries and the
    /// exported endpoints are removed pairwise regardless.
    pub async fn deregister_consumers(&self) {
        let clients: Vec<(UnitName, ShutdownClient)> = {
            let state = self.state.lock();
            state
                .clients_to_units
                .iter()
                .filter_map(|(id, unit)| {
                    state.clients.get(id).map(|client| (unit.clone(), client.clone()))
                })
                .collect()
        };

        for (unit, client) in clients {
            match self
                .nsm
                .unregister_shutdown_client(&client.bus_name, &client.object_path, client.mode)
                .await
            {
                Err(error) => {
                    tracing::error!(
                        object_path = %client.object_path,
                        unit = %unit,
                        error = %error,
                        "failed to unregister shutdown client"
                    );
                }
                Ok(status) if status != ErrorStatus::Ok => {
                    tracing::error!(
                        object_path = %client.object_path,
                        unit = %unit,
                        status = %status,
                        "failed to unregister shutdown client"
                    );
                }
                Ok(_) => {}
            }

            {
                let mut state = self.state.lock();
                state.units_to_clients.remove(&unit);
                state.clients_to_units.remove(&client.id);
                state.clients.remove(&client.id);
            }
            self.consumers.remove(&client.object_path);
        }
    }

    /// The client registered for `unit`, if any.
    pub fn client_for_unit(&self, unit: &UnitName) -> Option<ShutdownClient> {
        let state = self.state.lock();
        let id = state.units_to_clients.get(unit)?;
        state.clients.get(id).cloned()
    }

    /// Number of registered shutdown clients.
    pub fn client_count(&self) -> usize {
        self.state.lock().clients.len()
    }

    /// True when the unit → client and client → unit maps mirror each other.
    pub fn maps_symmetric(&self) -> bool {
        let state = self.state.lock();
        state.units_to_clients.len() == state.clients_to_units.len()
            && state.units_to_clients.iter().all(|(unit, id)| {
                state.clients_to_units.get(id).is_some_and(|back| back == unit)
            })
    }
}

#[cfg(test)]
#[path = "legacy_tests.rs"]
mod tests;
