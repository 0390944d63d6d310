// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transactional builder of the persisted last user context.
//!
//! Clients drive the sequence `begin` → `register`* → `finish`. The
//! accumulator only exists inside that window; `finish` persists it
//! atomically and always drops it, even when persistence fails.

use nsc_core::LastUserContext;
use nsc_storage::{LucStore, LucStoreError};
use parking_lot::Mutex;

/// The daemon's last-user-context registration service.
pub struct LucRegistry {
    store: LucStore,
    session: Mutex<Option<LastUserContext>>,
}

impl LucRegistry {
    pub fn new(store: LucStore) -> Self {
        Self { store, session: Mutex::new(None) }
    }

    /// Open a registration transaction with an empty accumulator.
    pub fn begin(&self) {
        *self.session.lock() = Some(LastUserContext::new());
        tracing::debug!("last user context registration started");
    }

    /// Merge a batch of applications into the open transaction.
    ///
    /// Without a prior `begin` this is a logged no-op.
    pub fn register(&self, apps: &LastUserContext) {
        let mut session = self.session.lock();
        match session.as_mut() {
            Some(context) => {
                context.merge_register(apps);
                tracing::debug!(context = ?context, "last user context updated");
            }
            None => {
                tracing::error!(
                    "failed to register apps with the last user context: \
                     the registration sequence was not started properly"
                );
            }
        }
    }

    /// Persist the accumulator and close the transaction.
    ///
    /// The accumulator is dropped unconditionally; a persistence failure is
    /// logged but not surfaced to the caller. Without a prior `begin` this is
    /// a logged no-op.
    pub fn finish(&self) {
        let Some(context) = self.session.lock().take() else {
            tracing::error!(
                "failed to finish the last user context registration: \
                 the registration sequence was not started properly"
            );
            return;
        };
        if let Err(error) = self.store.write(&context) {
            tracing::error!(error = %error, "failed to persist the last user context");
        }
    }

    /// Read the persisted last user context.
    pub fn read(&self) -> Result<LastUserContext, LucStoreError> {
        self.store.read()
    }

    /// True while a registration transaction is open.
    pub fn registration_in_progress(&self) -> bool {
        self.session.lock().is_some()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
