// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Last user context value type.
//!
//! The last user context (LUC) maps application types to the ordered list of
//! units to restore after boot. The map is kept sorted by type so that
//! identical registration sequences always serialize to identical bytes.

use crate::unit::UnitName;
use std::collections::BTreeMap;

/// Application type tag in the last user context.
pub type LucType = i32;

/// Ordered, type-keyed last user context.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct LastUserContext(BTreeMap<LucType, Vec<UnitName>>);

impl LastUserContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn insert(&mut self, luc_type: LucType, units: Vec<UnitName>) {
        self.0.insert(luc_type, units);
    }

    pub fn units(&self, luc_type: LucType) -> Option<&[UnitName]> {
        self.0.get(&luc_type).map(Vec::as_slice)
    }

    /// Iterate groups in ascending type order.
    pub fn iter(&self) -> impl Iterator<Item = (LucType, &[UnitName])> {
        self.0.iter().map(|(ty, units)| (*ty, units.as_slice()))
    }

    pub fn types(&self) -> impl Iterator<Item = LucType> + '_ {
        self.0.keys().copied()
    }

    /// Merge a registration batch into this context.
    ///
    /// For each type in `incoming`, units already present keep their order
    /// minus any unit that reappears in the batch; the batch's units are then
    /// appended in their original order. A re-registered unit therefore moves
    /// to the tail of its group while staying unique within it. Types absent
    /// from the batch are untouched.
    pub fn merge_register(&mut self, incoming: &LastUserContext) {
        for (luc_type, new_units) in &incoming.0 {
            let merged = match self.0.get(luc_type) {
                Some(existing) => existing
                    .iter()
                    .filter(|unit| !new_units.contains(unit))
                    .chain(new_units.iter())
                    .cloned()
                    .collect(),
                None => new_units.clone(),
            };
            self.0.insert(*luc_type, merged);
        }
    }
}

impl FromIterator<(LucType, Vec<UnitName>)> for LastUserContext {
    fn from_iter<I: IntoIterator<Item = (LucType, Vec<UnitName>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
#[path = "luc_tests.rs"]
mod tests;
