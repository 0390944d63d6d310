// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shutdown mode flag set.

/// Set of shutdown modes a consumer is registered for.
///
/// `NORMAL` and `FAST` are the storable bits. `RUNUP` is only ever delivered
/// by the node state manager when a running shutdown is cancelled; it is
/// never part of a stored registration.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ShutdownMode(u32);

impl ShutdownMode {
    pub const NONE: Self = Self(0);
    pub const NORMAL: Self = Self(0x0000_0001);
    pub const FAST: Self = Self(0x0000_0002);
    pub const RUNUP: Self = Self(0x8000_0000);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Clear the bits of `other`.
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// A mask may be stored in a shutdown-client registration only when it is
    /// a non-empty subset of `NORMAL | FAST`.
    pub const fn is_storable(self) -> bool {
        !self.is_empty() && self.without(Self::NORMAL.union(Self::FAST)).is_empty()
    }
}

impl std::ops::BitOr for ShutdownMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::fmt::Debug for ShutdownMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ShutdownMode({self})")
    }
}

impl std::fmt::Display for ShutdownMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        let mut put = |f: &mut std::fmt::Formatter<'_>, name: &str| -> std::fmt::Result {
            if !first {
                f.write_str("|")?;
            }
            first = false;
            f.write_str(name)
        };
        if self.contains(Self::NORMAL) {
            put(f, "normal")?;
        }
        if self.contains(Self::FAST) {
            put(f, "fast")?;
        }
        if self.contains(Self::RUNUP) {
            put(f, "runup")?;
        }
        let known = Self::NORMAL.union(Self::FAST).union(Self::RUNUP);
        if !self.without(known).is_empty() {
            put(f, "unknown")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
