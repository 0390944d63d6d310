// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk last user context.
//!
//! The file holds a single serialized `Map<i32, [unit name]>` in a fixed
//! binary layout, no header, no trailing metadata:
//!
//! ```text
//! u32  group count
//! per group:
//!   i32  type
//!   u32  unit count
//!   per unit:
//!     u32  byte length
//!     ...  UTF-8 bytes
//! ```
//!
//! All integers are big-endian. Groups are written in ascending type order,
//! so identical registrations produce byte-identical files. Writes replace
//! the file atomically through a same-directory temporary.

use nsc_core::{LastUserContext, LucType, UnitName};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the configured file path.
pub const LUC_PATH_ENV: &str = "LUC_PATH";

/// Errors from reading or writing the last user context file.
#[derive(Debug, Error)]
pub enum LucStoreError {
    #[error("last user context file not found at {0}")]
    NotFound(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed last user context file at {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// Reader/writer for the persisted last user context.
pub struct LucStore {
    default_path: PathBuf,
}

impl LucStore {
    pub fn new(default_path: impl Into<PathBuf>) -> Self {
        Self { default_path: default_path.into() }
    }

    /// The effective file path. `LUC_PATH` in the environment wins over the
    /// configured default and is resolved on every access.
    pub fn path(&self) -> PathBuf {
        match std::env::var(LUC_PATH_ENV) {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => self.default_path.clone(),
        }
    }

    /// Read and parse the persisted context.
    pub fn read(&self) -> Result<LastUserContext, LucStoreError> {
        let path = self.path();
        let bytes = std::fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LucStoreError::NotFound(path.clone())
            } else {
                LucStoreError::Io { path: path.clone(), source }
            }
        })?;
        decode_context(&bytes, &path)
    }

    /// Persist the context, replacing any previous file atomically.
    ///
    /// The parent directory is created if missing; a pre-existing directory
    /// is not an error.
    pub fn write(&self, context: &LastUserContext) -> Result<(), LucStoreError> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| LucStoreError::Io { path: parent.to_path_buf(), source })?;
        }

        let bytes = encode_context(context);
        let tmp = temp_path(&path);
        std::fs::write(&tmp, &bytes)
            .map_err(|source| LucStoreError::Io { path: tmp.clone(), source })?;
        std::fs::rename(&tmp, &path).map_err(|source| {
            let _ = std::fs::remove_file(&tmp);
            LucStoreError::Io { path: path.clone(), source }
        })?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "last user context written");
        Ok(())
    }
}

/// Same-directory temporary so the final rename never crosses filesystems.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn encode_context(context: &LastUserContext) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(context.len() as u32).to_be_bytes());
    for (luc_type, units) in context.iter() {
        out.extend_from_slice(&luc_type.to_be_bytes());
        out.extend_from_slice(&(units.len() as u32).to_be_bytes());
        for unit in units {
            let bytes = unit.as_str().as_bytes();
            out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            out.extend_from_slice(bytes);
        }
    }
    out
}

fn decode_context(bytes: &[u8], path: &Path) -> Result<LastUserContext, LucStoreError> {
    let mut cursor = Cursor { bytes, pos: 0, path };
    let mut context = LastUserContext::new();

    let group_count = cursor.read_u32()?;
    for _ in 0..group_count {
        let luc_type: LucType = cursor.read_i32()?;
        let unit_count = cursor.read_u32()?;
        let mut units = Vec::new();
        for _ in 0..unit_count {
            units.push(UnitName::new(cursor.read_str()?));
        }
        context.insert(luc_type, units);
    }

    if cursor.pos != bytes.len() {
        return Err(cursor.malformed("trailing bytes after the last group"));
    }
    Ok(context)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    path: &'a Path,
}

impl<'a> Cursor<'a> {
    fn malformed(&self, reason: impl Into<String>) -> LucStoreError {
        LucStoreError::Malformed { path: self.path.to_path_buf(), reason: reason.into() }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], LucStoreError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| self.malformed(format!("truncated at byte {}", self.pos)))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32, LucStoreError> {
        let slice = self.take(4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(slice);
        Ok(u32::from_be_bytes(buf))
    }

    fn read_i32(&mut self) -> Result<i32, LucStoreError> {
        let slice = self.take(4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(slice);
        Ok(i32::from_be_bytes(buf))
    }

    fn read_str(&mut self) -> Result<&'a str, LucStoreError> {
        let len = self.read_u32()? as usize;
        let start = self.pos;
        let slice = self.take(len)?;
        std::str::from_utf8(slice).map_err(|_| self.malformed(format!(
            "invalid UTF-8 in unit name at byte {start}"
        )))
    }
}

#[cfg(test)]
#[path = "luc_store_tests.rs"]
mod tests;
