//! Publishing of piggybacked raw data after a fetch phase.
//!
//! Piggyback data is monitoring payload one host collected on behalf of
//! another. After filtering, each host-key's piggybacked bytes are handed
//! to a [`PiggybackStore`], which replaces whatever that origin host
//! stored in earlier passes. Management boards never carry piggyback data
//! and are skipped unconditionally.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::model::{HostKey, HostName, SourceKind};
use crate::store::{PiggybackedRawData, SectionStore};

/// Error type for piggyback store failures.
#[derive(Debug, Clone)]
pub enum PiggybackError {
    /// I/O error while writing or cleaning up stored payloads.
    Io(String),
}

impl fmt::Display for PiggybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PiggybackError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for PiggybackError {}

/// External storage for piggybacked raw data.
///
/// `store_or_overwrite` is idempotent: it replaces the entirety of what
/// `origin` previously stored, so targets missing from the payload lose
/// their stale data from earlier passes.
pub trait PiggybackStore: Send {
    fn store_or_overwrite(
        &mut self,
        origin: &HostName,
        payload: &PiggybackedRawData,
    ) -> Result<(), PiggybackError>;
}

/// Persists each host-key's piggybacked raw data.
///
/// Called once after the fetch phase. Every non-management host-key issues
/// exactly one store call, even with an empty payload — that is what
/// clears stale entries from earlier passes.
pub fn store_piggybacked(
    host_sections: &[(HostKey, SectionStore)],
    store: &mut dyn PiggybackStore,
) -> Result<(), PiggybackError> {
    for (host_key, sections) in host_sections {
        if host_key.kind == SourceKind::Management {
            // management boards (SNMP or IPMI) do not support piggybacking
            continue;
        }
        tracing::debug!(
            host = %host_key,
            targets = sections.piggybacked().len(),
            "storing piggybacked data"
        );
        store.store_or_overwrite(&host_key.host_name, sections.piggybacked())?;
    }
    Ok(())
}

/// Filesystem-backed piggyback store.
///
/// Layout: one directory per piggybacked (target) host, one file per
/// origin host inside it, payload lines joined with newlines.
#[derive(Debug, Clone)]
pub struct FsPiggybackStore {
    dir: PathBuf,
}

impl FsPiggybackStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn remove_stale(&self, origin: &HostName) -> io::Result<()> {
        if !self.dir.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(&self.dir)? {
            let candidate = entry?.path().join(origin.as_str());
            if candidate.is_file() {
                fs::remove_file(&candidate)?;
            }
        }
        Ok(())
    }

    fn write_payload(&self, origin: &HostName, payload: &PiggybackedRawData) -> io::Result<()> {
        for (target, lines) in payload {
            let target_dir = self.dir.join(target.as_str());
            fs::create_dir_all(&target_dir)?;
            let mut buf = Vec::new();
            for line in lines {
                buf.extend_from_slice(line);
                buf.push(b'\n');
            }
            fs::write(target_dir.join(origin.as_str()), buf)?;
        }
        Ok(())
    }
}

impl PiggybackStore for FsPiggybackStore {
    fn store_or_overwrite(
        &mut self,
        origin: &HostName,
        payload: &PiggybackedRawData,
    ) -> Result<(), PiggybackError> {
        self.remove_stale(origin)
            .and_then(|()| self.write_payload(origin, payload))
            .map_err(|e| {
                tracing::warn!(origin = %origin, error = %e, "piggyback store failed");
                PiggybackError::Io(e.to_string())
            })
    }
}

/// In-memory piggyback store, for tests.
#[derive(Debug, Default)]
pub struct MemoryPiggybackStore {
    stored: HashMap<HostName, PiggybackedRawData>,
    calls: Vec<HostName>,
}

impl MemoryPiggybackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The payload most recently stored by the given origin host.
    pub fn stored_for(&self, origin: &HostName) -> Option<&PiggybackedRawData> {
        self.stored.get(origin)
    }

    /// Origin hosts of all store calls, in call order.
    pub fn calls(&self) -> &[HostName] {
        &self.calls
    }
}

impl PiggybackStore for MemoryPiggybackStore {
    fn store_or_overwrite(
        &mut self,
        origin: &HostName,
        payload: &PiggybackedRawData,
    ) -> Result<(), PiggybackError> {
        self.calls.push(origin.clone());
        self.stored.insert(origin.clone(), payload.clone());
        Ok(())
    }
}
