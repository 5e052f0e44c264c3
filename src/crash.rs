//! Crash-dump collaborator for failed parse functions.
//!
//! When a parse function faults, the parser hands the offending raw
//! content to a [`CrashReporter`], which produces an opaque artifact
//! identifier woven into the warning text. The filesystem implementation
//! writes one JSON file per fault; the in-memory implementation collects
//! crashes for tests.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Serialize;

use crate::model::{HostName, RawRows, SectionName};

/// Record of one failed section parse.
#[derive(Clone, Debug, Serialize)]
pub struct SectionCrash {
    pub operation: String,
    pub host_name: HostName,
    pub section_name: SectionName,
    pub raw_rows: RawRows,
    pub error: String,
}

impl SectionCrash {
    /// A crash record for the "parsing" operation.
    pub fn parsing(
        host_name: HostName,
        section_name: SectionName,
        raw_rows: RawRows,
        error: impl Into<String>,
    ) -> Self {
        Self {
            operation: "parsing".to_string(),
            host_name,
            section_name,
            raw_rows,
            error: error.into(),
        }
    }
}

/// Sink for crash records.
///
/// `report` returns an opaque diagnostic artifact identifier (for the
/// filesystem implementation: the dump's path). It must never fail the
/// pass; internal errors degrade to a descriptive string.
pub trait CrashReporter: Send + Sync {
    fn report(&self, crash: &SectionCrash) -> String;
}

/// Crash reporter that writes one JSON dump per fault into a directory.
#[derive(Debug, Clone)]
pub struct FsCrashReporter {
    dir: PathBuf,
}

impl FsCrashReporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write_dump(&self, crash: &SectionCrash) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S%.3f");
        let path = self.dir.join(format!(
            "{}-{}-{}.json",
            stamp, crash.host_name, crash.section_name
        ));
        let body = serde_json::to_vec_pretty(crash)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(&path, body)?;
        Ok(path)
    }
}

impl CrashReporter for FsCrashReporter {
    fn report(&self, crash: &SectionCrash) -> String {
        match self.write_dump(crash) {
            Ok(path) => path.display().to_string(),
            Err(e) => {
                tracing::warn!(
                    host = %crash.host_name,
                    section = %crash.section_name,
                    error = %e,
                    "failed to write crash dump"
                );
                format!("crash dump not written: {}", e)
            }
        }
    }
}

/// Crash reporter that keeps records in memory, for tests.
#[derive(Debug, Default)]
pub struct MemoryCrashReporter {
    crashes: Mutex<Vec<SectionCrash>>,
}

impl MemoryCrashReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn crashes(&self) -> Vec<SectionCrash> {
        self.crashes.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl CrashReporter for MemoryCrashReporter {
    fn report(&self, crash: &SectionCrash) -> String {
        let Ok(mut crashes) = self.crashes.lock() else {
            return "crash record lost (poisoned lock)".to_string();
        };
        crashes.push(crash.clone());
        format!("crash-{}", crashes.len() - 1)
    }
}
