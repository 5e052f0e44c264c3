//! Filtering of raw fetch results into per-host-key section stores.
//!
//! The fetch layer delivers an ordered sequence of (source, outcome)
//! pairs. This module folds them into one [`SectionStore`] per host-key:
//! successful outcomes merge their sections in, failed outcomes contribute
//! nothing but still materialize an empty store so later lookups for that
//! host-key do not fail.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use crate::model::{HostKey, HostName, SourceKind};
use crate::store::SectionStore;

/// Descriptor of one fetch source.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceInfo {
    pub host_name: HostName,
    pub kind: SourceKind,
}

impl SourceInfo {
    pub fn new(host_name: impl Into<HostName>, kind: SourceKind) -> Self {
        Self {
            host_name: host_name.into(),
            kind,
        }
    }

    pub fn host_key(&self) -> HostKey {
        HostKey::new(self.host_name.clone(), self.kind)
    }
}

/// Fault value of a failed fetch outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fetch error: {}", self.message)
    }
}

impl std::error::Error for FetchError {}

/// Result of fetching raw data from one source.
pub type FetchOutcome = Result<SectionStore, FetchError>;

/// Folds fetch results into per-host-key stores.
///
/// Output order is the first-seen order of each host-key, which callers
/// rely on downstream as the deterministic provider order. Multiple
/// successful sources for one host-key accumulate via
/// [`SectionStore::merge`].
pub fn filter_out_errors(
    results: impl IntoIterator<Item = (SourceInfo, FetchOutcome)>,
) -> Vec<(HostKey, SectionStore)> {
    let mut order: Vec<HostKey> = Vec::new();
    let mut stores: HashMap<HostKey, SectionStore> = HashMap::new();

    for (source, outcome) in results {
        let host_key = source.host_key();
        if let Entry::Vacant(entry) = stores.entry(host_key.clone()) {
            order.push(host_key.clone());
            entry.insert(SectionStore::new());
        }
        match outcome {
            Ok(fetched) => {
                tracing::debug!(
                    host = %host_key,
                    sections = fetched.section_count(),
                    "adding sections"
                );
                if let Some(store) = stores.get_mut(&host_key) {
                    store.merge(fetched);
                }
            }
            Err(error) => {
                tracing::debug!(host = %host_key, error = %error, "not adding sections");
            }
        }
    }

    order
        .into_iter()
        .map(|host_key| {
            let store = stores.remove(&host_key).unwrap_or_default();
            (host_key, store)
        })
        .collect()
}
