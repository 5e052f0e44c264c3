//! Per-host-key container for raw fetch results.
//!
//! A [`SectionStore`] holds everything one host-key's sources delivered in
//! a single pass: raw section rows, per-section cache timing, and raw
//! piggybacked payload lines destined for other hosts. Stores from several
//! sources for the same host-key accumulate via [`SectionStore::merge`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{CacheInfo, HostName, RawRows, SectionName};

/// Raw piggybacked payload: target host name to the byte lines collected
/// on its behalf.
pub type PiggybackedRawData = HashMap<HostName, Vec<Vec<u8>>>;

/// Raw section data for one host-key.
///
/// Created when fetch results are filtered into per-host-key stores and
/// never mutated afterwards, except by [`merge`](Self::merge) during that
/// aggregation step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionStore {
    sections: HashMap<SectionName, RawRows>,
    cache_info: HashMap<SectionName, CacheInfo>,
    piggybacked: PiggybackedRawData,
}

impl SectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds rows for a raw section, appending to any rows already present.
    pub fn add_section(&mut self, name: SectionName, rows: RawRows) {
        self.sections.entry(name).or_default().extend(rows);
    }

    /// Records cache timing for a raw section that was served from a cache.
    pub fn set_cache_info(&mut self, name: SectionName, cache_info: CacheInfo) {
        self.cache_info.insert(name, cache_info);
    }

    /// Adds piggybacked payload lines for a target host.
    pub fn add_piggybacked(&mut self, target: HostName, lines: Vec<Vec<u8>>) {
        self.piggybacked.entry(target).or_default().extend(lines);
    }

    /// Returns the raw rows of a section, if any source delivered it.
    pub fn rows(&self, name: &SectionName) -> Option<&RawRows> {
        self.sections.get(name)
    }

    /// Returns the cache timing recorded for a section, if any.
    pub fn cache_info(&self, name: &SectionName) -> Option<CacheInfo> {
        self.cache_info.get(name).copied()
    }

    pub fn contains(&self, name: &SectionName) -> bool {
        self.sections.contains_key(name)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &SectionName> {
        self.sections.keys()
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn piggybacked(&self) -> &PiggybackedRawData {
        &self.piggybacked
    }

    /// Merges another store for the same host-key into this one.
    ///
    /// Rows of colliding sections and piggyback line lists are appended;
    /// cache info from `other` wins on collision. Avoiding genuinely
    /// conflicting section content across sources is the fetch layer's
    /// responsibility.
    pub fn merge(&mut self, other: SectionStore) {
        for (name, rows) in other.sections {
            self.sections.entry(name).or_default().extend(rows);
        }
        self.cache_info.extend(other.cache_info);
        for (target, lines) in other.piggybacked {
            self.piggybacked.entry(target).or_default().extend(lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(fields: &[&[&str]]) -> RawRows {
        fields
            .iter()
            .map(|row| row.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_merge_appends_rows_of_colliding_sections() {
        let mut first = SectionStore::new();
        first.add_section("cpu".into(), rows(&[&["0.1", "0.2"]]));

        let mut second = SectionStore::new();
        second.add_section("cpu".into(), rows(&[&["0.3", "0.4"]]));
        second.add_section("mem".into(), rows(&[&["total", "1024"]]));

        first.merge(second);

        assert_eq!(first.section_count(), 2);
        assert_eq!(
            first.rows(&"cpu".into()),
            Some(&rows(&[&["0.1", "0.2"], &["0.3", "0.4"]]))
        );
    }

    #[test]
    fn test_merge_later_cache_info_wins() {
        let mut first = SectionStore::new();
        first.set_cache_info("cpu".into(), CacheInfo::new(100, 60));

        let mut second = SectionStore::new();
        second.set_cache_info("cpu".into(), CacheInfo::new(200, 30));

        first.merge(second);
        assert_eq!(first.cache_info(&"cpu".into()), Some(CacheInfo::new(200, 30)));
    }

    #[test]
    fn test_merge_extends_piggyback_lines() {
        let mut first = SectionStore::new();
        first.add_piggybacked("other".into(), vec![b"line1".to_vec()]);

        let mut second = SectionStore::new();
        second.add_piggybacked("other".into(), vec![b"line2".to_vec()]);

        first.merge(second);
        let target: HostName = "other".into();
        assert_eq!(
            first.piggybacked().get(&target),
            Some(&vec![b"line1".to_vec(), b"line2".to_vec()])
        );
    }

    #[test]
    fn test_missing_section_is_absent() {
        let store = SectionStore::new();
        assert!(store.rows(&"cpu".into()).is_none());
        assert!(!store.contains(&"cpu".into()));
    }
}
