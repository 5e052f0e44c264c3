//! Identity and freshness types shared across the crate.
//!
//! Everything per-pass state is keyed by is defined here: host identity
//! (`HostKey`), raw and parsed section identity (`SectionName`,
//! `ParsedSectionName`) and the freshness metadata attached to cached raw
//! data (`CacheInfo`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// One row of raw section data: an ordered sequence of string fields.
pub type RawRow = Vec<String>;

/// The raw content of one section: an ordered sequence of rows.
pub type RawRows = Vec<RawRow>;

/// Name of a monitored host.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostName(String);

impl HostName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HostName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Name of a raw section as produced by a fetch source.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionName(String);

impl SectionName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SectionName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Name of a parsed (semantic) section as consumed by checks and inventory.
///
/// This is an independent namespace from [`SectionName`]: several raw
/// sections may compete to produce the same parsed section.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParsedSectionName(String);

impl ParsedSectionName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParsedSectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParsedSectionName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Kind of source a host-key's data came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    /// A regular monitored host.
    Host,
    /// A management board (SNMP or IPMI). Never carries piggyback data.
    Management,
    /// Data piggybacked by another host on behalf of this one.
    Piggyback,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Host => f.write_str("host"),
            SourceKind::Management => f.write_str("management"),
            SourceKind::Piggyback => f.write_str("piggyback"),
        }
    }
}

/// Identity of a monitored entity partition: host name plus source kind.
///
/// All per-pass state (raw section stores, parser/resolver pairs) is
/// partitioned by `HostKey`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostKey {
    pub host_name: HostName,
    pub kind: SourceKind,
}

impl HostKey {
    pub fn new(host_name: impl Into<HostName>, kind: SourceKind) -> Self {
        Self {
            host_name: host_name.into(),
            kind,
        }
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host_name, self.kind)
    }
}

/// Freshness metadata for cached raw section data.
///
/// `at` is the collection timestamp in epoch seconds, `interval` the
/// validity interval in seconds. Only present when the raw data was served
/// from a cache rather than freshly fetched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub at: i64,
    pub interval: i64,
}

impl CacheInfo {
    pub fn new(at: i64, interval: i64) -> Self {
        Self { at, interval }
    }

    /// Combines cache info from several contributing sources into the most
    /// conservative freshness window: earliest timestamp, largest interval.
    ///
    /// Returns `None` for an empty input.
    pub fn aggregate(infos: impl IntoIterator<Item = CacheInfo>) -> Option<CacheInfo> {
        infos.into_iter().reduce(|acc, info| CacheInfo {
            at: acc.at.min(info.at),
            interval: acc.interval.max(info.interval),
        })
    }
}
