//! parsect - resolution of raw monitoring data into parsed sections.
//!
//! This library takes per-source raw monitoring data (agent output, SNMP
//! walks, piggybacked payloads) and resolves it into a single, named,
//! semantically-typed set of parsed sections that downstream consumers
//! (inventory, discovery, check execution, host labeling) query uniformly,
//! regardless of which raw source produced the data.
//!
//! # Architecture
//!
//! ```text
//! fetch results (external)
//!        │
//!        ▼ ingest::filter_out_errors
//! per host-key SectionStore ──────────► piggyback::store_piggybacked
//!        │
//!        ▼ broker::SectionBroker
//! one (SectionResolver, SectionsParser) pair per host-key
//!        │
//!        ▼ resolve / resolve_all
//! ParsedSectionName → ResolvedResult { plugin, content, cache info }
//! ```
//!
//! - `model` — identity types (`HostKey`, `SectionName`,
//!   `ParsedSectionName`) and freshness metadata (`CacheInfo`)
//! - `store` — per-host-key raw section container with merge
//! - `plugin` — section plugin records and the ordered registry
//! - `parse` — memoized per-section parsing with fault isolation
//! - `resolve` — supersedes-aware producer selection
//! - `broker` — per-host-key fan-out and batch resolution
//! - `ingest` — fetch-result filtering into per-host-key stores
//! - `crash` — crash-dump collaborator for failed parse functions
//! - `piggyback` — piggyback payload publishing
//!
//! Raw sections are parsed at most once per host-key per pass, a faulting
//! parse function never aborts sibling sections or other hosts, and all
//! memoization is pass-scoped. Host-keys share no mutable state, so
//! processing different host-keys in parallel is safe.

pub mod broker;
pub mod crash;
pub mod ingest;
pub mod model;
pub mod parse;
pub mod piggyback;
pub mod plugin;
pub mod resolve;
pub mod store;

pub use broker::{Provider, SectionBroker};
pub use crash::{CrashReporter, FsCrashReporter, MemoryCrashReporter, SectionCrash};
pub use ingest::{FetchError, FetchOutcome, SourceInfo, filter_out_errors};
pub use model::{
    CacheInfo, HostKey, HostName, ParsedSectionName, RawRow, RawRows, SectionName, SourceKind,
};
pub use parse::{FaultHandling, ParseFault, ParsingResult, SectionsParser};
pub use piggyback::{
    FsPiggybackStore, MemoryPiggybackStore, PiggybackError, PiggybackStore, store_piggybacked,
};
pub use plugin::{
    ParseError, ParseFunction, ParsedContent, RegistryError, SectionPlugin, SectionRegistry,
    parse_fn,
};
pub use resolve::{ResolvedResult, SectionResolver};
pub use store::{PiggybackedRawData, SectionStore};
