//! Resolution of parsed section names to their winning raw producer.
//!
//! A [`SectionResolver`] knows, for the plugins it was scoped to, which
//! plugins produce each parsed section and which plugins supersede each
//! raw section. Resolution is lazy and per query: which raw sections are
//! even present varies per host, so precedence cannot be settled in a
//! global upfront pass.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{CacheInfo, ParsedSectionName, SectionName};
use crate::parse::{ParseFault, SectionsParser};
use crate::plugin::{ParsedContent, SectionPlugin};

/// The winning plugin for a parsed section, with its content and freshness.
#[derive(Clone)]
pub struct ResolvedResult {
    pub plugin: Arc<SectionPlugin>,
    pub data: ParsedContent,
    pub cache_info: Option<CacheInfo>,
}

impl std::fmt::Debug for ResolvedResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedResult")
            .field("plugin", &self.plugin.name)
            .field("cache_info", &self.cache_info)
            .finish_non_exhaustive()
    }
}

/// Finds the producing plugin for a parsed section name, honoring
/// supersedence, memoized per name for the lifetime of the pass.
pub struct SectionResolver {
    superseders: HashMap<SectionName, Vec<Arc<SectionPlugin>>>,
    producers: HashMap<ParsedSectionName, Vec<Arc<SectionPlugin>>>,
    memoized: HashMap<ParsedSectionName, Option<ResolvedResult>>,
}

impl SectionResolver {
    /// Builds a resolver over the given plugins.
    ///
    /// Producer order per parsed name follows the order of `plugins`,
    /// which callers keep in registration order; that order is the
    /// tie-break when several plugins produce the same parsed section.
    pub fn new(plugins: impl IntoIterator<Item = Arc<SectionPlugin>>) -> Self {
        let mut superseders: HashMap<SectionName, Vec<Arc<SectionPlugin>>> = HashMap::new();
        let mut producers: HashMap<ParsedSectionName, Vec<Arc<SectionPlugin>>> = HashMap::new();
        for plugin in plugins {
            for superseded in &plugin.supersedes {
                superseders
                    .entry(superseded.clone())
                    .or_default()
                    .push(Arc::clone(&plugin));
            }
            producers
                .entry(plugin.parsed_name.clone())
                .or_default()
                .push(plugin);
        }
        Self {
            superseders,
            producers,
            memoized: HashMap::new(),
        }
    }

    /// Resolves a parsed section name to its winning producer's content.
    ///
    /// Candidate producers are tried in order. Before a producer's own raw
    /// section is parsed, every plugin superseding it gets to parse first;
    /// a superseder that produced data disables the full set of raw
    /// sections it supersedes, so everything it was declared to replace is
    /// suppressed, including the current candidate. Registration already
    /// validated against indirect supersedings, no recursion is needed
    /// here.
    ///
    /// `Err` only under [`crate::parse::FaultHandling::Propagate`].
    pub fn resolve(
        &mut self,
        parser: &mut SectionsParser,
        parsed_name: &ParsedSectionName,
    ) -> Result<Option<ResolvedResult>, ParseFault> {
        if let Some(memoized) = self.memoized.get(parsed_name) {
            return Ok(memoized.clone());
        }

        let candidates = self.producers.get(parsed_name).cloned().unwrap_or_default();
        for producer in candidates {
            let superseders = self
                .superseders
                .get(&producer.name)
                .cloned()
                .unwrap_or_default();
            for superseder in superseders {
                if parser.parse(&superseder.name, &superseder.parse)?.is_some() {
                    parser.disable(superseder.supersedes.iter());
                }
            }

            if let Some(parsed) = parser.parse(&producer.name, &producer.parse)? {
                let resolved = ResolvedResult {
                    plugin: producer,
                    data: parsed.data,
                    cache_info: parsed.cache_info,
                };
                self.memoized
                    .insert(parsed_name.clone(), Some(resolved.clone()));
                return Ok(Some(resolved));
            }
        }

        self.memoized.insert(parsed_name.clone(), None);
        Ok(None)
    }
}

impl std::fmt::Debug for SectionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionResolver")
            .field("producers", &self.producers.len())
            .field("superseders", &self.superseders.len())
            .field("memoized", &self.memoized.len())
            .finish_non_exhaustive()
    }
}
