//! Fan-out of parsing and resolution across all host-keys of a pass.
//!
//! The [`SectionBroker`] owns one (resolver, parser) pair per host-key —
//! main host, cluster nodes, piggyback hosts, management boards — and
//! answers broker-level queries: per-host resolution, batch resolution
//! across all pairs, and surfacing of accumulated parsing errors.

use std::collections::HashMap;
use std::sync::Arc;

use crate::crash::CrashReporter;
use crate::model::{HostKey, ParsedSectionName};
use crate::parse::{FaultHandling, ParseFault, SectionsParser};
use crate::plugin::SectionRegistry;
use crate::resolve::{ResolvedResult, SectionResolver};
use crate::store::SectionStore;

/// A resolver/parser pair scoped to one host-key.
///
/// The pair shares a lifetime: both are created per pass and their
/// memoization is discarded together.
pub struct Provider {
    resolver: SectionResolver,
    parser: SectionsParser,
}

impl Provider {
    pub fn new(resolver: SectionResolver, parser: SectionsParser) -> Self {
        Self { resolver, parser }
    }

    pub fn resolve(
        &mut self,
        parsed_name: &ParsedSectionName,
    ) -> Result<Option<ResolvedResult>, ParseFault> {
        self.resolver.resolve(&mut self.parser, parsed_name)
    }

    pub fn parsing_errors(&self) -> &[String] {
        self.parser.parsing_errors()
    }

    pub fn parser_mut(&mut self) -> &mut SectionsParser {
        &mut self.parser
    }
}

/// Per-pass aggregation of (resolver, parser) pairs over all host-keys.
///
/// Pair order is the order of the stores handed to [`SectionBroker::new`];
/// it determines which host-key wins when several produce the same parsed
/// section in [`resolve_all`](Self::resolve_all). Callers wanting a
/// specific winner (e.g. primary host over cluster nodes) supply their
/// stores in that order.
pub struct SectionBroker {
    providers: Vec<(HostKey, Provider)>,
    index: HashMap<HostKey, usize>,
}

impl SectionBroker {
    /// Builds one provider per host-key.
    ///
    /// Each resolver is scoped to the plugins whose raw section is present
    /// in that host's store; each parser is bound to the store itself.
    pub fn new(
        host_sections: Vec<(HostKey, SectionStore)>,
        registry: &SectionRegistry,
        reporter: Arc<dyn CrashReporter>,
        fault_handling: FaultHandling,
    ) -> Self {
        let mut providers = Vec::with_capacity(host_sections.len());
        let mut index = HashMap::with_capacity(host_sections.len());
        for (host_key, store) in host_sections {
            let plugins = registry.plugins_for(&store);
            tracing::debug!(
                host = %host_key,
                sections = store.section_count(),
                plugins = plugins.len(),
                "building section provider"
            );
            let resolver = SectionResolver::new(plugins);
            let parser = SectionsParser::new(
                store,
                host_key.host_name.clone(),
                Arc::clone(&reporter),
                fault_handling,
            );
            index.insert(host_key.clone(), providers.len());
            providers.push((host_key, Provider::new(resolver, parser)));
        }
        Self { providers, index }
    }

    pub fn host_keys(&self) -> impl Iterator<Item = &HostKey> {
        self.providers.iter().map(|(key, _)| key)
    }

    pub fn provider_mut(&mut self, host_key: &HostKey) -> Option<&mut Provider> {
        let idx = *self.index.get(host_key)?;
        Some(&mut self.providers[idx].1)
    }

    /// Resolves one parsed section for one host-key.
    pub fn resolve(
        &mut self,
        host_key: &HostKey,
        parsed_name: &ParsedSectionName,
    ) -> Result<Option<ResolvedResult>, ParseFault> {
        match self.provider_mut(host_key) {
            Some(provider) => provider.resolve(parsed_name),
            None => Ok(None),
        }
    }

    /// Resolves the desired parsed sections across all host-keys.
    ///
    /// Only non-absent outcomes are kept. When several host-keys produce
    /// the same parsed section, later pairs overwrite earlier ones, which
    /// is how cluster-node merging picks a winner per name. Callers that
    /// need merged freshness across nodes aggregate the individual cache
    /// infos with [`crate::model::CacheInfo::aggregate`].
    pub fn resolve_all(
        &mut self,
        parsed_names: &[ParsedSectionName],
    ) -> Result<HashMap<ParsedSectionName, ResolvedResult>, ParseFault> {
        let mut resolved = HashMap::new();
        for (_host_key, provider) in &mut self.providers {
            for parsed_name in parsed_names {
                if let Some(result) = provider.resolve(parsed_name)? {
                    resolved.insert(parsed_name.clone(), result);
                }
            }
        }
        Ok(resolved)
    }

    /// Combines cache info contributed by several host-keys (e.g. cluster
    /// nodes) into the most conservative freshness window.
    pub fn aggregate_cache_info(
        cache_infos: impl IntoIterator<Item = crate::model::CacheInfo>,
    ) -> Option<crate::model::CacheInfo> {
        crate::model::CacheInfo::aggregate(cache_infos)
    }

    /// Accumulated parsing-error descriptions per host-key, in pair order.
    /// Intended for warning-level surfacing, never fatal.
    pub fn parsing_errors(&self) -> Vec<(&HostKey, &[String])> {
        self.providers
            .iter()
            .map(|(key, provider)| (key, provider.parsing_errors()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for SectionBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionBroker")
            .field("host_keys", &self.host_keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
