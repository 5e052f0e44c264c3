//! Section plugin records and the registry that holds them.
//!
//! A [`SectionPlugin`] declares which raw section it parses, which parsed
//! section it produces, the raw sections it supersedes, and the parse
//! function itself. Plugins are collected into a [`SectionRegistry`] at
//! startup; registration order is significant, it is the tie-break when
//! several plugins produce the same parsed section.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::model::{ParsedSectionName, RawRow, SectionName};
use crate::store::SectionStore;

/// Semantic content produced by a parse function.
///
/// The type is opaque to this crate; consumers downcast by the parsed
/// section name they queried.
pub type ParsedContent = Arc<dyn Any + Send + Sync>;

/// A parse function: raw rows in, semantic content out.
///
/// Expected to be a pure, CPU-only transformation. A fault is an `Err`
/// return or a panic; both are contained by the parser.
pub type ParseFunction =
    Arc<dyn Fn(&[RawRow]) -> Result<ParsedContent, ParseError> + Send + Sync>;

/// Error type for parse function failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Wraps a typed parse function into the type-erased [`ParseFunction`].
pub fn parse_fn<T, F>(f: F) -> ParseFunction
where
    T: Send + Sync + 'static,
    F: Fn(&[RawRow]) -> Result<T, ParseError> + Send + Sync + 'static,
{
    Arc::new(move |rows| f(rows).map(|content| Arc::new(content) as ParsedContent))
}

/// Static registration record for one raw section.
#[derive(Clone)]
pub struct SectionPlugin {
    /// Raw section this plugin parses.
    pub name: SectionName,
    /// Parsed section this plugin produces.
    pub parsed_name: ParsedSectionName,
    /// Raw sections this plugin takes precedence over when both are present.
    pub supersedes: Vec<SectionName>,
    pub parse: ParseFunction,
}

impl SectionPlugin {
    pub fn new(
        name: impl Into<SectionName>,
        parsed_name: impl Into<ParsedSectionName>,
        parse: ParseFunction,
    ) -> Self {
        Self {
            name: name.into(),
            parsed_name: parsed_name.into(),
            supersedes: Vec::new(),
            parse,
        }
    }

    pub fn with_supersedes(
        mut self,
        names: impl IntoIterator<Item = impl Into<SectionName>>,
    ) -> Self {
        self.supersedes = names.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for SectionPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionPlugin")
            .field("name", &self.name)
            .field("parsed_name", &self.parsed_name)
            .field("supersedes", &self.supersedes)
            .finish_non_exhaustive()
    }
}

/// Error type for plugin registration failures.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// A plugin for this raw section is already registered.
    DuplicateSection(SectionName),
    /// A plugin declared that it supersedes its own raw section.
    SelfSupersede(SectionName),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateSection(name) => {
                write!(f, "section {} is already registered", name)
            }
            RegistryError::SelfSupersede(name) => {
                write!(f, "section {} cannot supersede itself", name)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Ordered, process-wide collection of section plugins.
///
/// Built once at startup and shared read-only afterwards. Freedom from
/// supersedence cycles across plugins is the registering caller's
/// contract; resolution does not re-validate it.
#[derive(Debug, Default)]
pub struct SectionRegistry {
    plugins: Vec<Arc<SectionPlugin>>,
    by_name: HashMap<SectionName, usize>,
}

impl SectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: SectionPlugin) -> Result<(), RegistryError> {
        if self.by_name.contains_key(&plugin.name) {
            return Err(RegistryError::DuplicateSection(plugin.name));
        }
        if plugin.supersedes.contains(&plugin.name) {
            return Err(RegistryError::SelfSupersede(plugin.name));
        }
        self.by_name.insert(plugin.name.clone(), self.plugins.len());
        self.plugins.push(Arc::new(plugin));
        Ok(())
    }

    pub fn get(&self, name: &SectionName) -> Option<&Arc<SectionPlugin>> {
        self.by_name.get(name).map(|idx| &self.plugins[*idx])
    }

    /// All plugins in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<SectionPlugin>> {
        self.plugins.iter()
    }

    /// The plugins whose raw section is present in the given store, in
    /// registration order.
    ///
    /// Scoping a resolver to this subset limits the precedence search
    /// space to sections that can actually produce data for the host.
    pub fn plugins_for(&self, store: &SectionStore) -> Vec<Arc<SectionPlugin>> {
        self.plugins
            .iter()
            .filter(|plugin| store.contains(&plugin.name))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_plugin(name: &str, parsed: &str) -> SectionPlugin {
        SectionPlugin::new(name, parsed, parse_fn(|_rows| Ok(())))
    }

    #[test]
    fn test_register_rejects_duplicate_raw_section() {
        let mut registry = SectionRegistry::new();
        registry.register(noop_plugin("cpu", "cpu")).unwrap();

        let err = registry.register(noop_plugin("cpu", "cpu_util")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateSection("cpu".into()));
    }

    #[test]
    fn test_register_rejects_self_supersede() {
        let mut registry = SectionRegistry::new();
        let plugin = noop_plugin("cpu", "cpu").with_supersedes(["cpu"]);

        let err = registry.register(plugin).unwrap_err();
        assert_eq!(err, RegistryError::SelfSupersede("cpu".into()));
    }

    #[test]
    fn test_plugins_for_keeps_registration_order() {
        let mut registry = SectionRegistry::new();
        registry.register(noop_plugin("b", "p1")).unwrap();
        registry.register(noop_plugin("a", "p2")).unwrap();
        registry.register(noop_plugin("c", "p3")).unwrap();

        let mut store = SectionStore::new();
        store.add_section("a".into(), vec![]);
        store.add_section("c".into(), vec![]);
        store.add_section("b".into(), vec![]);

        let names: Vec<_> = registry
            .plugins_for(&store)
            .iter()
            .map(|p| p.name.clone())
            .collect();
        assert_eq!(names, vec!["b".into(), "a".into(), "c".into()]);
    }

    #[test]
    fn test_plugins_for_skips_absent_sections() {
        let mut registry = SectionRegistry::new();
        registry.register(noop_plugin("a", "p1")).unwrap();
        registry.register(noop_plugin("b", "p2")).unwrap();

        let mut store = SectionStore::new();
        store.add_section("b".into(), vec![]);

        let plugins = registry.plugins_for(&store);
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].name, "b".into());
    }
}
