//! Per-host-key section parsing with memoization and fault isolation.
//!
//! A [`SectionsParser`] is created once per host-key per processing pass.
//! It parses each raw section at most once, no matter how many semantic
//! lookups need it, and contains parse faults at its boundary: a failing
//! parse function yields "absent" plus a crash dump and a warning string,
//! never an aborted pass.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::crash::{CrashReporter, SectionCrash};
use crate::model::{CacheInfo, HostName, SectionName};
use crate::plugin::{ParseFunction, ParsedContent};
use crate::store::SectionStore;

/// What to do when a parse function faults.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FaultHandling {
    /// Record a crash dump and a warning, treat the section as absent.
    /// The production default.
    #[default]
    Recover,
    /// Surface the fault as a [`ParseFault`] error immediately. Diagnostic
    /// escape hatch; panics are left uncaught in this mode so a debugger
    /// sees the original backtrace.
    Propagate,
}

/// A parse fault surfaced under [`FaultHandling::Propagate`].
#[derive(Clone, Debug, PartialEq)]
pub struct ParseFault {
    pub host_name: HostName,
    pub section: SectionName,
    pub message: String,
}

impl std::fmt::Display for ParseFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "parsing section {} of host {} failed: {}",
            self.section, self.host_name, self.message
        )
    }
}

impl std::error::Error for ParseFault {}

/// Outcome of successfully parsing one raw section.
#[derive(Clone)]
pub struct ParsingResult {
    pub data: ParsedContent,
    pub cache_info: Option<CacheInfo>,
}

impl std::fmt::Debug for ParsingResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsingResult")
            .field("cache_info", &self.cache_info)
            .finish_non_exhaustive()
    }
}

/// Calls section parse functions and memoizes the outcomes.
///
/// Pass-scoped: all memoization lives in this instance and is discarded
/// with it. Absent raw data is not an error; it memoizes as `None` just
/// like a recovered fault does.
pub struct SectionsParser {
    store: SectionStore,
    host_name: HostName,
    reporter: Arc<dyn CrashReporter>,
    fault_handling: FaultHandling,
    memoized: HashMap<SectionName, Option<ParsingResult>>,
    parsing_errors: Vec<String>,
}

impl SectionsParser {
    pub fn new(
        store: SectionStore,
        host_name: HostName,
        reporter: Arc<dyn CrashReporter>,
        fault_handling: FaultHandling,
    ) -> Self {
        Self {
            store,
            host_name,
            reporter,
            fault_handling,
            memoized: HashMap::new(),
            parsing_errors: Vec::new(),
        }
    }

    pub fn host_name(&self) -> &HostName {
        &self.host_name
    }

    /// Human-readable descriptions of all recovered parse faults, in the
    /// order they occurred. Surfaced by callers as warnings, never fatal.
    pub fn parsing_errors(&self) -> &[String] {
        &self.parsing_errors
    }

    /// Parses a raw section, at most once per pass.
    ///
    /// Returns `Ok(None)` when the section has no raw data or a previous
    /// attempt faulted. `Err` only under [`FaultHandling::Propagate`].
    pub fn parse(
        &mut self,
        name: &SectionName,
        parse: &ParseFunction,
    ) -> Result<Option<ParsingResult>, ParseFault> {
        if let Some(memoized) = self.memoized.get(name) {
            return Ok(memoized.clone());
        }
        let outcome = self.parse_raw_data(name, parse)?;
        self.memoized.insert(name.clone(), outcome.clone());
        Ok(outcome)
    }

    /// Force-memoizes "absent" for the given sections without invoking
    /// their parse functions.
    ///
    /// Used to veto superseded raw sections once their superseder has
    /// produced data; a later direct lookup then correctly reports absent.
    pub fn disable<'a>(&mut self, names: impl IntoIterator<Item = &'a SectionName>) {
        for name in names {
            self.memoized.insert(name.clone(), None);
        }
    }

    fn parse_raw_data(
        &mut self,
        name: &SectionName,
        parse: &ParseFunction,
    ) -> Result<Option<ParsingResult>, ParseFault> {
        let Some(rows) = self.store.rows(name) else {
            return Ok(None);
        };

        let attempt = match self.fault_handling {
            // Uncaught panics are deliberate here, see FaultHandling::Propagate.
            FaultHandling::Propagate => (parse.as_ref())(rows),
            FaultHandling::Recover => {
                match catch_unwind(AssertUnwindSafe(|| (parse.as_ref())(rows))) {
                    Ok(result) => result,
                    Err(payload) => Err(crate::plugin::ParseError::new(panic_message(payload.as_ref()))),
                }
            }
        };

        match attempt {
            Ok(data) => Ok(Some(ParsingResult {
                data,
                cache_info: self.store.cache_info(name),
            })),
            Err(e) => {
                if self.fault_handling == FaultHandling::Propagate {
                    return Err(ParseFault {
                        host_name: self.host_name.clone(),
                        section: name.clone(),
                        message: e.message,
                    });
                }
                let crash = SectionCrash::parsing(
                    self.host_name.clone(),
                    name.clone(),
                    rows.clone(),
                    e.message.clone(),
                );
                let artifact = self.reporter.report(&crash);
                tracing::warn!(
                    host = %self.host_name,
                    section = %name,
                    error = %e.message,
                    "section parse failed, treating as absent"
                );
                self.parsing_errors.push(format!(
                    "Parsing of section {} failed: {} ({})",
                    name, e.message, artifact
                ));
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for SectionsParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionsParser")
            .field("host_name", &self.host_name)
            .field("fault_handling", &self.fault_handling)
            .field("memoized", &self.memoized.len())
            .field("parsing_errors", &self.parsing_errors)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "parse function panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crash::MemoryCrashReporter;
    use crate::model::RawRows;
    use crate::plugin::{ParseError, parse_fn};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store_with(name: &str, rows: RawRows) -> SectionStore {
        let mut store = SectionStore::new();
        store.add_section(name.into(), rows);
        store
    }

    fn parser(store: SectionStore) -> SectionsParser {
        SectionsParser::new(
            store,
            "node1".into(),
            Arc::new(MemoryCrashReporter::new()),
            FaultHandling::Recover,
        )
    }

    fn row_count() -> ParseFunction {
        parse_fn(|rows| Ok(rows.len()))
    }

    #[test]
    fn test_parse_invokes_function_at_most_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = {
            let calls = Arc::clone(&calls);
            parse_fn(move |rows| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(rows.len())
            })
        };
        let mut parser = parser(store_with("cpu", vec![vec!["0.5".to_string()]]));

        let first = parser.parse(&"cpu".into(), &counted).unwrap().unwrap();
        let second = parser.parse(&"cpu".into(), &counted).unwrap().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // identical memoized outcome: same underlying content
        assert!(Arc::ptr_eq(&first.data, &second.data));
    }

    #[test]
    fn test_absent_raw_data_is_not_an_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = {
            let calls = Arc::clone(&calls);
            parse_fn(move |rows| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(rows.len())
            })
        };
        let mut parser = parser(SectionStore::new());

        assert!(parser.parse(&"cpu".into(), &counted).unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(parser.parsing_errors().is_empty());
    }

    #[test]
    fn test_success_carries_cache_info_from_store() {
        let mut store = store_with("cpu", vec![vec!["0.5".to_string()]]);
        store.set_cache_info("cpu".into(), CacheInfo::new(100, 60));
        let mut parser = parser(store);

        let result = parser.parse(&"cpu".into(), &row_count()).unwrap().unwrap();
        assert_eq!(result.cache_info, Some(CacheInfo::new(100, 60)));
    }

    #[test]
    fn test_fault_is_recovered_and_recorded() {
        let reporter = Arc::new(MemoryCrashReporter::new());
        let mut parser = SectionsParser::new(
            store_with("bad", vec![vec!["x".to_string()]]),
            "node1".into(),
            Arc::clone(&reporter) as Arc<dyn CrashReporter>,
            FaultHandling::Recover,
        );
        let failing: ParseFunction = parse_fn(|_rows| -> Result<(), ParseError> {
            Err(ParseError::new("malformed input"))
        });

        assert!(parser.parse(&"bad".into(), &failing).unwrap().is_none());

        assert_eq!(parser.parsing_errors().len(), 1);
        assert!(parser.parsing_errors()[0].contains("bad"));
        let crashes = reporter.crashes();
        assert_eq!(crashes.len(), 1);
        assert_eq!(crashes[0].operation, "parsing");
        assert_eq!(crashes[0].section_name, "bad".into());
        assert_eq!(crashes[0].host_name, "node1".into());

        // memoized as absent, parse function not retried
        assert!(parser.parse(&"bad".into(), &failing).unwrap().is_none());
        assert_eq!(parser.parsing_errors().len(), 1);
    }

    #[test]
    fn test_panicking_parse_function_is_contained() {
        let panicking: ParseFunction = parse_fn(|_rows| -> Result<(), ParseError> {
            panic!("unexpected layout");
        });
        let mut parser = parser(store_with("bad", vec![vec!["x".to_string()]]));

        assert!(parser.parse(&"bad".into(), &panicking).unwrap().is_none());
        assert_eq!(parser.parsing_errors().len(), 1);
        assert!(parser.parsing_errors()[0].contains("unexpected layout"));
    }

    #[test]
    fn test_fault_does_not_affect_sibling_sections() {
        let mut store = store_with("bad", vec![vec!["x".to_string()]]);
        store.add_section("good".into(), vec![vec!["1".to_string(), "2".to_string()]]);
        let mut parser = parser(store);

        let failing: ParseFunction = parse_fn(|_rows| -> Result<(), ParseError> {
            Err(ParseError::new("boom"))
        });
        assert!(parser.parse(&"bad".into(), &failing).unwrap().is_none());

        let good = parser.parse(&"good".into(), &row_count()).unwrap();
        assert!(good.is_some());
        assert_eq!(parser.parsing_errors().len(), 1);
    }

    #[test]
    fn test_propagate_mode_surfaces_fault() {
        let mut parser = SectionsParser::new(
            store_with("bad", vec![vec!["x".to_string()]]),
            "node1".into(),
            Arc::new(MemoryCrashReporter::new()),
            FaultHandling::Propagate,
        );
        let failing: ParseFunction = parse_fn(|_rows| -> Result<(), ParseError> {
            Err(ParseError::new("malformed input"))
        });

        let fault = parser.parse(&"bad".into(), &failing).unwrap_err();
        assert_eq!(fault.section, "bad".into());
        assert_eq!(fault.host_name, "node1".into());
        assert!(fault.message.contains("malformed input"));
    }

    #[test]
    fn test_disable_vetoes_section_without_parsing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = {
            let calls = Arc::clone(&calls);
            parse_fn(move |rows| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(rows.len())
            })
        };
        let mut parser = parser(store_with("cpu", vec![vec!["0.5".to_string()]]));

        let disabled = ["cpu".into()];
        parser.disable(disabled.iter());

        assert!(parser.parse(&"cpu".into(), &counted).unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
