// Snapshot-publishing importance resolver
//
// Readers do a single acquire-load of the current table and resolve against
// it. Writers are serialized, clone the table, edit the clone, and store it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use contextlog_types::{Importance, ResolveImportance, Severity};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use super::table::{MatchedRule, OverrideTable, Resolution};

/// How many resolutions each tier produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionCounts {
    pub component_function: u64,
    pub function: u64,
    pub component_exact: u64,
    pub component_prefix: u64,
    pub type_default: u64,
}

impl ResolutionCounts {
    pub fn total(&self) -> u64 {
        self.component_function
            + self.function
            + self.component_exact
            + self.component_prefix
            + self.type_default
    }
}

pub struct ImportanceResolver {
    table: ArcSwap<OverrideTable>,
    write_lock: Mutex<()>,
    counters: [AtomicU64; 5],
}

impl Default for ImportanceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ImportanceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportanceResolver")
            .field("overrides", &self.table.load().override_count())
            .finish()
    }
}

impl ImportanceResolver {
    pub fn new() -> Self {
        Self::with_table(OverrideTable::new())
    }

    pub fn with_table(table: OverrideTable) -> Self {
        ImportanceResolver {
            table: ArcSwap::from_pointee(table),
            write_lock: Mutex::new(()),
            counters: Default::default(),
        }
    }

    /// Resolve and report which rule matched.
    pub fn resolve_detailed(&self, severity: Severity, component: &str, function: &str) -> Resolution {
        let resolution = self.table.load().resolve(severity, component, function);
        self.counters[resolution.rule.index()].fetch_add(1, Ordering::Relaxed);
        resolution
    }

    /// Current table snapshot; stays valid across later edits.
    pub fn snapshot(&self) -> Arc<OverrideTable> {
        self.table.load_full()
    }

    fn update<R>(&self, edit: impl FnOnce(&mut OverrideTable) -> R) -> R {
        let _guard = self.write_lock.lock();
        let mut next = OverrideTable::clone(&self.table.load());
        let result = edit(&mut next);
        self.table.store(Arc::new(next));
        result
    }

    pub fn add_component_override(&self, pattern: &str, importance: Importance) -> bool {
        let added = self.update(|t| t.add_component_override(pattern, importance));
        debug!(pattern, %importance, added, "component override");
        added
    }

    pub fn add_function_override(&self, function: &str, importance: Importance) -> bool {
        let added = self.update(|t| t.add_function_override(function, importance));
        debug!(function, %importance, added, "function override");
        added
    }

    pub fn add_component_function_override(
        &self,
        component: &str,
        function: &str,
        importance: Importance,
    ) -> bool {
        let added =
            self.update(|t| t.add_component_function_override(component, function, importance));
        debug!(component, function, %importance, added, "component+function override");
        added
    }

    pub fn remove_component_override(&self, pattern: &str) -> bool {
        self.update(|t| t.remove_component_override(pattern))
    }

    pub fn remove_function_override(&self, function: &str) -> bool {
        self.update(|t| t.remove_function_override(function))
    }

    pub fn remove_component_function_override(&self, component: &str, function: &str) -> bool {
        self.update(|t| t.remove_component_function_override(component, function))
    }

    pub fn set_type_default(&self, severity: Severity, importance: Importance) {
        self.update(|t| t.set_type_default(severity, importance));
    }

    pub fn reset_type_defaults(&self) {
        self.update(|t| t.reset_type_defaults());
    }

    /// Remove all overrides. Type defaults are untouched.
    pub fn clear(&self) {
        self.update(|t| t.clear_overrides());
        debug!("override table cleared");
    }

    pub fn component_overrides(&self) -> Vec<(String, Importance)> {
        self.table.load().component_overrides()
    }

    pub fn function_overrides(&self) -> Vec<(String, Importance)> {
        self.table.load().function_overrides()
    }

    pub fn component_function_overrides(&self) -> Vec<((String, String), Importance)> {
        self.table.load().component_function_overrides()
    }

    pub fn resolution_counts(&self) -> ResolutionCounts {
        let get = |rule: MatchedRule| self.counters[rule.index()].load(Ordering::Relaxed);
        ResolutionCounts {
            component_function: get(MatchedRule::ComponentFunction),
            function: get(MatchedRule::Function),
            component_exact: get(MatchedRule::ComponentExact),
            component_prefix: get(MatchedRule::ComponentPrefix),
            type_default: get(MatchedRule::TypeDefault),
        }
    }
}

impl ResolveImportance for ImportanceResolver {
    fn resolve(&self, severity: Severity, component: &str, function: &str) -> Importance {
        self.resolve_detailed(severity, component, function).importance
    }
}
