// Override table
//
// Plain value holding every override tier. Resolution is a pure function of
// the table; `ImportanceResolver` handles publication.

use contextlog_types::{ComponentPattern, Importance, Severity};
use serde::Serialize;

/// Which tier produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedRule {
    ComponentFunction,
    Function,
    ComponentExact,
    ComponentPrefix,
    TypeDefault,
}

impl MatchedRule {
    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

/// Result of a detailed resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub importance: Importance,
    pub rule: MatchedRule,
}

#[derive(Debug, Clone)]
struct ComponentRule {
    raw: String,
    pattern: ComponentPattern,
    importance: Importance,
}

#[derive(Debug, Clone)]
pub struct OverrideTable {
    type_default: [Importance; 6],
    component: Vec<ComponentRule>,
    function: Vec<(String, Importance)>,
    component_function: Vec<((String, String), Importance)>,
}

impl Default for OverrideTable {
    fn default() -> Self {
        OverrideTable {
            type_default: default_mapping(),
            component: Vec::new(),
            function: Vec::new(),
            component_function: Vec::new(),
        }
    }
}

fn default_mapping() -> [Importance; 6] {
    Severity::ALL.map(Importance::default_for)
}

impl OverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most specific rule first; a hit at one tier short-circuits the rest.
    pub fn resolve(&self, severity: Severity, component: &str, function: &str) -> Resolution {
        if !component.is_empty() && !function.is_empty() {
            if let Some((_, importance)) = self
                .component_function
                .iter()
                .find(|((c, f), _)| c == component && f == function)
            {
                return Resolution {
                    importance: *importance,
                    rule: MatchedRule::ComponentFunction,
                };
            }
        }

        if !function.is_empty() {
            if let Some((_, importance)) = self.function.iter().find(|(f, _)| f == function) {
                return Resolution {
                    importance: *importance,
                    rule: MatchedRule::Function,
                };
            }
        }

        if !component.is_empty() {
            let exact = self
                .component
                .iter()
                .filter(|rule| rule.pattern.is_exact())
                .find(|rule| rule.pattern.matches(component));
            if let Some(rule) = exact {
                return Resolution {
                    importance: rule.importance,
                    rule: MatchedRule::ComponentExact,
                };
            }
            let prefix = self
                .component
                .iter()
                .filter(|rule| !rule.pattern.is_exact())
                .find(|rule| rule.pattern.matches(component));
            if let Some(rule) = prefix {
                return Resolution {
                    importance: rule.importance,
                    rule: MatchedRule::ComponentPrefix,
                };
            }
        }

        Resolution {
            importance: self.type_default[severity.index()],
            rule: MatchedRule::TypeDefault,
        }
    }

    pub fn type_default(&self, severity: Severity) -> Importance {
        self.type_default[severity.index()]
    }

    pub fn set_type_default(&mut self, severity: Severity, importance: Importance) {
        self.type_default[severity.index()] = importance;
    }

    pub fn reset_type_defaults(&mut self) {
        self.type_default = default_mapping();
    }

    /// Insert or replace in place. Returns false for an empty pattern.
    pub fn add_component_override(&mut self, pattern: &str, importance: Importance) -> bool {
        if pattern.is_empty() {
            return false;
        }
        match self.component.iter_mut().find(|rule| rule.raw == pattern) {
            Some(rule) => rule.importance = importance,
            None => self.component.push(ComponentRule {
                raw: pattern.to_string(),
                pattern: ComponentPattern::parse(pattern),
                importance,
            }),
        }
        true
    }

    pub fn add_function_override(&mut self, function: &str, importance: Importance) -> bool {
        if function.is_empty() {
            return false;
        }
        match self.function.iter_mut().find(|(f, _)| f == function) {
            Some(entry) => entry.1 = importance,
            None => self.function.push((function.to_string(), importance)),
        }
        true
    }

    pub fn add_component_function_override(
        &mut self,
        component: &str,
        function: &str,
        importance: Importance,
    ) -> bool {
        if component.is_empty() || function.is_empty() {
            return false;
        }
        match self
            .component_function
            .iter_mut()
            .find(|((c, f), _)| c == component && f == function)
        {
            Some(entry) => entry.1 = importance,
            None => self
                .component_function
                .push(((component.to_string(), function.to_string()), importance)),
        }
        true
    }

    pub fn remove_component_override(&mut self, pattern: &str) -> bool {
        let before = self.component.len();
        self.component.retain(|rule| rule.raw != pattern);
        self.component.len() != before
    }

    pub fn remove_function_override(&mut self, function: &str) -> bool {
        let before = self.function.len();
        self.function.retain(|(f, _)| f != function);
        self.function.len() != before
    }

    pub fn remove_component_function_override(&mut self, component: &str, function: &str) -> bool {
        let before = self.component_function.len();
        self.component_function
            .retain(|((c, f), _)| !(c == component && f == function));
        self.component_function.len() != before
    }

    /// Drop every override; type defaults are kept.
    pub fn clear_overrides(&mut self) {
        self.component.clear();
        self.function.clear();
        self.component_function.clear();
    }

    pub fn component_overrides(&self) -> Vec<(String, Importance)> {
        self.component
            .iter()
            .map(|rule| (rule.raw.clone(), rule.importance))
            .collect()
    }

    pub fn function_overrides(&self) -> Vec<(String, Importance)> {
        self.function.clone()
    }

    pub fn component_function_overrides(&self) -> Vec<((String, String), Importance)> {
        self.component_function.clone()
    }

    pub fn override_count(&self) -> usize {
        self.component.len() + self.function.len() + self.component_function.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_component_beats_earlier_prefix() {
        let mut table = OverrideTable::new();
        table.add_component_override("Data*", Importance::Low);
        table.add_component_override("Database", Importance::Critical);

        let r = table.resolve(Severity::Info, "Database", "Query");
        assert_eq!(r.importance, Importance::Critical);
        assert_eq!(r.rule, MatchedRule::ComponentExact);

        let r = table.resolve(Severity::Info, "DataLake", "Query");
        assert_eq!(r.importance, Importance::Low);
        assert_eq!(r.rule, MatchedRule::ComponentPrefix);
    }

    #[test]
    fn test_prefix_insertion_order_breaks_ties() {
        let mut table = OverrideTable::new();
        table.add_component_override("Net*", Importance::High);
        table.add_component_override("*", Importance::Low);
        assert_eq!(table.resolve(Severity::Info, "Network", "f").importance, Importance::High);
        assert_eq!(table.resolve(Severity::Info, "Other", "f").importance, Importance::Low);
    }

    #[test]
    fn test_function_tier_beats_component() {
        let mut table = OverrideTable::new();
        table.add_component_override("Cache", Importance::Low);
        table.add_function_override("Evict", Importance::High);
        let r = table.resolve(Severity::Debug, "Cache", "Evict");
        assert_eq!(r.importance, Importance::High);
        assert_eq!(r.rule, MatchedRule::Function);
    }

    #[test]
    fn test_empty_inputs_fall_through_to_default() {
        let mut table = OverrideTable::new();
        table.add_component_override("*", Importance::Critical);
        table.add_function_override("Save", Importance::Critical);
        let r = table.resolve(Severity::Debug, "", "");
        assert_eq!(r.importance, Importance::Low);
        assert_eq!(r.rule, MatchedRule::TypeDefault);
    }

    #[test]
    fn test_empty_keys_are_refused() {
        let mut table = OverrideTable::new();
        assert!(!table.add_component_override("", Importance::High));
        assert!(!table.add_function_override("", Importance::High));
        assert!(!table.add_component_function_override("Db", "", Importance::High));
        assert_eq!(table.override_count(), 0);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut table = OverrideTable::new();
        table.add_component_override("A*", Importance::Low);
        table.add_component_override("B*", Importance::Low);
        table.add_component_override("A*", Importance::High);
        assert_eq!(
            table.component_overrides(),
            vec![("A*".to_string(), Importance::High), ("B*".to_string(), Importance::Low)]
        );
    }

    #[test]
    fn test_type_defaults_are_editable() {
        let mut table = OverrideTable::new();
        table.set_type_default(Severity::Info, Importance::Low);
        assert_eq!(table.resolve(Severity::Info, "x", "y").importance, Importance::Low);
        table.reset_type_defaults();
        assert_eq!(table.type_default(Severity::Info), Importance::Medium);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut table = OverrideTable::new();
        table.add_component_override("Db", Importance::High);
        table.add_function_override("Save", Importance::High);
        table.add_component_function_override("Db", "Save", Importance::Critical);
        assert!(table.remove_component_function_override("Db", "Save"));
        assert!(!table.remove_component_function_override("Db", "Save"));
        assert_eq!(table.resolve(Severity::Info, "Db", "Save").rule, MatchedRule::Function);
        table.clear_overrides();
        assert_eq!(table.override_count(), 0);
    }
}
