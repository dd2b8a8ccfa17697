//! Per-source verbosity rules.
//!
//! A filter specification is a comma-separated list of `name` or
//! `name@level` items, for example `*@error,database@timer`. The name `*`
//! supplies the rule for sources without an exact entry.

use std::collections::HashMap;

use crate::level::{Level, Priority};

/// Name that matches every source without an exact rule.
pub const WILDCARD: &str = "*";

/// Parses a single level setting.
///
/// `MUTE` maps to [`Priority::MUTE`]; `*`, an empty string and unknown names
/// fall back to the most verbose priority.
#[must_use]
pub fn parse_priority(value: &str) -> Priority {
    let value = value.trim();
    if value.eq_ignore_ascii_case("mute") {
        return Priority::MUTE;
    }
    Level::from_name(value).map_or(Priority::VERBOSE, Level::priority)
}

/// Minimum priorities by source name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerbosityRules {
    rules: HashMap<String, Priority>,
}

impl VerbosityRules {
    /// Parses a filter specification.
    ///
    /// Items without `@level` take `default`. Blank items are skipped and a
    /// later item for the same name replaces an earlier one.
    #[must_use]
    pub fn parse(spec: &str, default: Priority) -> Self {
        let mut rules = HashMap::new();
        for item in spec.split(',') {
            let (name, priority) = match item.split_once('@') {
                Some((name, level)) => (name.trim(), parse_priority(level)),
                None => (item.trim(), default),
            };
            if name.is_empty() {
                continue;
            }
            rules.insert(name.to_string(), priority);
        }
        Self { rules }
    }

    /// Rules that admit every record from every source.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::parse(WILDCARD, Priority::VERBOSE)
    }

    /// Returns the minimum priority for `source`, if any rule covers it.
    #[must_use]
    pub fn priority_for(&self, source: &str) -> Option<Priority> {
        self.rules
            .get(source)
            .or_else(|| self.rules.get(WILDCARD))
            .copied()
    }

    /// Returns true if a record from `source` at `level` should be written.
    ///
    /// Sources with neither an exact nor a wildcard rule are muted entirely.
    #[must_use]
    pub fn admits(&self, source: &str, level: Level) -> bool {
        self.priority_for(source)
            .is_some_and(|min| level.priority() >= min)
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
