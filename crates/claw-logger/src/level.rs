//! The fixed severity table.
//!
//! Severities are a closed set; filtering works on their numeric
//! [`Priority`], not on the enum order.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::color::Color;

/// Numeric filtering priority. Higher is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub u8);

impl Priority {
    /// Lowest priority; admits every record.
    pub const VERBOSE: Self = Self(0);
    /// Muted sources only let fatal records through.
    pub const MUTE: Self = Self(99);
}

/// Log severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Very chatty diagnostics.
    Verbose,
    /// Debugging information.
    Debug,
    /// General information.
    Info,
    /// Completed timed operations.
    Timer,
    /// Warning conditions.
    Warn,
    /// Error conditions.
    Error,
    /// Unrecoverable errors; the only terminal severity.
    Fatal,
}

impl Level {
    /// Every severity, ordered by priority.
    pub const ALL: [Self; 7] = [
        Self::Verbose,
        Self::Debug,
        Self::Info,
        Self::Timer,
        Self::Warn,
        Self::Error,
        Self::Fatal,
    ];

    /// Returns the display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Verbose => "Verbose",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Timer => "TIMER",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }

    /// Returns the filtering priority.
    #[must_use]
    pub const fn priority(self) -> Priority {
        match self {
            Self::Verbose => Priority(0),
            Self::Debug => Priority(1),
            Self::Info => Priority(2),
            Self::Timer => Priority(3),
            Self::Warn => Priority(5),
            Self::Error => Priority(10),
            Self::Fatal => Priority(99),
        }
    }

    /// Returns the color used for this level in pretty output.
    #[must_use]
    pub const fn color(self) -> Color {
        match self {
            Self::Verbose => Color::Dim,
            Self::Debug => Color::White,
            Self::Info => Color::Reset,
            Self::Timer => Color::Green,
            Self::Warn => Color::Yellow,
            Self::Error | Self::Fatal => Color::Red,
        }
    }

    /// Returns the one-character symbol shown in pretty output.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::Verbose => 'V',
            Self::Debug => 'D',
            Self::Info => 'I',
            Self::Timer => 'T',
            Self::Warn => 'W',
            Self::Error => 'E',
            Self::Fatal => 'F',
        }
    }

    /// Returns true if emitting at this level terminates the process.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Fatal)
    }

    /// Looks up a severity by name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn priorities_ascend_with_table_order() {
        for pair in Level::ALL.windows(2) {
            assert!(pair[0].priority() < pair[1].priority());
        }
    }

    #[test]
    fn only_fatal_is_terminal() {
        let terminal: Vec<_> = Level::ALL.into_iter().filter(|l| l.is_terminal()).collect();
        assert_eq!(terminal, vec![Level::Fatal]);
    }

    #[test]
    fn symbol_is_first_letter_of_name() {
        for level in Level::ALL {
            assert_eq!(Some(level.symbol()), level.name().chars().next());
        }
    }

    #[test_case("info", Some(Level::Info) ; "lowercase")]
    #[test_case("TIMER", Some(Level::Timer) ; "uppercase")]
    #[test_case(" verbose ", Some(Level::Verbose) ; "padded")]
    #[test_case("mute", None ; "mute is not a level")]
    #[test_case("loud", None ; "unknown")]
    fn from_name_lookup(name: &str, expected: Option<Level>) {
        assert_eq!(Level::from_name(name), expected);
    }

    #[test]
    fn mute_equals_fatal_priority() {
        assert_eq!(Priority::MUTE, Level::Fatal.priority());
    }

    #[test]
    fn level_serializes_as_name() {
        let json = serde_json::to_string(&Level::Warn).expect("serialize");
        assert_eq!(json, "\"WARN\"");
    }
}
