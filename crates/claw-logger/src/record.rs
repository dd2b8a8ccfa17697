//! Log records as handed to sinks.

use chrono::Utc;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::attrs::Attrs;
use crate::level::Level;
use crate::template::render;

/// Returns the current time in Unix nanoseconds.
#[must_use]
pub fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

/// A fully rendered log record.
///
/// Records are built once per emission and shared read-only by every sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Name of the emitting source.
    pub source: String,
    /// Severity.
    pub level: Level,
    /// Message with placeholders substituted.
    pub message: String,
    /// Every attribute of the call, for machine-readable sinks.
    pub attrs: Attrs,
    /// Attributes no placeholder consumed, for human-readable sinks.
    pub display_attrs: Attrs,
    /// Emission time in Unix nanoseconds.
    pub time: i64,
    /// Elapsed nanoseconds for timer records, zero otherwise.
    pub elapsed_nanos: i64,
}

impl Record {
    /// Renders `template` against `attrs` and stamps the current time.
    #[must_use]
    pub fn new(source: impl Into<String>, level: Level, template: &str, attrs: Attrs) -> Self {
        let rendered = render(template, &attrs);
        Self {
            source: source.into(),
            level,
            message: rendered.text,
            attrs,
            display_attrs: rendered.unconsumed,
            time: now_nanos(),
            elapsed_nanos: 0,
        }
    }

    /// Sets the elapsed duration.
    #[must_use]
    pub const fn with_elapsed(mut self, elapsed_nanos: i64) -> Self {
        self.elapsed_nanos = elapsed_nanos;
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn with_time(mut self, time: i64) -> Self {
        self.time = time;
        self
    }

    /// Elapsed time in whole milliseconds.
    #[must_use]
    pub const fn elapsed_millis(&self) -> i64 {
        self.elapsed_nanos / 1_000_000
    }

    /// Returns true if the record came from a timer.
    #[must_use]
    pub fn is_timed(&self) -> bool {
        self.level == Level::Timer
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Record", 7)?;
        state.serialize_field("package", &self.source)?;
        state.serialize_field("level", &self.level)?;
        state.serialize_field("msg", &self.message)?;
        state.serialize_field("attrs", &self.attrs)?;
        state.serialize_field("time", &self.time)?;
        state.serialize_field("elapsed", &self.elapsed_millis())?;
        state.serialize_field("elapsed_nano", &self.elapsed_nanos)?;
        state.end()
    }
}
