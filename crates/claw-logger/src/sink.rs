//! Sinks and the registry that fans records out to them.
//!
//! This module provides:
//! - [`Sink`] — The capability every output implements
//! - [`WriterRegistry`] — Ordered set of sinks receiving every record
//! - [`StreamSink`] — Filtered pretty/JSON output to any writer
//! - [`MemorySink`] — Captures records in memory
//! - [`TracingSink`] — Forwards records as `tracing` events

use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::color::SourceColors;
use crate::config::{OutputConfig, OutputFormat};
use crate::error::Result;
use crate::filter::VerbosityRules;
use crate::format::{json_line, pretty_line, PrettyStyle};
use crate::level::Level;
use crate::record::Record;

/// An output that receives rendered records.
///
/// Implementations decide for themselves which records to keep; the
/// registry hands every record to every sink.
pub trait Sink: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str {
        "sink"
    }

    /// Called once when the sink is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot become ready; it is then not
    /// registered.
    fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Writes one record. Must not fail; output errors are swallowed.
    fn write(&self, record: &Record);
}

/// A shared sink handle.
pub type SharedSink = Arc<dyn Sink>;

/// Ordered collection of sinks.
///
/// Registration swaps in a new snapshot of the sink list, so dispatch never
/// holds the lock while a sink is writing.
#[derive(Default)]
pub struct WriterRegistry {
    sinks: RwLock<Arc<Vec<SharedSink>>>,
}

impl std::fmt::Debug for WriterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.sinks.read().iter().map(|s| s.name().to_string()).collect();
        f.debug_struct("WriterRegistry").field("sinks", &names).finish()
    }
}

impl WriterRegistry {
    /// Creates a registry without sinks. Records dispatched to it are dropped.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes `sink` and appends it to the registry.
    ///
    /// # Errors
    ///
    /// Returns the sink's initialization error; the registry is unchanged.
    pub fn register(&self, sink: SharedSink) -> Result<()> {
        sink.init()?;
        tracing::debug!(sink = sink.name(), "registered log sink");

        let mut sinks = self.sinks.write();
        let mut next = Vec::with_capacity(sinks.len() + 1);
        next.extend(sinks.iter().cloned());
        next.push(sink);
        *sinks = Arc::new(next);
        Ok(())
    }

    /// Writes `record` to every sink, in registration order.
    pub fn dispatch(&self, record: &Record) {
        let sinks = self.sinks.read().clone();
        match sinks.as_slice() {
            [] => {}
            [only] => deliver(only.as_ref(), record),
            many => {
                for sink in many {
                    deliver(sink.as_ref(), record);
                }
            }
        }
    }

    /// Returns the number of registered sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.read().len()
    }

    /// Returns true if no sink is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Writes to a single sink, containing any panic inside it.
fn deliver(sink: &dyn Sink, record: &Record) {
    if catch_unwind(AssertUnwindSafe(|| sink.write(record))).is_err() {
        tracing::warn!(sink = sink.name(), source = %record.source, "log sink panicked while writing");
    }
}

/// Writes filtered records to a byte stream.
pub struct StreamSink {
    name: String,
    target: Mutex<Box<dyn Write + Send>>,
    rules: VerbosityRules,
    pretty: bool,
    colors: bool,
    source_colors: Option<Arc<SourceColors>>,
}

impl std::fmt::Debug for StreamSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSink")
            .field("name", &self.name)
            .field("rules", &self.rules)
            .field("pretty", &self.pretty)
            .field("colors", &self.colors)
            .finish_non_exhaustive()
    }
}

impl StreamSink {
    /// Creates a sink writing to `target`.
    ///
    /// `is_terminal` decides what [`OutputFormat::Auto`] resolves to and
    /// whether ANSI colors are emitted.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        target: impl Write + Send + 'static,
        config: &OutputConfig,
        is_terminal: bool,
        source_colors: Option<Arc<SourceColors>>,
    ) -> Self {
        let pretty = match config.format {
            OutputFormat::Auto => is_terminal,
            OutputFormat::Pretty => true,
            OutputFormat::Json => false,
        };
        Self {
            name: name.into(),
            target: Mutex::new(Box::new(target)),
            rules: config.rules(),
            pretty,
            colors: pretty && is_terminal,
            source_colors,
        }
    }

    /// Creates a sink writing to standard error.
    #[must_use]
    pub fn stderr(config: &OutputConfig, source_colors: Arc<SourceColors>) -> Self {
        let is_terminal = std::io::stderr().is_terminal();
        Self::new("stderr", std::io::stderr(), config, is_terminal, Some(source_colors))
    }

    /// Creates a sink writing to standard output.
    #[must_use]
    pub fn stdout(config: &OutputConfig, source_colors: Arc<SourceColors>) -> Self {
        let is_terminal = std::io::stdout().is_terminal();
        Self::new("stdout", std::io::stdout(), config, is_terminal, Some(source_colors))
    }

    /// Creates a sink appending to the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn file(path: impl AsRef<Path>, config: &OutputConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(path.display().to_string(), file, config, false, None))
    }

    /// Returns true if records from `source` at `level` are written.
    #[must_use]
    pub fn is_enabled(&self, source: &str, level: Level) -> bool {
        self.rules.admits(source, level)
    }

    /// Renders a record in this sink's format.
    #[must_use]
    pub fn format(&self, record: &Record) -> String {
        if self.pretty {
            pretty_line(
                record,
                PrettyStyle {
                    colors: self.colors,
                    source_colors: self.source_colors.as_deref(),
                },
            )
        } else {
            json_line(record)
        }
    }
}

impl Sink for StreamSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, record: &Record) {
        if !self.is_enabled(&record.source, record.level) {
            return;
        }
        let line = self.format(record);
        let mut target = self.target.lock();
        let _ = writeln!(target, "{line}");
        let _ = target.flush();
    }
}

/// Keeps admitted records in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    rules: Option<VerbosityRules>,
    records: RwLock<Vec<Record>>,
}

impl MemorySink {
    /// Creates a sink that keeps every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that keeps only records admitted by `rules`.
    #[must_use]
    pub fn with_rules(rules: VerbosityRules) -> Self {
        Self {
            rules: Some(rules),
            records: RwLock::new(Vec::new()),
        }
    }

    /// Returns a copy of the captured records.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.records.read().clone()
    }

    /// Returns the number of captured records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Drops all captured records.
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn write(&self, record: &Record) {
        if let Some(rules) = &self.rules {
            if !rules.admits(&record.source, record.level) {
                return;
            }
        }
        self.records.write().push(record.clone());
    }
}

/// Re-emits records as `tracing` events under the `claw_logger` target.
#[derive(Debug, Clone, Default)]
pub struct TracingSink {
    rules: Option<VerbosityRules>,
}

impl TracingSink {
    /// Creates a sink forwarding every record.
    #[must_use]
    pub const fn new() -> Self {
        Self { rules: None }
    }

    /// Creates a sink forwarding only records admitted by `rules`.
    #[must_use]
    pub const fn with_rules(rules: VerbosityRules) -> Self {
        Self { rules: Some(rules) }
    }
}

impl Sink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn write(&self, record: &Record) {
        if let Some(rules) = &self.rules {
            if !rules.admits(&record.source, record.level) {
                return;
            }
        }

        let source = record.source.as_str();
        let message = record.message.as_str();
        let attrs = record.display_attrs.to_string();
        let elapsed_nanos = record.elapsed_nanos;

        match record.level {
            Level::Verbose | Level::Debug => {
                tracing::debug!(target: "claw_logger", source, %attrs, "{message}");
            }
            Level::Info => {
                tracing::info!(target: "claw_logger", source, %attrs, "{message}");
            }
            Level::Timer => {
                tracing::info!(target: "claw_logger", source, elapsed_nanos, %attrs, "{message}");
            }
            Level::Warn => {
                tracing::warn!(target: "claw_logger", source, %attrs, "{message}");
            }
            Level::Error | Level::Fatal => {
                let level = record.level.name();
                tracing::error!(target: "claw_logger", source, level, %attrs, "{message}");
            }
        }
    }
}
