//! The logging surface used by application code.
//!
//! This module provides:
//! - [`Runtime`] — Composition root owning the sink registry and color table
//! - [`Logger`] — Named source logger with inherited attribute context
//! - [`Timer`] — Measures an operation and emits a timer record
//! - [`inspect`] and [`close_with_log`] — Convenience emitters
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use claw_logger::{args, attrs, MemorySink, Runtime};
//!
//! let runtime = Runtime::new();
//! let memory = Arc::new(MemorySink::new());
//! runtime.register(memory.clone()).unwrap();
//!
//! let log = runtime.logger("orders").with_attrs(attrs! { "shop" => "north" });
//! log.info("placed {}", args!["bike"]);
//!
//! let record = &memory.records()[0];
//! assert_eq!(record.message, "placed bike");
//! assert_eq!(record.attrs.get("shop").map(ToString::to_string).as_deref(), Some("north"));
//! ```

use std::fmt::{self, Write as _};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::attrs::{merge_call_args_with, Attrs, CallArgs};
use crate::color::SourceColors;
use crate::config::OutputConfig;
use crate::error::Result;
use crate::level::Level;
use crate::panic::{PanicRecoverer, PanicReport};
use crate::record::{now_nanos, Record};
use crate::sink::{SharedSink, StreamSink, WriterRegistry};

/// Owns the process's sinks and source colors.
///
/// Loggers obtained from the same runtime share its registry, so sinks
/// registered later still receive records from existing loggers.
#[derive(Debug, Clone, Default)]
pub struct Runtime {
    writers: Arc<WriterRegistry>,
    colors: Arc<SourceColors>,
}

impl Runtime {
    /// Creates a runtime without sinks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a logger for the named source.
    #[must_use]
    pub fn logger(&self, name: impl Into<String>) -> Logger {
        Logger {
            name: name.into(),
            writers: Arc::clone(&self.writers),
            context: None,
        }
    }

    /// Registers a sink.
    pub fn register(&self, sink: SharedSink) -> Result<()> {
        self.writers.register(sink)
    }

    /// Registers a standard error sink configured by `config`.
    pub fn stderr_sink(&self, config: &OutputConfig) -> Result<()> {
        self.register(Arc::new(StreamSink::stderr(config, Arc::clone(&self.colors))))
    }

    /// The shared sink registry.
    #[must_use]
    pub fn writers(&self) -> &Arc<WriterRegistry> {
        &self.writers
    }

    /// The shared source color table.
    #[must_use]
    pub fn colors(&self) -> &Arc<SourceColors> {
        &self.colors
    }
}

/// One level of inherited default attributes.
#[derive(Debug)]
struct Context {
    parent: Option<Arc<Context>>,
    attrs: Attrs,
}

impl Context {
    /// Flattens the chain, root first, so nearer levels override.
    fn collect(&self) -> Attrs {
        match &self.parent {
            Some(parent) => parent.collect().merge(&self.attrs),
            None => self.attrs.clone(),
        }
    }
}

/// A named source of log records.
///
/// Cloning is cheap. [`Logger::with_attrs`] derives a child that shares the
/// name and sinks and adds default attributes to every record.
#[derive(Debug, Clone)]
pub struct Logger {
    name: String,
    writers: Arc<WriterRegistry>,
    context: Option<Arc<Context>>,
}

impl Logger {
    /// The source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The default attributes applied to every record, flattened.
    #[must_use]
    pub fn context(&self) -> Attrs {
        self.context
            .as_deref()
            .map(Context::collect)
            .unwrap_or_default()
    }

    /// Derives a logger whose records also carry `attrs`.
    ///
    /// Keys in `attrs` override inherited ones; call-site attributes override
    /// both. The receiver is left unchanged.
    #[must_use]
    pub fn with_attrs(&self, attrs: Attrs) -> Self {
        Self {
            name: self.name.clone(),
            writers: Arc::clone(&self.writers),
            context: Some(Arc::new(Context {
                parent: self.context.clone(),
                attrs,
            })),
        }
    }

    /// Emits a record at `level`.
    pub fn log(&self, level: Level, template: &str, args: impl Into<CallArgs>) {
        self.writers.dispatch(&self.record(level, template, args.into()));
    }

    fn record(&self, level: Level, template: &str, args: CallArgs) -> Record {
        let attrs = merge_call_args_with(&self.context(), args);
        Record::new(self.name.as_str(), level, template, attrs)
    }

    /// Renders the template, then appends `": err"` as plain text.
    fn log_error(
        &self,
        level: Level,
        template: &str,
        err: &(dyn std::error::Error + 'static),
        args: CallArgs,
    ) {
        let mut record = self.record(level, template, args);
        let _ = write!(record.message, ": {err}");
        self.writers.dispatch(&record);
    }

    /// Emits a verbose record.
    pub fn verbose(&self, template: &str, args: impl Into<CallArgs>) {
        self.log(Level::Verbose, template, args);
    }

    /// Emits a debug record.
    pub fn debug(&self, template: &str, args: impl Into<CallArgs>) {
        self.log(Level::Debug, template, args);
    }

    /// Emits an info record.
    pub fn info(&self, template: &str, args: impl Into<CallArgs>) {
        self.log(Level::Info, template, args);
    }

    /// Emits a warning record.
    pub fn warn(&self, template: &str, args: impl Into<CallArgs>) {
        self.log(Level::Warn, template, args);
    }

    /// Emits an error record.
    pub fn error(&self, template: &str, args: impl Into<CallArgs>) {
        self.log(Level::Error, template, args);
    }

    /// Emits an error record with `err` appended as `template: err`.
    pub fn error_with(
        &self,
        template: &str,
        err: &(dyn std::error::Error + 'static),
        args: impl Into<CallArgs>,
    ) {
        self.log_error(Level::Error, template, err, args.into());
    }

    /// Emits a fatal record without exiting.
    pub fn wtf(&self, template: &str, args: impl Into<CallArgs>) {
        self.log(Level::Fatal, template, args);
    }

    /// Emits a fatal record with `err` appended, without exiting.
    pub fn wtf_error(
        &self,
        template: &str,
        err: &(dyn std::error::Error + 'static),
        args: impl Into<CallArgs>,
    ) {
        self.log_error(Level::Fatal, template, err, args.into());
    }

    /// Emits a fatal record and exits the process with status 1.
    pub fn fatal(&self, template: &str, args: impl Into<CallArgs>) -> ! {
        self.log(Level::Fatal, template, args);
        std::process::exit(1)
    }

    /// Starts a timer bound to this logger and its context.
    #[must_use]
    pub fn timer(&self) -> Timer {
        Timer {
            logger: self.clone(),
            started_at: now_nanos(),
            start: Instant::now(),
        }
    }

    /// Runs `f`, logging and returning a report if it panics.
    ///
    /// A panic produces one fatal record `panic: <reason>` followed by the
    /// rendered stack, carrying `context` on top of the logger's defaults.
    pub fn recover<T>(
        &self,
        context: Attrs,
        f: impl FnOnce() -> T,
    ) -> std::result::Result<T, PanicReport> {
        PanicRecoverer::new().catch(f).map_err(|report| {
            self.report_panic(&report, context);
            report
        })
    }

    /// Emits the fatal record for a recovered panic.
    pub fn report_panic(&self, report: &PanicReport, context: Attrs) {
        let args = CallArgs::new()
            .push(report.reason.as_str())
            .push(report.stack.as_str())
            .push(context);
        self.log(Level::Fatal, "{}\n{}", args);
    }

    fn emit_verbatim(&self, level: Level, message: String, args: impl Into<CallArgs>) {
        let mut record = self.record(level, "", args.into());
        record.message = message;
        self.writers.dispatch(&record);
    }
}

/// A running measurement. Ends at most once.
#[derive(Debug)]
#[must_use = "a timer emits nothing until `end` is called"]
pub struct Timer {
    logger: Logger,
    started_at: i64,
    start: Instant,
}

impl Timer {
    /// Emits a timer record with the time since the timer started.
    ///
    /// The record is stamped with the start time, so `time + elapsed`
    /// gives the end.
    pub fn end(self, template: &str, args: impl Into<CallArgs>) {
        let elapsed = i64::try_from(self.start.elapsed().as_nanos()).unwrap_or(i64::MAX);
        let record = self
            .logger
            .record(Level::Timer, template, args.into())
            .with_time(self.started_at)
            .with_elapsed(elapsed);
        self.logger.writers.dispatch(&record);
    }
}

impl fmt::Display for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Dumps `value` as indented JSON in a verbose record headed by `prefix`.
///
/// Object fields holding empty strings are left out.
pub fn inspect(logger: &Logger, prefix: &str, value: &impl Serialize) {
    let dump = serde_json::to_value(value).and_then(|mut json| {
        drop_empty_strings(&mut json);
        serde_json::to_string_pretty(&json)
    });
    match dump {
        Ok(dump) => logger.emit_verbatim(Level::Verbose, format!("{prefix}\n{dump}"), ()),
        Err(err) => {
            tracing::warn!(source = logger.name(), error = %err, "unable to serialize inspected value");
        }
    }
}

fn drop_empty_strings(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.retain(|_, v| !matches!(v, serde_json::Value::String(s) if s.is_empty()));
            map.values_mut().for_each(drop_empty_strings);
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(drop_empty_strings),
        _ => {}
    }
}

/// Logs an error record if a close operation failed.
///
/// Meant for the result of releasing a resource, where the failure is worth
/// recording but not worth propagating.
pub fn close_with_log<E>(logger: &Logger, result: std::result::Result<(), E>, template: &str)
where
    E: std::error::Error + 'static,
{
    if let Err(err) = result {
        logger.error_with(template, &err, ());
    }
}
