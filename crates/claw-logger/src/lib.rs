//! # claw-logger
//!
//! Structured logging pipeline for Clawbernetes services.
//!
//! This crate provides:
//!
//! - [`Logger`] — Named source logger with inherited attributes and timers
//! - [`Attrs`] / [`Value`] — Typed key/value attributes
//! - [`render`] — Brace-placeholder message templates
//! - [`VerbosityRules`] — Per-source minimum severity filtering
//! - [`WriterRegistry`] / [`Sink`] — Fan-out to pretty, JSON, memory and `tracing` sinks
//! - [`PanicRecoverer`] — Converts panics into grouped, bounded stack reports
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use claw_logger::{attrs, MemorySink, OutputConfig, Runtime};
//!
//! let runtime = Runtime::new();
//! let memory = Arc::new(MemorySink::with_rules(
//!     OutputConfig::new().with_filter("*@error,db@timer").rules(),
//! ));
//! runtime.register(memory.clone()).unwrap();
//!
//! let db = runtime.logger("db");
//! db.debug("connecting", ());
//! db.timer().end("query {table}", attrs! { "table" => "orders" });
//!
//! assert_eq!(memory.len(), 1);
//! assert_eq!(memory.records()[0].message, "query orders");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod attrs;
pub mod color;
pub mod config;
pub mod error;
pub mod filter;
pub mod format;
pub mod level;
pub mod logger;
pub mod panic;
pub mod record;
pub mod sink;
pub mod stack;
pub mod template;

// Re-export main types
pub use attrs::{merge_call_args, merge_call_args_with, Arg, Attrs, CallArgs, Value};
pub use color::{Color, SourceColors};
pub use config::{OutputConfig, OutputFormat};
pub use error::{LoggerError, Result};
pub use filter::VerbosityRules;
pub use format::{json_line, pretty_line, PrettyStyle};
pub use level::{Level, Priority};
pub use logger::{close_with_log, inspect, Logger, Runtime, Timer};
pub use panic::{PanicRecoverer, PanicReport};
pub use record::Record;
pub use sink::{MemorySink, SharedSink, Sink, StreamSink, TracingSink, WriterRegistry};
pub use stack::{
    group_threads, render_groups, render_groups_with, Frame, StackDump, ThreadGroup,
    ThreadStack,
};
pub use template::{render, Rendered};
