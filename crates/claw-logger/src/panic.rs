//! Panic capture and crash reports.
//!
//! [`PanicRecoverer::catch`] runs a closure and turns a panic inside it into
//! a [`PanicReport`]: the panic reason plus the panicking thread's stack,
//! grouped and trimmed to the fault site. Installing the hook lets the stack
//! be taken at the panic site itself instead of at the recovery point.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt::{self, Write as _};
use std::panic::{catch_unwind, AssertUnwindSafe, Location};
use std::sync::Once;

use crate::stack::{group_threads, render_groups_with, StackDump, ThreadGroup, MAX_FRAME_LINES};

static HOOK: Once = Once::new();

thread_local! {
    static LAST_DUMP: RefCell<Option<String>> = const { RefCell::new(None) };
    static RECOVER_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// A recovered panic, ready to be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicReport {
    /// `panic: <message>`.
    pub reason: String,
    /// Rendered stack, or the raw dump if it could not be parsed.
    pub stack: String,
    /// Parsed thread groups; empty when the dump could not be parsed.
    pub groups: Vec<ThreadGroup>,
}

impl PanicReport {
    /// Reason and stack, separated by a blank line.
    #[must_use]
    pub fn pretty(&self) -> String {
        format!("{}\n\n{}", self.reason, self.stack)
    }

    /// Returns true if the stack was parsed into groups.
    #[must_use]
    pub fn is_parsed(&self) -> bool {
        !self.groups.is_empty()
    }
}

impl fmt::Display for PanicReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for PanicReport {}

/// Renders the reason line for a panic payload.
///
/// String payloads are used as-is; boxed errors contribute their message and
/// source chain.
#[must_use]
pub fn panic_reason(payload: &(dyn Any + Send)) -> String {
    let detail = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(err) = payload.downcast_ref::<Box<dyn std::error::Error + Send + Sync>>() {
        error_chain(err.as_ref())
    } else if let Some(report) = payload.downcast_ref::<PanicReport>() {
        report.reason.clone()
    } else {
        "Box<dyn Any>".to_string()
    };
    format!("panic: {detail}")
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Returns the numeric part of the current thread's id.
fn thread_number() -> u64 {
    let id = format!("{:?}", std::thread::current().id());
    id.chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .unwrap_or_default()
}

/// Captures the current thread's stack as dump text, noting the panic
/// location in the header when known.
fn capture_current_dump(location: Option<&Location<'_>>) -> String {
    let thread = std::thread::current();
    let name = thread.name().unwrap_or("unnamed");
    let backtrace = Backtrace::force_capture();
    let mut header = format!("thread #{} [running] [{name}]", thread_number());
    if let Some(location) = location {
        let _ = write!(header, " [at {}:{}]", location.file(), location.line());
    }
    format!("{header}:\n{backtrace}")
}

fn take_stashed_dump() -> Option<String> {
    LAST_DUMP
        .try_with(|slot| slot.try_borrow_mut().ok().and_then(|mut slot| slot.take()))
        .ok()
        .flatten()
}

/// Marks the current thread as inside a recovery scope for its lifetime.
struct RecoverScope;

impl RecoverScope {
    fn enter() -> Self {
        let _ = RECOVER_DEPTH.try_with(|depth| depth.set(depth.get() + 1));
        let _ = take_stashed_dump();
        Self
    }
}

impl Drop for RecoverScope {
    fn drop(&mut self) {
        let _ = RECOVER_DEPTH.try_with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Converts panics into [`PanicReport`]s.
#[derive(Debug, Clone, Copy)]
pub struct PanicRecoverer {
    frame_budget: usize,
    dim_background: bool,
}

impl Default for PanicRecoverer {
    fn default() -> Self {
        Self::new()
    }
}

impl PanicRecoverer {
    /// Creates a recoverer rendering at most [`MAX_FRAME_LINES`] frames.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frame_budget: MAX_FRAME_LINES,
            dim_background: false,
        }
    }

    /// Overrides the frame line budget.
    #[must_use]
    pub const fn with_frame_budget(mut self, frame_budget: usize) -> Self {
        self.frame_budget = frame_budget;
        self
    }

    /// Dims every thread group after the faulting one with ANSI codes.
    /// Only useful when the report ends up on a terminal.
    #[must_use]
    pub const fn with_dimmed_background(mut self, dim_background: bool) -> Self {
        self.dim_background = dim_background;
        self
    }

    /// Installs the process-wide panic hook. Later calls do nothing.
    ///
    /// The hook records the panicking thread's backtrace for the next
    /// capture on that thread. Panics inside [`PanicRecoverer::catch`] are
    /// not passed on to the previously installed hook; all others are.
    pub fn install_hook() {
        HOOK.call_once(|| {
            let previous = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                let dump = capture_current_dump(info.location());
                let _ = LAST_DUMP.try_with(|slot| {
                    if let Ok(mut slot) = slot.try_borrow_mut() {
                        *slot = Some(dump);
                    }
                });
                let recovering = RECOVER_DEPTH.try_with(Cell::get).unwrap_or_default() > 0;
                if !recovering {
                    previous(info);
                }
            }));
        });
    }

    /// Runs `f`, returning its value or a report of the panic it raised.
    ///
    /// # Errors
    ///
    /// Returns the [`PanicReport`] if `f` panicked.
    pub fn catch<T>(&self, f: impl FnOnce() -> T) -> Result<T, PanicReport> {
        Self::install_hook();
        let scope = RecoverScope::enter();
        let result = catch_unwind(AssertUnwindSafe(f));
        drop(scope);
        result.map_err(|payload| self.report(panic_reason(payload.as_ref())))
    }

    /// Builds a report for a payload obtained from `catch_unwind`.
    ///
    /// Returns `None` when there is no payload, i.e. nothing panicked.
    #[must_use]
    pub fn capture(&self, payload: Option<&(dyn Any + Send)>) -> Option<PanicReport> {
        payload.map(|payload| self.report(panic_reason(payload)))
    }

    fn report(&self, reason: String) -> PanicReport {
        let dump = take_stashed_dump().unwrap_or_else(|| capture_current_dump(None));
        self.report_from_dump(reason, &dump)
    }

    /// Builds a report from dump text.
    ///
    /// If the dump cannot be parsed the report carries the raw text and no
    /// groups.
    #[must_use]
    pub fn report_from_dump(&self, reason: impl Into<String>, dump: &str) -> PanicReport {
        let reason = reason.into();
        match StackDump::parse(dump) {
            Ok(parsed) => {
                let groups = group_threads(&parsed.threads);
                let stack = render_groups_with(&groups, self.frame_budget, self.dim_background);
                PanicReport {
                    reason,
                    stack,
                    groups,
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "unable to parse panic stack trace");
                PanicReport {
                    reason,
                    stack: dump.to_string(),
                    groups: Vec::new(),
                }
            }
        }
    }
}
