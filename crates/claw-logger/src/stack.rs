//! Stack dump parsing, grouping and rendering.
//!
//! A dump is a sequence of thread sections:
//!
//! ```text
//! thread #1 [running] [main]:
//!    0: app::worker::step
//!              at /src/app/worker.rs:42:9
//!    1: app::main
//!              at /src/app/main.rs:7:5
//! thread #2 [parked]:
//!    0: std::thread::park
//!    (...)
//! ```
//!
//! Frame lines follow the layout of `std::backtrace::Backtrace`'s display
//! form, so a captured backtrace can be appended directly under a header.
//! Frames without a preceding header are collected into an implicit thread.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::color::Color;
use crate::error::{LoggerError, Result};

/// Maximum number of frame lines rendered across all groups.
pub const MAX_FRAME_LINES: usize = 300;

/// Groups with at least this many members are shown as a count.
const COLLAPSE_IDS_AT: usize = 3;

static HEADER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^thread #(\d+) \[([^\]]*)\]((?:\s*\[[^\]]*\])*)\s*:?\s*$")
        .unwrap_or_else(|_| unreachable!())
});

static ANNOTATION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]").unwrap_or_else(|_| unreachable!()));

static FRAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+:\s+(.+?)\s*$").unwrap_or_else(|_| unreachable!()));

static LOCATION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+at\s+(.+?)\s*$").unwrap_or_else(|_| unreachable!()));

static ELIDED_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\(\.\.\.\)\s*$").unwrap_or_else(|_| unreachable!()));

/// Source location shown for frames without one.
const UNKNOWN_SOURCE: &str = "?";

/// One call in a thread's stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    /// Short source location, `file.rs:line:col`.
    pub source: String,
    /// Fully qualified function name.
    pub function: String,
    /// Argument text, empty when the dump carries none.
    pub args: String,
}

impl Frame {
    /// Creates a frame without location or arguments.
    #[must_use]
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            source: UNKNOWN_SOURCE.to_string(),
            function: function.into(),
            args: String::new(),
        }
    }

    /// Sets the source location, keeping only the file name.
    #[must_use]
    pub fn at(mut self, location: &str) -> Self {
        self.source = short_source(location);
        self
    }

    /// Returns true if this frame belongs to the panic machinery rather than
    /// to the code that faulted.
    #[must_use]
    pub fn is_panic_machinery(&self) -> bool {
        let function = self.function.trim_start_matches('<');
        function.starts_with("std::panicking::")
            || function.starts_with("core::panicking::")
            || function.starts_with("std::panic::panic_any")
            || function.contains("rust_begin_unwind")
            || function.contains("__rust_end_short_backtrace")
    }

    fn call(&self) -> String {
        if self.args.is_empty() {
            self.function.clone()
        } else {
            format!("{}({})", self.function, self.args)
        }
    }
}

/// Reduces a path like `/a/b/c.rs:10:5` to `c.rs:10:5`.
fn short_source(location: &str) -> String {
    let location = location.trim();
    location
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(location)
        .to_string()
}

/// The parsed stack of a single thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadStack {
    /// Thread number.
    pub id: u64,
    /// Scheduling state, e.g. `running`.
    pub state: String,
    /// Extra bracketed header notes, e.g. the thread name.
    pub annotations: Vec<String>,
    /// Frames, innermost first.
    pub frames: Vec<Frame>,
    /// True if the dump cut this stack short.
    pub elided: bool,
}

impl ThreadStack {
    fn implicit() -> Self {
        Self {
            id: 0,
            state: "running".to_string(),
            annotations: Vec::new(),
            frames: Vec::new(),
            elided: false,
        }
    }
}

/// A parsed multi-thread stack dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDump {
    /// Threads in dump order; the first one is the faulting thread.
    pub threads: Vec<ThreadStack>,
}

impl StackDump {
    /// Parses dump text.
    ///
    /// Unrecognized lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the text holds no frames at all.
    pub fn parse(text: &str) -> Result<Self> {
        let mut threads = Vec::new();
        let mut current: Option<ThreadStack> = None;

        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(caps) = HEADER_REGEX.captures(line) {
                threads.extend(current.take());
                let annotations = caps.get(3).map_or_else(Vec::new, |m| {
                    ANNOTATION_REGEX
                        .captures_iter(m.as_str())
                        .map(|a| a[1].trim().to_string())
                        .collect()
                });
                current = Some(ThreadStack {
                    id: caps[1].parse().unwrap_or_default(),
                    state: caps[2].trim().to_string(),
                    annotations,
                    frames: Vec::new(),
                    elided: false,
                });
                continue;
            }

            if let Some(caps) = LOCATION_REGEX.captures(line) {
                if let Some(frame) = current.as_mut().and_then(|t| t.frames.last_mut()) {
                    frame.source = short_source(&caps[1]);
                }
                continue;
            }

            if ELIDED_REGEX.is_match(line) {
                if let Some(thread) = current.as_mut() {
                    thread.elided = true;
                }
                continue;
            }

            if let Some(caps) = FRAME_REGEX.captures(line) {
                current
                    .get_or_insert_with(ThreadStack::implicit)
                    .frames
                    .push(Frame::new(&caps[1]));
                continue;
            }

            // Inlined symbols are printed indented, without a frame number.
            if line.starts_with(' ') {
                if let Some(thread) = current.as_mut().filter(|t| !t.frames.is_empty()) {
                    thread.frames.push(Frame::new(line.trim()));
                }
            }
        }
        threads.extend(current);

        if threads.iter().all(|t| t.frames.is_empty()) {
            return Err(LoggerError::StackParse(format!(
                "no frames found in {} lines",
                text.lines().count()
            )));
        }
        Ok(Self { threads })
    }
}

/// Threads sharing an identical stack, collapsed into one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadGroup {
    /// Ids of the member threads.
    pub member_ids: BTreeSet<u64>,
    /// Shared scheduling state.
    pub state: String,
    /// Shared header notes.
    pub annotations: Vec<String>,
    /// Shared frames, innermost first.
    pub frames: Vec<Frame>,
    /// True if the stack was cut short.
    pub elided: bool,
}

impl ThreadGroup {
    fn from_thread(thread: &ThreadStack) -> Self {
        Self {
            member_ids: BTreeSet::from([thread.id]),
            state: thread.state.clone(),
            annotations: thread.annotations.clone(),
            frames: thread.frames.clone(),
            elided: thread.elided,
        }
    }

    fn matches(&self, thread: &ThreadStack) -> bool {
        self.state == thread.state
            && self.annotations == thread.annotations
            && self.elided == thread.elided
            && self.frames == thread.frames
    }

    /// Drops every frame up to and including the first run of panic
    /// machinery frames, leaving the faulting call on top.
    ///
    /// Machinery further out, such as the `catch_unwind` that recovered the
    /// panic, is kept.
    pub fn trim_panic_frames(&mut self) {
        let Some(start) = self.frames.iter().position(Frame::is_panic_machinery) else {
            return;
        };
        let end = self.frames[start..]
            .iter()
            .position(|f| !f.is_panic_machinery())
            .map_or(self.frames.len(), |offset| start + offset);
        self.frames.drain(..end);
    }

    fn header(&self) -> String {
        let members = if self.member_ids.len() < COLLAPSE_IDS_AT {
            self.member_ids
                .iter()
                .map(|id| format!("#{id}"))
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            format!("Group of {} threads", self.member_ids.len())
        };

        let mut header = format!("{members}: {}", self.state);
        for annotation in &self.annotations {
            let _ = write!(header, " [{annotation}]");
        }
        header
    }
}

/// Groups threads with structurally identical stacks, keeping first-seen
/// order. The faulting thread's group comes first and has its panic frames
/// trimmed.
#[must_use]
pub fn group_threads(threads: &[ThreadStack]) -> Vec<ThreadGroup> {
    let mut groups: Vec<ThreadGroup> = Vec::new();
    for thread in threads {
        match groups.iter_mut().find(|g| g.matches(thread)) {
            Some(group) => {
                group.member_ids.insert(thread.id);
            }
            None => groups.push(ThreadGroup::from_thread(thread)),
        }
    }
    if let Some(primary) = groups.first_mut() {
        primary.trim_panic_frames();
    }
    groups
}

/// Renders groups as aligned text, emitting at most `budget` frame lines.
///
/// Once the budget is spent, later groups show only their header followed
/// by ` (...)`.
#[must_use]
pub fn render_groups(groups: &[ThreadGroup], budget: usize) -> String {
    render_groups_with(groups, budget, false)
}

/// Like [`render_groups`], optionally dimming every group after the first
/// so the faulting thread stands out on a terminal.
#[must_use]
pub fn render_groups_with(groups: &[ThreadGroup], budget: usize, dim_background: bool) -> String {
    let width = groups
        .iter()
        .flat_map(|g| &g.frames)
        .map(|f| f.source.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let mut emitted = 0usize;

    for (i, group) in groups.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let mut block = group.header();
        if emitted >= budget {
            block.push_str(" (...)\n");
        } else {
            block.push('\n');
            let mut truncated = false;
            for frame in &group.frames {
                if emitted >= budget {
                    truncated = true;
                    break;
                }
                let _ = writeln!(block, "    {:<width$}  {}", frame.source, frame.call());
                emitted += 1;
            }
            if truncated || group.elided {
                block.push_str("    (...)\n");
            }
        }

        if dim_background && i > 0 {
            out.push_str(&Color::Dim.paint(block.trim_end_matches('\n')));
            out.push('\n');
        } else {
            out.push_str(&block);
        }
    }
    out
}

/// Counts rendered frame lines (lines indented by four spaces that are not
/// elision markers). Color codes are ignored.
#[must_use]
pub fn count_frame_lines(rendered: &str) -> usize {
    rendered
        .lines()
        .map(|l| l.replace(Color::Dim.code(), "").replace(Color::Reset.code(), ""))
        .filter(|l| l.starts_with("    ") && l.trim() != "(...)")
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DUMP: &str = "\
thread #1 [running] [main]:
   0: std::backtrace::Backtrace::force_capture
             at /rustc/abc/library/std/src/backtrace.rs:312:9
   1: std::panicking::rust_panic_with_hook
             at /rustc/abc/library/std/src/panicking.rs:800:13
   2: core::panicking::panic_fmt
             at /rustc/abc/library/core/src/panicking.rs:74:14
   3: app::orders::place
             at /src/app/orders.rs:42:9
   4: app::main
             at /src/app/main.rs:7:5
thread #2 [parked] [worker]:
   0: std::thread::park
             at /rustc/abc/library/std/src/thread/mod.rs:1000:9
   1: app::pool::wait
             at /src/app/pool.rs:18:13
thread #3 [parked] [worker]:
   0: std::thread::park
             at /rustc/abc/library/std/src/thread/mod.rs:1000:9
   1: app::pool::wait
             at /src/app/pool.rs:18:13
";

    #[test]
    fn parses_headers_and_frames() {
        let dump = StackDump::parse(DUMP).expect("parse");
        assert_eq!(dump.threads.len(), 3);

        let main = &dump.threads[0];
        assert_eq!(main.id, 1);
        assert_eq!(main.state, "running");
        assert_eq!(main.annotations, vec!["main".to_string()]);
        assert_eq!(main.frames.len(), 5);
        assert_eq!(main.frames[3].function, "app::orders::place");
        assert_eq!(main.frames[3].source, "orders.rs:42:9");
    }

    #[test]
    fn identical_stacks_collapse() {
        let dump = StackDump::parse(DUMP).expect("parse");
        let groups = group_threads(&dump.threads);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].member_ids, BTreeSet::from([1]));
        assert_eq!(groups[1].member_ids, BTreeSet::from([2, 3]));
    }

    #[test]
    fn primary_group_trimmed_to_fault_site() {
        let dump = StackDump::parse(DUMP).expect("parse");
        let groups = group_threads(&dump.threads);

        let functions: Vec<&str> = groups[0].frames.iter().map(|f| f.function.as_str()).collect();
        assert_eq!(functions, vec!["app::orders::place", "app::main"]);
        // background groups untouched
        assert_eq!(groups[1].frames.len(), 2);
    }

    #[test]
    fn frame_with_args_renders_call() {
        let frame = Frame {
            args: "0x1, 0x2".to_string(),
            ..Frame::new("app::f").at("/src/app/lib.rs:9:1")
        };
        assert_eq!(frame.source, "lib.rs:9:1");
        assert_eq!(frame.call(), "app::f(0x1, 0x2)");
        assert_eq!(Frame::new("app::g").call(), "app::g");
    }

    #[test]
    fn trimming_keeps_outer_recovery_frames() {
        let mut group = ThreadGroup::from_thread(&ThreadStack {
            frames: vec![
                Frame::new("claw_logger::panic::capture_current_dump"),
                Frame::new("std::panicking::rust_panic_with_hook"),
                Frame::new("std::panic::panic_any"),
                Frame::new("app::job::run"),
                Frame::new("std::panicking::try"),
                Frame::new("std::panic::catch_unwind"),
                Frame::new("app::main"),
            ],
            ..ThreadStack::implicit()
        });
        group.trim_panic_frames();

        let functions: Vec<&str> = group.frames.iter().map(|f| f.function.as_str()).collect();
        assert_eq!(
            functions,
            vec!["app::job::run", "std::panicking::try", "std::panic::catch_unwind", "app::main"]
        );
    }

    #[test]
    fn trimming_without_machinery_keeps_frames() {
        let mut group = ThreadGroup::from_thread(&ThreadStack {
            frames: vec![Frame::new("a"), Frame::new("b")],
            ..ThreadStack::implicit()
        });
        group.trim_panic_frames();
        assert_eq!(group.frames.len(), 2);
    }

    #[test]
    fn differing_state_splits_groups() {
        let text = "thread #1 [running]:\n 0: f\nthread #2 [parked]:\n 0: f\n";
        let dump = StackDump::parse(text).expect("parse");
        assert_eq!(group_threads(&dump.threads).len(), 2);
    }

    #[test]
    fn rendering_aligns_sources_and_labels_groups() {
        let dump = StackDump::parse(DUMP).expect("parse");
        let rendered = render_groups(&group_threads(&dump.threads), MAX_FRAME_LINES);

        assert!(rendered.starts_with("#1: running [main]\n"));
        assert!(rendered.contains("#2, #3: parked [worker]\n"));
        assert!(rendered.contains("    orders.rs:42:9  app::orders::place\n"));
        assert!(rendered.contains("    mod.rs:1000:9   std::thread::park\n"));
    }

    #[test]
    fn large_groups_show_count() {
        let mut text = String::new();
        for id in 1..=5 {
            text.push_str(&format!("thread #{id} [idle]:\n   0: app::idle\n"));
        }
        let dump = StackDump::parse(&text).expect("parse");
        let groups = group_threads(&dump.threads);
        assert_eq!(groups.len(), 1);
        assert!(render_groups(&groups, MAX_FRAME_LINES).starts_with("Group of 5 threads: idle"));
    }

    #[test]
    fn raw_backtrace_without_header_is_implicit_thread() {
        let text = "   0: app::f\n             at ./src/lib.rs:3:5\n      app::inlined\n   1: app::g\n";
        let dump = StackDump::parse(text).expect("parse");
        assert_eq!(dump.threads.len(), 1);
        let functions: Vec<&str> = dump.threads[0].frames.iter().map(|f| f.function.as_str()).collect();
        assert_eq!(functions, vec!["app::f", "app::inlined", "app::g"]);
        assert_eq!(dump.threads[0].frames[0].source, "lib.rs:3:5");
    }

    #[test]
    fn elided_marker_is_kept() {
        let text = "thread #4 [running]:\n   0: app::deep\n   (...)\n";
        let dump = StackDump::parse(text).expect("parse");
        assert!(dump.threads[0].elided);
        let rendered = render_groups(&group_threads(&dump.threads), MAX_FRAME_LINES);
        assert!(rendered.ends_with("    (...)\n"));
    }

    #[test]
    fn garbage_fails_to_parse() {
        assert!(StackDump::parse("unsupported backtrace").is_err());
        assert!(StackDump::parse("").is_err());
        assert!(StackDump::parse("thread #1 [running]:\n").is_err());
    }

    #[test]
    fn budget_exhaustion_prints_headers_only() {
        let mut text = String::new();
        for id in 1..=40 {
            text.push_str(&format!("thread #{id} [running]:\n"));
            for depth in 0..20 {
                text.push_str(&format!("   {depth}: app::t{id}::f{depth}\n"));
            }
        }
        let dump = StackDump::parse(&text).expect("parse");
        let groups = group_threads(&dump.threads);
        let rendered = render_groups(&groups, MAX_FRAME_LINES);

        assert_eq!(count_frame_lines(&rendered), MAX_FRAME_LINES);
        assert!(rendered.contains("#40: running (...)"));
    }

    #[test]
    fn dimmed_rendering_leaves_primary_group_plain() {
        let dump = StackDump::parse(DUMP).expect("parse");
        let groups = group_threads(&dump.threads);
        let rendered = render_groups_with(&groups, MAX_FRAME_LINES, true);

        assert!(rendered.starts_with("#1: running [main]\n    orders.rs"));
        let dimmed = format!("{}#2, #3: parked [worker]\n", Color::Dim.code());
        assert!(rendered.contains(&dimmed), "{rendered}");
        assert!(rendered.ends_with(&format!("app::pool::wait{}\n", Color::Reset.code())));
        assert_eq!(count_frame_lines(&rendered), 4);
        assert_eq!(
            count_frame_lines(&rendered),
            count_frame_lines(&render_groups(&groups, MAX_FRAME_LINES))
        );
    }

    #[test]
    fn dimmed_budget_markers_are_not_counted() {
        let mut text = String::new();
        for id in 1..=3 {
            text.push_str(&format!("thread #{id} [running]:\n   0: app::t{id}\n   (...)\n"));
        }
        let dump = StackDump::parse(&text).expect("parse");
        let rendered = render_groups_with(&group_threads(&dump.threads), 2, true);
        assert_eq!(count_frame_lines(&rendered), 2);
        assert!(rendered.contains("#3: running (...)"));
    }

    proptest! {
        #[test]
        fn frame_lines_never_exceed_budget(threads in 1usize..60, depth in 1usize..40, budget in 0usize..400) {
            let stacks: Vec<ThreadStack> = (0..threads)
                .map(|t| ThreadStack {
                    id: t as u64,
                    frames: (0..depth).map(|d| Frame::new(format!("f{t}_{d}"))).collect(),
                    ..ThreadStack::implicit()
                })
                .collect();
            let rendered = render_groups(&group_threads(&stacks), budget);
            prop_assert!(count_frame_lines(&rendered) <= budget);
        }
    }
}
