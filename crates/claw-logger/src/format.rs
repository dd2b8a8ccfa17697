//! Line formats for stream sinks.
//!
//! - [`pretty_line`] — colored, human-oriented form
//! - [`json_line`] — one JSON object per record

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::color::{Color, SourceColors};
use crate::level::Level;
use crate::record::Record;

/// Columns occupied by the timestamp, a space and the level symbol.
pub const GUTTER_WIDTH: usize = 25;

/// Options for [`pretty_line`].
#[derive(Debug, Clone, Copy)]
pub struct PrettyStyle<'a> {
    /// Emit ANSI color codes.
    pub colors: bool,
    /// Per-source colors for the source name, if enabled.
    pub source_colors: Option<&'a SourceColors>,
}

impl PrettyStyle<'_> {
    /// Style without any ANSI codes.
    #[must_use]
    pub const fn plain() -> Self {
        Self {
            colors: false,
            source_colors: None,
        }
    }
}

/// Formats an elapsed duration the way `Duration`'s debug form does.
#[must_use]
pub fn format_elapsed(nanos: i64) -> String {
    format!("{:?}", Duration::from_nanos(nanos.max(0) as u64))
}

fn format_timestamp(nanos: i64) -> String {
    DateTime::from_timestamp_nanos(nanos)
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}

/// Renders a record as a human-readable line.
///
/// Continuation lines of a multi-line message are indented so their `│`
/// lines up with the first line's. Unconsumed attributes follow the message
/// as `key=value` pairs.
#[must_use]
pub fn pretty_line(record: &Record, style: PrettyStyle<'_>) -> String {
    let level = record.level;
    let source = match (style.colors, style.source_colors) {
        (true, Some(colors)) => format!(
            "{}{}{}",
            colors.color_for(&record.source).code(),
            record.source,
            level.color().code()
        ),
        _ => record.source.clone(),
    };
    let elapsed = if record.is_timed() {
        format!("({})", format_elapsed(record.elapsed_nanos))
    } else {
        String::new()
    };

    let mut body = format!("{} │ {source}{elapsed}: ", level.symbol());
    for (i, line) in record.message.split('\n').enumerate() {
        if i > 0 {
            let _ = write!(body, "\n{:width$} │   ", "", width = GUTTER_WIDTH);
        }
        body.push_str(line);
    }

    let mut tail = String::new();
    for (key, value) in &record.display_attrs {
        let _ = write!(tail, " {key}={value}");
    }

    let timestamp = format_timestamp(record.time);
    if !style.colors {
        return format!("{timestamp} {body}{tail}");
    }
    if level == Level::Fatal && !tail.is_empty() {
        tail = Color::Red.paint(&tail);
    }
    format!(
        "{} {}{}",
        Color::Dim.paint(&timestamp),
        level.color().paint(&body),
        tail
    )
}

/// Renders a record as a single JSON object.
///
/// Encoding failures produce a `logger-error` object instead of dropping the
/// record.
#[must_use]
pub fn json_line(record: &Record) -> String {
    match serde_json::to_string(record) {
        Ok(line) => line,
        Err(err) => {
            tracing::warn!(error = %err, source = %record.source, "failed to encode log record");
            serde_json::json!({ "logger-error": err.to_string() }).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use crate::attrs::Attrs;

    fn record(level: Level, message: &str, attrs: Attrs) -> Record {
        Record::new("db", level, message, attrs)
    }

    #[test]
    fn plain_line_layout() {
        let line = pretty_line(
            &record(Level::Info, "hello {who}", attrs! { "who" => "ada", "n" => 2 }),
            PrettyStyle::plain(),
        );
        assert!(line.ends_with("I │ db: hello ada n=2"), "{line}");
        assert!(!line.contains('\x1b'));
    }

    #[test]
    fn timer_line_shows_elapsed() {
        let line = pretty_line(
            &record(Level::Timer, "done", Attrs::new()).with_elapsed(1_500_000),
            PrettyStyle::plain(),
        );
        assert!(line.ends_with("T │ db(1.5ms): done"), "{line}");
    }

    #[test]
    fn continuation_lines_aligned_under_gutter() {
        let line = pretty_line(&record(Level::Warn, "first\nsecond", Attrs::new()), PrettyStyle::plain());
        let lines: Vec<&str> = line.split('\n').collect();
        assert_eq!(lines.len(), 2);
        let first_bar = lines[0].chars().position(|c| c == '│');
        let second_bar = lines[1].chars().position(|c| c == '│');
        assert_eq!(first_bar, second_bar);
        assert!(lines[1].ends_with("│   second"));
    }

    #[test]
    fn colored_line_uses_level_color() {
        let colors = SourceColors::new();
        let style = PrettyStyle {
            colors: true,
            source_colors: Some(&colors),
        };
        let line = pretty_line(&record(Level::Error, "boom", Attrs::new()), style);
        assert!(line.contains(Color::Red.code()));
        assert!(line.contains(Color::Blue.code()), "source gets first palette color");
        assert_eq!(colors.len(), 1);
    }

    #[test]
    fn fatal_attr_tail_is_red() {
        let style = PrettyStyle {
            colors: true,
            source_colors: None,
        };
        let line = pretty_line(&record(Level::Fatal, "x", attrs! { "k" => "v" }), style);
        assert!(line.ends_with(&Color::Red.paint(" k=v")));
    }

    #[test]
    fn json_line_is_parseable() {
        let line = json_line(&record(Level::Info, "hi", attrs! { "k" => "v" }));
        let value: serde_json::Value = serde_json::from_str(&line).expect("valid json");
        assert_eq!(value["package"], "db");
        assert_eq!(value["level"], "INFO");
        assert_eq!(value["attrs"]["k"], "v");
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(0), "0ns");
        assert_eq!(format_elapsed(2_000_000_000), "2s");
        assert_eq!(format_elapsed(-5), "0ns");
    }
}
