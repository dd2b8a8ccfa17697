//! ANSI display colors and per-source color assignment.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Display color tokens used by pretty sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    /// Terminal default.
    Reset,
    /// Dimmed gray.
    Dim,
    /// White.
    White,
    /// Red.
    Red,
    /// Green.
    Green,
    /// Yellow.
    Yellow,
    /// Blue.
    Blue,
    /// Magenta.
    Magenta,
    /// Cyan.
    Cyan,
}

impl Color {
    /// Returns the ANSI escape sequence for this color.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Reset => "\x1b[0m",
            Self::Dim => "\x1b[90m",
            Self::White => "\x1b[37m",
            Self::Red => "\x1b[31m",
            Self::Green => "\x1b[32m",
            Self::Yellow => "\x1b[33m",
            Self::Blue => "\x1b[34m",
            Self::Magenta => "\x1b[35m",
            Self::Cyan => "\x1b[36m",
        }
    }

    /// Wraps `text` in this color, resetting afterwards.
    #[must_use]
    pub fn paint(self, text: &str) -> String {
        format!("{}{text}{}", self.code(), Self::Reset.code())
    }
}

/// Colors handed out to sources, in order of first use.
const PALETTE: [Color; 5] = [
    Color::Blue,
    Color::Green,
    Color::Cyan,
    Color::Yellow,
    Color::Magenta,
];

#[derive(Debug, Default)]
struct Assignments {
    next: usize,
    by_source: HashMap<String, Color>,
}

/// Thread-safe source name to color table.
///
/// The first lookup of a name assigns it the next palette color; every later
/// lookup, from any thread, returns the same color.
#[derive(Debug, Default)]
pub struct SourceColors {
    inner: Mutex<Assignments>,
}

impl SourceColors {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the color assigned to `source`, assigning one if needed.
    pub fn color_for(&self, source: &str) -> Color {
        let mut inner = self.inner.lock();
        if let Some(color) = inner.by_source.get(source) {
            return *color;
        }
        let color = PALETTE[inner.next % PALETTE.len()];
        inner.next += 1;
        inner.by_source.insert(source.to_string(), color);
        color
    }

    /// Returns the number of sources that have been assigned a color.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().by_source.len()
    }

    /// Returns true if no source has been assigned a color yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn paint_wraps_with_reset() {
        assert_eq!(Color::Red.paint("x"), "\x1b[31mx\x1b[0m");
    }

    #[test]
    fn colors_assigned_in_palette_order() {
        let colors = SourceColors::new();
        assert_eq!(colors.color_for("a"), Color::Blue);
        assert_eq!(colors.color_for("b"), Color::Green);
        assert_eq!(colors.color_for("a"), Color::Blue);
        assert_eq!(colors.len(), 2);
    }

    #[test]
    fn palette_wraps_around() {
        let colors = SourceColors::new();
        for name in ["a", "b", "c", "d", "e"] {
            let _ = colors.color_for(name);
        }
        assert_eq!(colors.color_for("f"), Color::Blue);
    }

    #[test]
    fn concurrent_first_use_assigns_once() {
        let colors = Arc::new(SourceColors::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let colors = Arc::clone(&colors);
                std::thread::spawn(move || colors.color_for("shared"))
            })
            .collect();

        let seen: Vec<Color> = handles.into_iter().filter_map(|h| h.join().ok()).collect();
        assert_eq!(seen.len(), 8);
        assert!(seen.iter().all(|c| *c == seen[0]));
        assert_eq!(colors.len(), 1);
    }
}
