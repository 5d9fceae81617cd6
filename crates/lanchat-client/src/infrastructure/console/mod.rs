//! Terminal renderer for relayed events.
//!
//! Chat lines print as `name: text`; join, leave and server notices print as
//! `*** text`, in yellow when colour is on.

use std::io::Write;

use lanchat_core::EventKind;

use crate::application::presentation::EventSink;

const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// ANSI sequence that clears the screen and homes the cursor.
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Formats one event as a single terminal line (without newline).
pub fn format_event(kind: EventKind, username: &str, text: &str, color: bool) -> String {
    match (kind, color) {
        (EventKind::Text, false) => format!("{username}: {text}"),
        (EventKind::Text, true) => format!("{CYAN}{username}{RESET}: {text}"),
        (_, false) => format!("*** {text}"),
        (_, true) => format!("{YELLOW}*** {text}{RESET}"),
    }
}

/// [`EventSink`] that prints to standard output.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    color: bool,
}

impl ConsoleSink {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn clear_screen(&self) {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "{CLEAR_SCREEN}");
        let _ = out.flush();
    }

    fn print_line(&self, line: &str) {
        // A closed stdout is not worth tearing the session down for.
        let _ = writeln!(std::io::stdout().lock(), "{line}");
    }
}

impl EventSink for ConsoleSink {
    fn render(&self, kind: EventKind, username: &str, text: &str) {
        self.print_line(&format_event(kind, username, text, self.color));
    }

    fn disconnected(&self) {
        let line = format_event(
            EventKind::Notice,
            "",
            "disconnected from server",
            self.color,
        );
        self.print_line(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_line() {
        assert_eq!(
            format_event(EventKind::Text, "alice", "hello", false),
            "alice: hello"
        );
    }

    #[test]
    fn test_plain_system_line() {
        assert_eq!(
            format_event(EventKind::Joined, "bob", "bob joined the chat", false),
            "*** bob joined the chat"
        );
    }

    #[test]
    fn test_colored_lines_reset_at_end() {
        let line = format_event(EventKind::Left, "bob", "bob left the chat", true);
        assert!(line.starts_with(YELLOW));
        assert!(line.ends_with(RESET));

        let line = format_event(EventKind::Text, "amy", "yo", true);
        assert!(line.contains("amy"));
        assert!(line.ends_with(": yo"));
    }
}
