//! Boundary to the command parser.
//!
//! The full command grammar lives with the command implementations. The
//! engine only needs whole-text and single-line entry points, expressed by
//! [`MacroParser`]. [`LineParser`] is a minimal implementation that treats
//! every slash-prefixed line as one command.

use super::types::{split_lines, Command};
use crate::{EngineError, Result};

/// Turns macro text into commands.
pub trait MacroParser {
    /// Parse a whole macro. Malformed lines fail with [`EngineError::Parse`].
    fn parse(&self, text: &str) -> Result<Vec<Command>>;

    /// Parse one line. Never fails: blank, comment and malformed lines
    /// produce `None`.
    fn parse_line(&self, text: &str) -> Option<Command>;
}

/// Line-per-command parser.
///
/// Blank lines and `//` comments are skipped, any other line must start
/// with `/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineParser;

impl LineParser {
    fn classify(line: &str) -> LineKind<'_> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            LineKind::Skip
        } else if trimmed.len() > 1 && trimmed.starts_with('/') {
            LineKind::Command(trimmed)
        } else {
            LineKind::Invalid(trimmed)
        }
    }
}

enum LineKind<'a> {
    Skip,
    Command(&'a str),
    Invalid(&'a str),
}

impl MacroParser for LineParser {
    fn parse(&self, text: &str) -> Result<Vec<Command>> {
        let mut commands = Vec::new();
        for (index, line) in split_lines(text).into_iter().enumerate() {
            match Self::classify(line) {
                LineKind::Skip => {}
                LineKind::Command(cmd) => commands.push(Command::new(cmd, index + 1)),
                LineKind::Invalid(cmd) => {
                    return Err(EngineError::Parse {
                        line: index + 1,
                        message: format!("expected a /command, found `{cmd}`"),
                    })
                }
            }
        }
        Ok(commands)
    }

    fn parse_line(&self, text: &str) -> Option<Command> {
        match Self::classify(text) {
            LineKind::Command(cmd) => Some(Command::new(cmd, 1)),
            LineKind::Skip | LineKind::Invalid(_) => None,
        }
    }
}
