//! Macro types and data structures.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Language a macro is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Line-oriented command DSL (`/ac`, `/wait`, `/loop`, ...).
    #[default]
    Native,
    /// Lua script yielding one command line at a time.
    Lua,
}

impl Language {
    /// Guess the language from a file extension: `.lua` is Lua, everything
    /// else is the command DSL.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension() {
            Some(ext) if ext.eq_ignore_ascii_case("lua") => Language::Lua,
            _ => Language::Native,
        }
    }
}

/// A macro owned by the script store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroNode {
    /// Display name. Uniqueness is enforced by the store.
    pub name: String,
    /// Source text.
    pub contents: String,
    /// Language the contents are written in.
    #[serde(default)]
    pub language: Language,
    /// Wrap the contents in craft loop scaffolding before parsing.
    #[serde(default)]
    pub craft_loop: bool,
    /// Craft loop repeat count: 0 runs once, -1 repeats forever, N > 0
    /// repeats N times.
    #[serde(default)]
    pub craft_loop_count: i32,
}

impl MacroNode {
    /// Create a command-DSL macro without craft looping.
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
            language: Language::Native,
            craft_loop: false,
            craft_loop_count: 0,
        }
    }

    /// Set the language.
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Enable craft looping with the given repeat count.
    pub fn with_craft_loop(mut self, count: i32) -> Self {
        self.craft_loop = true;
        self.craft_loop_count = count;
        self
    }

    /// Whether this macro runs as a Lua coroutine.
    pub fn is_lua(&self) -> bool {
        self.language == Language::Lua
    }
}

/// A parsed, executable macro command.
///
/// Two commands are equal when their source text is equal.
#[derive(Debug, Clone)]
pub struct Command {
    text: String,
    line: usize,
}

impl Command {
    /// Create a command from its source text and 1-based line number.
    pub fn new(text: impl Into<String>, line: usize) -> Self {
        Self {
            text: text.into(),
            line,
        }
    }

    /// Source text of the command.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// 1-based line number within the parsed text.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Command name without the leading slash, e.g. `loop` for `/loop <echo>`.
    pub fn name(&self) -> &str {
        self.text
            .trim_start_matches('/')
            .split_whitespace()
            .next()
            .unwrap_or("")
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Command {}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Split text on `\r\n`, `\r` and `\n`.
///
/// Empty text is one empty line and a trailing terminator yields a final
/// empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                lines.push(&text[start..i]);
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            b'\n' => {
                lines.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    lines.push(&text[start..]);

    lines
}
