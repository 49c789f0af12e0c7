//! Resumable entrypoint for Lua macros.
//!
//! The macro body is wrapped in a function and handed to Lua as a
//! coroutine. Each [`Entrypoint::resume`] runs the macro up to its next
//! `yield` and returns the yielded command line.

use mlua::{MultiValue, Thread, ThreadStatus, Value};

use crate::macros::types::split_lines;
use crate::{EngineError, Result};

/// Prefix added to every macro line inside the entrypoint function.
const INDENT: &str = "  ";

/// Lifecycle of an [`Entrypoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrypointState {
    /// Not resumed yet.
    NotStarted,
    /// Stopped at a `yield`.
    Suspended,
    /// Returned, or yielded nothing.
    Completed,
    /// Raised an error or yielded something other than a string.
    Failed,
}

impl EntrypointState {
    /// Whether further resumes are no-ops.
    pub fn is_terminal(self) -> bool {
        matches!(self, EntrypointState::Completed | EntrypointState::Failed)
    }
}

/// Wrap macro source in a chunk that returns the entrypoint coroutine.
pub fn wrap_source(source: &str) -> String {
    let body: Vec<String> = split_lines(source)
        .into_iter()
        .map(|line| format!("{INDENT}{line}"))
        .collect();

    format!(
        "yield = coroutine.yield\nlocal function entrypoint()\n{}\nend\nreturn coroutine.create(entrypoint)",
        body.join("\n")
    )
}

/// A Lua macro's coroutine.
pub struct Entrypoint {
    thread: Option<Thread>,
    state: EntrypointState,
}

impl Entrypoint {
    /// Take the coroutine out of the values returned by the wrapped chunk.
    ///
    /// Fails unless there is exactly one value and it is a coroutine.
    pub fn from_results(results: MultiValue) -> Result<Self> {
        let mut values = results.into_iter();
        match (values.next(), values.next()) {
            (Some(Value::Thread(thread)), None) => Ok(Self {
                thread: Some(thread),
                state: EntrypointState::NotStarted,
            }),
            _ => Err(EngineError::ScriptInit(
                "could not obtain the Lua entrypoint".to_string(),
            )),
        }
    }

    /// Current state.
    pub fn state(&self) -> EntrypointState {
        self.state
    }

    /// Run to the next `yield`.
    ///
    /// Returns `None` once the macro has finished; repeated calls keep
    /// returning `None`. Yielded bytes that are not UTF-8 are replaced
    /// with U+FFFD.
    pub fn resume(&mut self) -> Result<Option<String>> {
        if self.state.is_terminal() {
            return Ok(None);
        }
        let Some(thread) = &self.thread else {
            return Ok(None);
        };

        let results = match thread.resume::<MultiValue>(()) {
            Ok(results) => results,
            Err(e) => {
                self.state = EntrypointState::Failed;
                return Err(EngineError::ScriptRuntime(e.to_string()));
            }
        };

        self.state = match thread.status() {
            ThreadStatus::Resumable => EntrypointState::Suspended,
            _ => EntrypointState::Completed,
        };

        match results.into_iter().next() {
            None => {
                self.state = EntrypointState::Completed;
                Ok(None)
            }
            Some(Value::String(text)) => Ok(Some(text.to_string_lossy().into())),
            Some(other) => {
                self.state = EntrypointState::Failed;
                Err(EngineError::ScriptRuntime(format!(
                    "Lua macro yielded a non-string ({})",
                    other.type_name()
                )))
            }
        }
    }

    /// Drop the coroutine. Safe to call more than once.
    pub fn release(&mut self) {
        self.thread = None;
        if !self.state.is_terminal() {
            self.state = EntrypointState::Completed;
        }
    }
}
