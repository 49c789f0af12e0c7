//! A macro queued for execution.
//!
//! Command-DSL macros are parsed up front into a fixed step list walked by
//! a cursor. Lua macros start with an empty step list; every
//! [`ActiveMacro::current_step`] resumes the coroutine and appends the
//! parsed command to the list.

use std::rc::Rc;

use tracing::{debug, info};

use super::craft_loop::CraftLoop;
use super::parser::MacroParser;
use super::types::{split_lines, Command, MacroNode};
use crate::config::{Config, ScriptingConfig};
use crate::script::{EntrypointState, ScriptBridge, ScriptHost};
use crate::{EngineError, Result};

/// A macro node queued for interaction.
pub struct ActiveMacro {
    node: MacroNode,
    steps: Vec<Command>,
    step_index: isize,
    line_count: usize,
    parser: Rc<dyn MacroParser>,
    scripting: ScriptingConfig,
    host: ScriptHost,
    bridge: Option<ScriptBridge>,
    disposed: bool,
}

impl ActiveMacro {
    /// Prepare `node` for execution.
    ///
    /// Command-DSL macros are craft-loop rewritten and parsed here. Lua
    /// macros defer interpreter setup to the first
    /// [`ActiveMacro::current_step`].
    pub fn new(
        node: MacroNode,
        config: &Config,
        parser: Rc<dyn MacroParser>,
        host: ScriptHost,
    ) -> Result<Self> {
        let line_count = split_lines(&node.contents).len();

        let steps = if node.is_lua() {
            Vec::new()
        } else {
            let contents = CraftLoop::new(&config.craft_loop).transform(
                &node.contents,
                node.craft_loop,
                node.craft_loop_count,
            )?;
            parser.parse(&contents)?
        };

        info!(
            macro_name = %node.name,
            language = ?node.language,
            steps = steps.len(),
            lines = line_count,
            "Macro queued"
        );

        Ok(Self {
            node,
            steps,
            step_index: 0,
            line_count,
            parser,
            scripting: config.scripting.clone(),
            host,
            bridge: None,
            disposed: false,
        })
    }

    /// The macro being executed.
    pub fn node(&self) -> &MacroNode {
        &self.node
    }

    /// Parsed steps. For Lua macros, the commands yielded so far.
    pub fn steps(&self) -> &[Command] {
        &self.steps
    }

    /// Cursor into [`ActiveMacro::steps`]; `-1` right after a loop.
    pub fn step_index(&self) -> isize {
        self.step_index
    }

    /// Number of lines in the macro source.
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Move to the next step. Moving past the end is allowed and makes
    /// [`ActiveMacro::current_step`] return `None`.
    pub fn advance(&mut self) {
        self.step_index += 1;
    }

    /// Rewind so the next [`ActiveMacro::advance`] lands on the first step.
    pub fn loop_to_start(&mut self) -> Result<()> {
        if self.node.is_lua() {
            return Err(EngineError::UnsupportedOperation(
                "loop is not supported for Lua macros".to_string(),
            ));
        }

        debug!(macro_name = %self.node.name, "Looping to start");
        self.step_index = -1;
        Ok(())
    }

    /// The command to execute now.
    ///
    /// For Lua macros this resumes the coroutine. `None` either means the
    /// macro has finished or, while the coroutine is still suspended, that
    /// the yielded line was not a command.
    pub fn current_step(&mut self) -> Result<Option<Command>> {
        if !self.node.is_lua() {
            let step = usize::try_from(self.step_index)
                .ok()
                .and_then(|index| self.steps.get(index))
                .cloned();
            return Ok(step);
        }

        if self.disposed {
            return Ok(None);
        }

        if self.bridge.is_none() {
            let bridge =
                ScriptBridge::init(&self.node.name, &self.node.contents, &self.scripting, &self.host)?;
            self.bridge = Some(bridge);
        }
        let Some(bridge) = self.bridge.as_mut() else {
            return Ok(None);
        };

        let Some(text) = bridge.next_line()? else {
            info!(macro_name = %self.node.name, steps = self.steps.len(), "Lua macro finished");
            return Ok(None);
        };

        let command = self.parser.parse_line(&text);
        match &command {
            Some(command) => self.steps.push(command.clone()),
            None => debug!(macro_name = %self.node.name, line = %text, "Yielded line is not a command"),
        }

        Ok(command)
    }

    /// Whether a Lua macro's coroutine is still able to produce steps.
    /// Always false for command-DSL macros.
    pub fn is_running_script(&self) -> bool {
        match &self.bridge {
            Some(bridge) => !bridge.state().is_terminal(),
            None => false,
        }
    }

    /// State of the Lua coroutine, if one has been created.
    pub fn script_state(&self) -> Option<EntrypointState> {
        self.bridge.as_ref().map(ScriptBridge::state)
    }

    /// Release the Lua coroutine and interpreter. Idempotent, and safe on a
    /// macro whose interpreter was never created.
    pub fn dispose(&mut self) {
        if let Some(mut bridge) = self.bridge.take() {
            bridge.dispose();
            debug!(macro_name = %self.node.name, "Released Lua interpreter");
        }
        self.disposed = true;
    }
}
