//! Craft loop rewriting.
//!
//! A craft loop wraps a macro body so that it runs once per craft: either
//! by filling in the user's template, or by synthesizing a gate step, the
//! crafting log click/wait sequence and a trailing `/loop`.

use crate::config::{CraftLoopConfig, COUNT_PLACEHOLDER, MACRO_PLACEHOLDER};
use crate::{EngineError, Result};

/// Finite stand-in for an unbounded repeat count in templates.
pub const UNBOUNDED_COUNT: i32 = 999_999;

/// Rewrites macro bodies for craft looping.
#[derive(Debug, Clone)]
pub struct CraftLoop<'a> {
    config: &'a CraftLoopConfig,
}

impl<'a> CraftLoop<'a> {
    /// Create a transformer for the given configuration.
    pub fn new(config: &'a CraftLoopConfig) -> Self {
        Self { config }
    }

    /// Rewrite `contents` to repeat `count` times.
    ///
    /// Returns `contents` unchanged when `enabled` is false.
    pub fn transform(&self, contents: &str, enabled: bool, count: i32) -> Result<String> {
        if !enabled {
            return Ok(contents.to_string());
        }

        if self.config.template_enabled {
            self.apply_template(contents, count)
        } else {
            Ok(self.apply_fixed_steps(contents, count))
        }
    }

    fn apply_template(&self, contents: &str, count: i32) -> Result<String> {
        if count == 0 {
            return Ok(contents.to_string());
        }

        let template = &self.config.template;
        if !template.contains(MACRO_PLACEHOLDER) {
            return Err(EngineError::Configuration(format!(
                "craft loop template does not contain the {MACRO_PLACEHOLDER} placeholder"
            )));
        }

        let count = if count == -1 { UNBOUNDED_COUNT } else { count };

        Ok(template
            .replace(MACRO_PLACEHOLDER, contents)
            .replace(COUNT_PLACEHOLDER, &count.to_string()))
    }

    fn apply_fixed_steps(&self, contents: &str, count: i32) -> String {
        let max_wait = match self.config.max_wait {
            0 => String::new(),
            n => format!(" <maxwait.{n}>"),
        };
        let echo = if self.config.echo { " <echo>" } else { "" };

        let gate = if self.config.from_recipe_note {
            format!("/craft {count}{echo}")
        } else {
            format!("/gate {}{echo}", count.saturating_sub(1))
        };
        let clicks = [
            format!("/waitaddon \"RecipeNote\"{max_wait}"),
            "/click \"RecipeNote Synthesize\"".to_string(),
            format!("/waitaddon \"Synthesis\"{max_wait}"),
        ]
        .join("\n");
        let loop_step = format!("/loop{echo}");

        let (gate, clicks, loop_step) = (gate.as_str(), clicks.as_str(), loop_step.as_str());
        let parts: Vec<&str> = if self.config.from_recipe_note {
            match count {
                -1 => vec![clicks, contents, loop_step],
                0 => vec![contents],
                1 => vec![clicks, contents],
                _ => vec![gate, clicks, contents, loop_step],
            }
        } else {
            match count {
                -1 => vec![contents, clicks, loop_step],
                0 | 1 => vec![contents],
                _ => vec![contents, gate, clicks, loop_step],
            }
        };

        parts.join("\n").trim().to_string()
    }
}

/// Rewrite `contents` for craft looping with the given configuration.
pub fn modify_for_craft_loop(
    contents: &str,
    enabled: bool,
    count: i32,
    config: &CraftLoopConfig,
) -> Result<String> {
    CraftLoop::new(config).transform(contents, enabled, count)
}
