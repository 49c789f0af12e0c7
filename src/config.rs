//! Configuration module for the macro engine.

use serde::Deserialize;
use std::path::Path;

use crate::{EngineError, Result};

/// Placeholder replaced with the macro body in a craft loop template.
pub const MACRO_PLACEHOLDER: &str = "{{macro}}";

/// Placeholder replaced with the repeat count in a craft loop template.
pub const COUNT_PLACEHOLDER: &str = "{{count}}";

/// Craft loop configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CraftLoopConfig {
    /// Use the template strategy instead of the fixed steps.
    #[serde(default)]
    pub template_enabled: bool,
    /// Template text, must contain `{{macro}}`.
    #[serde(default = "default_template")]
    pub template: String,
    /// `<maxwait>` applied to the synthesized `/waitaddon` steps (0 = none).
    #[serde(default)]
    pub max_wait: u32,
    /// Append `<echo>` to the synthesized gate and loop steps.
    #[serde(default)]
    pub echo: bool,
    /// The loop starts with the crafting log open rather than the
    /// synthesis window.
    #[serde(default = "default_from_recipe_note")]
    pub from_recipe_note: bool,
}

fn default_template() -> String {
    [
        "/craft {{count}}",
        "/waitaddon \"RecipeNote\" <maxwait.5>",
        "/click \"RecipeNote Synthesize\"",
        "/waitaddon \"Synthesis\" <maxwait.5>",
        "{{macro}}",
        "/loop",
    ]
    .join("\n")
}

fn default_from_recipe_note() -> bool {
    true
}

impl Default for CraftLoopConfig {
    fn default() -> Self {
        Self {
            template_enabled: false,
            template: default_template(),
            max_wait: 0,
            echo: false,
            from_recipe_note: default_from_recipe_note(),
        }
    }
}

/// Lua scripting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptingConfig {
    /// Extra directories searched by `require`, in order.
    #[serde(default)]
    pub extra_module_search_paths: Vec<String>,
    /// Remove debug, io, dofile, loadfile and process/filesystem `os`
    /// functions from the script environment.
    #[serde(default = "default_sandbox")]
    pub sandbox: bool,
    /// Interpreter memory limit in megabytes (0 = unlimited).
    #[serde(default)]
    pub memory_limit_mb: usize,
}

fn default_sandbox() -> bool {
    true
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            extra_module_search_paths: Vec::new(),
            sandbox: default_sandbox(),
            memory_limit_mb: 0,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty logs to the console only.
    #[serde(default)]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: String::new(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Craft loop configuration.
    #[serde(default)]
    pub craft_loop: CraftLoopConfig,
    /// Lua scripting configuration.
    #[serde(default)]
    pub scripting: ScriptingConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(EngineError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| EngineError::Validation(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `MACRO_ENGINE_LOG_LEVEL`: Override the log level
    /// - `MACRO_ENGINE_LUA_PATHS`: Extra module search paths, appended after
    ///   the configured ones (platform path-list separator)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("MACRO_ENGINE_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }

        if let Some(paths) = std::env::var_os("MACRO_ENGINE_LUA_PATHS") {
            self.scripting.extra_module_search_paths.extend(
                std::env::split_paths(&paths)
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(|p| p.to_string_lossy().into_owned()),
            );
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - Craft loop templating is enabled but the template lacks `{{macro}}`
    pub fn validate(&self) -> Result<()> {
        if self.craft_loop.template_enabled && !self.craft_loop.template.contains(MACRO_PLACEHOLDER)
        {
            return Err(EngineError::Configuration(format!(
                "craft loop template does not contain the {MACRO_PLACEHOLDER} placeholder"
            )));
        }
        Ok(())
    }
}
