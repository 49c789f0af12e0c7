//! Lua interpreter setup for macros.
//!
//! Each engine owns one interpreter with the `f` string interpolation
//! helper installed and, unless disabled, a sandbox that strips the
//! debug library and process/filesystem access.

use mlua::{Lua, LuaOptions, StdLib, Table, Value};

use crate::config::ScriptingConfig;
use crate::{EngineError, Result};

/// Defines the global `f(str)`.
///
/// Each `{expr}` in `str` is evaluated and replaced with `tostring(result)`.
/// Names in `expr` resolve against the locals of the calling function and
/// then its callers, innermost first, falling back to the globals.
const INTERPOLATION_SNIPPET: &str = r#"
local getinfo, getlocal = debug.getinfo, debug.getlocal
local load, rawget, setmetatable, tostring, error = load, rawget, setmetatable, tostring, error
local globals = _ENV

-- Stack from the __index function: __index, expression, gsub callback,
-- string.gsub, f, caller of f.
local CALLER_LEVEL = 6

function f(str)
  return (str:gsub("%b{}", function(block)
    local code = block:sub(2, -2)
    local env = setmetatable({}, { __index = function(_, name)
      local level = CALLER_LEVEL
      while getinfo(level, "") ~= nil do
        local found, value = false, nil
        local i = 1
        while true do
          local local_name, local_value = getlocal(level, i)
          if local_name == nil then break end
          if local_name == name then
            found, value = true, local_value
          end
          i = i + 1
        end
        if found then return value end
        level = level + 1
      end
      return rawget(globals, name)
    end })
    local fn, err = load("return " .. code, "expression `" .. code .. "`", "t", env)
    if not fn then
      error(err, 0)
    end
    local value = fn()
    return tostring(value)
  end))
end
"#;

/// Globals removed by the sandbox.
const SANDBOXED_GLOBALS: [&str; 4] = ["debug", "io", "dofile", "loadfile"];

/// `os` functions removed by the sandbox.
const SANDBOXED_OS_FUNCTIONS: [&str; 6] = ["execute", "exit", "getenv", "remove", "rename", "tmpname"];

/// Lua interpreter configured for running macros.
pub struct ScriptEngine {
    lua: Lua,
}

impl ScriptEngine {
    /// Create an engine with the interpolation helper installed.
    pub fn new(config: &ScriptingConfig) -> Result<Self> {
        // SAFETY: the debug library is only reachable from the interpolation
        // helper once the sandbox has run; with the sandbox disabled the
        // caller has opted into the full standard library.
        let lua = unsafe { Lua::unsafe_new_with(StdLib::ALL_SAFE | StdLib::DEBUG, LuaOptions::new()) };

        if config.memory_limit_mb > 0 {
            lua.set_memory_limit(config.memory_limit_mb * 1024 * 1024)
                .map_err(|e| EngineError::ScriptInit(format!("Failed to set memory limit: {e}")))?;
        }

        lua.load(INTERPOLATION_SNIPPET)
            .set_name("=interpolation")
            .exec()
            .map_err(|e| EngineError::ScriptInit(format!("Failed to install f(): {e}")))?;

        if config.sandbox {
            Self::apply_sandbox(&lua)?;
        }

        Ok(Self { lua })
    }

    /// Apply sandbox restrictions to the Lua environment.
    fn apply_sandbox(lua: &Lua) -> Result<()> {
        let globals = lua.globals();

        for name in SANDBOXED_GLOBALS {
            globals
                .set(name, Value::Nil)
                .map_err(|e| EngineError::ScriptInit(format!("Failed to disable {name}: {e}")))?;
        }

        if let Ok(os) = globals.get::<Table>("os") {
            for name in SANDBOXED_OS_FUNCTIONS {
                os.set(name, Value::Nil).map_err(|e| {
                    EngineError::ScriptInit(format!("Failed to disable os.{name}: {e}"))
                })?;
            }
        }

        if let Ok(package) = globals.get::<Table>("package") {
            package
                .set("loadlib", Value::Nil)
                .map_err(|e| EngineError::ScriptInit(format!("Failed to disable loadlib: {e}")))?;
        }

        Ok(())
    }

    /// Get a reference to the underlying Lua instance.
    pub fn lua(&self) -> &Lua {
        &self.lua
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::{FromLua, FromLuaMulti, IntoLua};

    impl ScriptEngine {
        /// Execute Lua source code.
        fn execute(&self, source: &str) -> Result<()> {
            self.lua
                .load(source)
                .exec()
                .map_err(|e| EngineError::ScriptRuntime(format!("Script error: {e}")))
        }

        /// Evaluate a chunk and convert its results.
        fn eval<R: FromLuaMulti>(&self, source: &str) -> Result<R> {
            self.lua
                .load(source)
                .eval()
                .map_err(|e| EngineError::ScriptRuntime(format!("Script error: {e}")))
        }

        /// Set a global value in the Lua environment.
        fn set_global<V: IntoLua>(&self, name: &str, value: V) -> Result<()> {
            self.lua
                .globals()
                .set(name, value)
                .map_err(|e| EngineError::ScriptRuntime(format!("Failed to set global '{name}': {e}")))
        }

        /// Get a global value from the Lua environment.
        fn get_global<V: FromLua>(&self, name: &str) -> Result<V> {
            self.lua
                .globals()
                .get(name)
                .map_err(|e| EngineError::ScriptRuntime(format!("Failed to get global '{name}': {e}")))
        }
    }

    fn engine() -> ScriptEngine {
        ScriptEngine::new(&ScriptingConfig::default()).unwrap()
    }

    #[test]
    fn test_interpolate_expression() {
        let result: String = engine().eval(r#"return f("{1+1}")"#).unwrap();
        assert_eq!(result, "2");
    }

    #[test]
    fn test_interpolate_local_variable() {
        let result: String = engine()
            .eval(
                r#"
                local item = "Maple Lumber"
                local count = 3
                return (f("craft {count}x {item}"))
            "#,
            )
            .unwrap();
        assert_eq!(result, "craft 3x Maple Lumber");
    }

    #[test]
    fn test_interpolate_enclosing_function_local() {
        let result: String = engine()
            .eval(
                r#"
                local function outer()
                  local depth = "outer"
                  local function inner()
                    return (f("{depth}"))
                  end
                  return (inner())
                end
                return outer()
            "#,
            )
            .unwrap();
        assert_eq!(result, "outer");
    }

    #[test]
    fn test_interpolate_global_fallback() {
        let engine = engine();
        engine.set_global("retainer", "Bob").unwrap();
        let result: String = engine.eval(r#"return f("hello {retainer:upper()}")"#).unwrap();
        assert_eq!(result, "hello BOB");
    }

    #[test]
    fn test_interpolate_innermost_local_wins() {
        let result: String = engine()
            .eval(
                r#"
                local name = "global-ish"
                local function g()
                  local name = "inner"
                  return (f("{name}"))
                end
                return g()
            "#,
            )
            .unwrap();
        assert_eq!(result, "inner");
    }

    #[test]
    fn test_interpolate_bad_expression() {
        let result = engine().execute(r#"f("{1 +}")"#);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("expression `1 +`"));
    }

    #[test]
    fn test_interpolate_runtime_failure() {
        let result = engine().execute(r#"f("{nothing.field}")"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_sandbox_removes_debug_and_io() {
        let engine = engine();
        assert!(engine.execute("debug.traceback()").is_err());
        assert!(engine.execute("io.open('/etc/passwd', 'r')").is_err());
        assert!(engine.execute("os.execute('ls')").is_err());
        assert!(engine.execute("dofile('/etc/passwd')").is_err());

        let clock_ok: bool = engine.eval("return type(os.clock()) == 'number'").unwrap();
        assert!(clock_ok);
    }

    #[test]
    fn test_sandbox_disabled_keeps_debug() {
        let config = ScriptingConfig {
            sandbox: false,
            ..ScriptingConfig::default()
        };
        let engine = ScriptEngine::new(&config).unwrap();
        let has_debug: bool = engine.eval("return debug ~= nil").unwrap();
        assert!(has_debug);
    }

    #[test]
    fn test_memory_limit() {
        let config = ScriptingConfig {
            memory_limit_mb: 1,
            ..ScriptingConfig::default()
        };
        let engine = ScriptEngine::new(&config).unwrap();

        let result = engine.execute(
            r#"
            t = {}
            for i = 1, 100000 do
                t[i] = string.rep("x", 1000)
            end
        "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_set_and_get_global() {
        let engine = engine();
        engine.set_global("my_value", 42).unwrap();
        let result: i32 = engine.get_global("my_value").unwrap();
        assert_eq!(result, 42);
    }
}
