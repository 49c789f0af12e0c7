//! Host capabilities exposed to Lua macros.
//!
//! Every capability is registered twice: as a global table named after the
//! capability (`Inventory.GetItemCount(5057)`) and, when the name is free,
//! as a flat global function (`GetItemCount(5057)`).
//!
//! Values cross the boundary as JSON: Lua arguments are converted to
//! [`serde_json::Value`] before dispatch and the result converted back.

use std::rc::Rc;

use mlua::{Lua, LuaSerdeExt, Result as LuaResult, SerializeOptions, Value, Variadic};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use super::store::MacroStore;
use crate::{EngineError, Result};

/// A named group of host operations callable from Lua.
pub trait Capability {
    /// Name of the global table holding the operations.
    fn name(&self) -> &str;

    /// Names of the operations this capability answers to.
    fn operations(&self) -> Vec<String>;

    /// Run an operation.
    fn invoke(&self, operation: &str, args: Vec<JsonValue>) -> Result<JsonValue>;
}

type Operation = Box<dyn Fn(&[JsonValue]) -> Result<JsonValue>>;

/// Capability assembled from closures.
pub struct FnCapability {
    name: String,
    operations: Vec<(String, Operation)>,
}

impl FnCapability {
    /// Create a capability with no operations.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: Vec::new(),
        }
    }

    /// Add an operation.
    pub fn with_operation<F>(mut self, name: impl Into<String>, op: F) -> Self
    where
        F: Fn(&[JsonValue]) -> Result<JsonValue> + 'static,
    {
        self.operations.push((name.into(), Box::new(op)));
        self
    }
}

impl Capability for FnCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn operations(&self) -> Vec<String> {
        self.operations.iter().map(|(name, _)| name.clone()).collect()
    }

    fn invoke(&self, operation: &str, args: Vec<JsonValue>) -> Result<JsonValue> {
        let (_, op) = self
            .operations
            .iter()
            .find(|(name, _)| name == operation)
            .ok_or_else(|| {
                EngineError::ScriptRuntime(format!("{}.{} is not defined", self.name, operation))
            })?;
        op(&args)
    }
}

/// Engine introspection available to every macro that has a store.
pub struct InternalCapability {
    store: Rc<dyn MacroStore>,
    functions: Vec<String>,
}

impl InternalCapability {
    /// Name of the global table.
    pub const NAME: &'static str = "Internal";

    /// Operations answered by this capability.
    pub const OPERATIONS: [&'static str; 2] = ["GetMacroText", "ListFunctions"];

    /// Create the capability. `functions` is the listing returned by
    /// `ListFunctions`.
    pub fn new(store: Rc<dyn MacroStore>, functions: Vec<String>) -> Self {
        Self { store, functions }
    }
}

impl Capability for InternalCapability {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn operations(&self) -> Vec<String> {
        Self::OPERATIONS.iter().map(|op| op.to_string()).collect()
    }

    fn invoke(&self, operation: &str, args: Vec<JsonValue>) -> Result<JsonValue> {
        match operation {
            "GetMacroText" => {
                let name = args.first().and_then(JsonValue::as_str).ok_or_else(|| {
                    EngineError::ScriptRuntime(
                        "GetMacroText expects a macro name".to_string(),
                    )
                })?;
                Ok(self
                    .store
                    .get_macro_text(name)
                    .map(JsonValue::String)
                    .unwrap_or(JsonValue::Null))
            }
            "ListFunctions" => Ok(JsonValue::from(self.functions.clone())),
            other => Err(EngineError::ScriptRuntime(format!(
                "{}.{other} is not defined",
                Self::NAME
            ))),
        }
    }
}

/// Ordered set of capabilities bound into each interpreter.
#[derive(Default, Clone)]
pub struct CapabilityRegistry {
    capabilities: Vec<Rc<dyn Capability>>,
}

impl CapabilityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability.
    pub fn register<C: Capability + 'static>(&mut self, capability: C) {
        self.capabilities.push(Rc::new(capability));
    }

    /// Builder form of [`CapabilityRegistry::register`].
    pub fn with<C: Capability + 'static>(mut self, capability: C) -> Self {
        self.register(capability);
        self
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Whether no capabilities are registered.
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// `Capability.Operation` for every operation, in registration order.
    pub fn list_functions(&self) -> Vec<String> {
        self.capabilities
            .iter()
            .flat_map(|cap| {
                cap.operations()
                    .into_iter()
                    .map(move |op| format!("{}.{}", cap.name(), op))
            })
            .collect()
    }

    /// Bind every capability into the Lua globals.
    pub fn register_lua(&self, lua: &Lua) -> LuaResult<()> {
        let globals = lua.globals();

        for capability in &self.capabilities {
            let table = lua.create_table()?;

            for operation in capability.operations() {
                debug!(
                    capability = capability.name(),
                    operation = %operation,
                    "Adding Lua function"
                );
                let func = Self::bind(lua, Rc::clone(capability), operation.clone())?;
                table.set(operation.as_str(), func.clone())?;

                if globals.contains_key(operation.as_str())? {
                    warn!(
                        capability = capability.name(),
                        operation = %operation,
                        "Global already defined, only the grouped binding is available"
                    );
                } else {
                    globals.set(operation.as_str(), func)?;
                }
            }

            if globals.contains_key(capability.name())? {
                warn!(
                    capability = capability.name(),
                    "Global already defined, replacing it with the capability table"
                );
            }
            globals.set(capability.name(), table)?;
        }

        Ok(())
    }

    fn bind(lua: &Lua, capability: Rc<dyn Capability>, operation: String) -> LuaResult<mlua::Function> {
        lua.create_function(move |lua, args: Variadic<Value>| {
            let args = args
                .iter()
                .map(|arg| lua.from_value::<JsonValue>(arg.clone()))
                .collect::<LuaResult<Vec<_>>>()?;
            let result = capability
                .invoke(&operation, args)
                .map_err(mlua::Error::external)?;
            json_to_lua(lua, &result)
        })
    }
}

/// Named values exposed as top-level Lua globals.
#[derive(Debug, Clone, Default)]
pub struct HostServices {
    services: Vec<(String, JsonValue)>,
}

impl HostServices {
    /// Create an empty service set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a service.
    pub fn insert(&mut self, name: impl Into<String>, value: JsonValue) {
        let name = name.into();
        match self.services.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.services.push((name, value)),
        }
    }

    /// Builder form of [`HostServices::insert`].
    pub fn with(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.insert(name, value);
        self
    }

    /// Service names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(|(name, _)| name.as_str())
    }

    /// Set every service as a Lua global.
    pub fn register_lua(&self, lua: &Lua) -> LuaResult<()> {
        let globals = lua.globals();
        for (name, value) in &self.services {
            globals.set(name.as_str(), json_to_lua(lua, value)?)?;
        }
        Ok(())
    }
}

/// Convert JSON to Lua, mapping `null` to `nil`.
fn json_to_lua(lua: &Lua, value: &JsonValue) -> LuaResult<Value> {
    let options = SerializeOptions::new()
        .serialize_none_to_null(false)
        .serialize_unit_to_null(false);
    lua.to_value_with(value, options)
}
