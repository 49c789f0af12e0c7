//! Connects a Lua macro to its interpreter.
//!
//! [`ScriptBridge::init`] builds a fresh interpreter for one macro:
//! interpolation helper and sandbox, module resolver, host capabilities,
//! host services, then the entrypoint coroutine.

use std::rc::Rc;

use mlua::MultiValue;
use tracing::debug;

use super::api::{CapabilityRegistry, HostServices, InternalCapability};
use super::coroutine::{wrap_source, Entrypoint, EntrypointState};
use super::engine::ScriptEngine;
use super::resolver::ModuleResolver;
use super::store::MacroStore;
use crate::config::ScriptingConfig;
use crate::{EngineError, Result};

/// Everything the host exposes to Lua macros.
#[derive(Clone, Default)]
pub struct ScriptHost {
    /// Capabilities bound as global tables and functions.
    pub capabilities: CapabilityRegistry,
    /// Values bound as top-level globals.
    pub services: HostServices,
    /// Store used to `require` other macros by name.
    pub store: Option<Rc<dyn MacroStore>>,
}

impl ScriptHost {
    /// Create a host with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the capabilities.
    pub fn with_capabilities(mut self, capabilities: CapabilityRegistry) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the services.
    pub fn with_services(mut self, services: HostServices) -> Self {
        self.services = services;
        self
    }

    /// Set the macro store.
    pub fn with_store<S: MacroStore + 'static>(mut self, store: S) -> Self {
        self.store = Some(Rc::new(store));
        self
    }
}

/// A running Lua macro: its interpreter and entrypoint coroutine.
pub struct ScriptBridge {
    entrypoint: Option<Entrypoint>,
    engine: Option<ScriptEngine>,
}

impl ScriptBridge {
    /// Build the interpreter for `source` and obtain its entrypoint.
    pub fn init(name: &str, source: &str, config: &ScriptingConfig, host: &ScriptHost) -> Result<Self> {
        debug!(macro_name = name, "Initializing Lua macro");

        let engine = ScriptEngine::new(config)?;
        let lua = engine.lua();

        ModuleResolver::new(config.extra_module_search_paths.as_slice(), host.store.clone())
            .install(lua)
            .map_err(|e| EngineError::ScriptInit(format!("Failed to install module resolver: {e}")))?;

        let mut capabilities = host.capabilities.clone();
        if let Some(store) = &host.store {
            let mut functions = capabilities.list_functions();
            functions.extend(
                InternalCapability::OPERATIONS
                    .iter()
                    .map(|op| format!("{}.{op}", InternalCapability::NAME)),
            );
            capabilities.register(InternalCapability::new(Rc::clone(store), functions));
        }
        capabilities
            .register_lua(lua)
            .map_err(|e| EngineError::ScriptInit(format!("Failed to register capabilities: {e}")))?;

        host.services
            .register_lua(lua)
            .map_err(|e| EngineError::ScriptInit(format!("Failed to register services: {e}")))?;

        let results: MultiValue = lua
            .load(wrap_source(source))
            .set_name(format!("=macro[\"{name}\"]"))
            .eval()
            .map_err(|e| EngineError::ScriptInit(format!("could not obtain the Lua entrypoint: {e}")))?;
        let entrypoint = Entrypoint::from_results(results)?;

        Ok(Self {
            entrypoint: Some(entrypoint),
            engine: Some(engine),
        })
    }

    /// Resume the macro and return the next yielded line, or `None` once it
    /// has finished.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        match self.entrypoint.as_mut() {
            Some(entrypoint) => entrypoint.resume(),
            None => Ok(None),
        }
    }

    /// State of the entrypoint coroutine. Released bridges report
    /// `Completed` unless they had already failed.
    pub fn state(&self) -> EntrypointState {
        self.entrypoint
            .as_ref()
            .map(Entrypoint::state)
            .unwrap_or(EntrypointState::Completed)
    }

    /// Release the coroutine and then the interpreter. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(mut entrypoint) = self.entrypoint.take() {
            entrypoint.release();
        }
        self.engine = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::api::FnCapability;
    use crate::script::store::MemoryMacroStore;
    use serde_json::json;

    fn init(source: &str, host: &ScriptHost) -> ScriptBridge {
        ScriptBridge::init("test", source, &ScriptingConfig::default(), host).unwrap()
    }

    #[test]
    fn test_capabilities_and_services_visible() {
        let host = ScriptHost::new()
            .with_capabilities(CapabilityRegistry::new().with(
                FnCapability::new("CharacterState").with_operation("GetLevel", |_| Ok(json!(90))),
            ))
            .with_services(HostServices::new().with("PlayerName", json!("Tester")));

        let mut bridge = init(
            r#"
            yield(f("/echo {PlayerName} is level {CharacterState.GetLevel()}"))
            yield("/echo " .. GetLevel())
            "#,
            &host,
        );

        assert_eq!(
            bridge.next_line().unwrap().as_deref(),
            Some("/echo Tester is level 90")
        );
        assert_eq!(bridge.next_line().unwrap().as_deref(), Some("/echo 90"));
        assert_eq!(bridge.next_line().unwrap(), None);
    }

    #[test]
    fn test_internal_capability_with_store() {
        let host = ScriptHost::new().with_store(MemoryMacroStore::new().with_macro("other", "/echo other"));
        let mut bridge = init(
            r#"
            yield(Internal.GetMacroText("other"))
            yield("/echo " .. #Internal.ListFunctions())
            "#,
            &host,
        );

        assert_eq!(bridge.next_line().unwrap().as_deref(), Some("/echo other"));
        assert_eq!(bridge.next_line().unwrap().as_deref(), Some("/echo 2"));
    }

    #[test]
    fn test_syntax_error_is_init_error() {
        let result = ScriptBridge::init(
            "broken",
            "yield(",
            &ScriptingConfig::default(),
            &ScriptHost::new(),
        );
        assert!(matches!(result, Err(EngineError::ScriptInit(_))));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut bridge = init("yield('/echo a')", &ScriptHost::new());
        bridge.dispose();
        bridge.dispose();
        assert!(bridge.engine.is_none());
        assert_eq!(bridge.next_line().unwrap(), None);
        assert_eq!(bridge.state(), EntrypointState::Completed);
    }
}
