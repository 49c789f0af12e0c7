//! Lua scripting for macros.
//!
//! A Lua macro runs as a coroutine inside its own sandboxed interpreter and
//! yields one command line per step. Host functionality reaches the script
//! through [`Capability`] objects and [`HostServices`]; `require` is
//! resolved by [`ModuleResolver`].

pub mod api;
pub mod bridge;
pub mod coroutine;
pub mod engine;
pub mod resolver;
pub mod store;

pub use api::{Capability, CapabilityRegistry, FnCapability, HostServices, InternalCapability};
pub use bridge::{ScriptBridge, ScriptHost};
pub use coroutine::{Entrypoint, EntrypointState};
pub use engine::ScriptEngine;
pub use resolver::{ModuleOrigin, ModuleResolver, ResolvedModule, ResolverStrategy};
pub use store::{MacroStore, MemoryMacroStore};
