//! Macro execution engine.
//!
//! Turns stored macros into a steppable stream of commands. Command-DSL
//! macros are parsed into a fixed step list (optionally rewritten for
//! craft looping); Lua macros run as coroutines that yield one command line
//! at a time.

pub mod config;
pub mod error;
pub mod logging;
pub mod macros;
pub mod script;

pub use config::Config;
pub use error::{EngineError, Result};
pub use macros::{ActiveMacro, Command, Language, LineParser, MacroNode, MacroParser};
pub use script::{
    Capability, CapabilityRegistry, FnCapability, HostServices, MacroStore, MemoryMacroStore,
    ScriptHost,
};
