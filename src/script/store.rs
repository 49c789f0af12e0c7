//! Access to the host's macro store.

use std::collections::HashMap;

/// Read access to stored macros, used to resolve `require("<macro name>")`.
pub trait MacroStore {
    /// Source text of the macro with the given name.
    fn get_macro_text(&self, name: &str) -> Option<String>;
}

/// In-memory macro store keyed by macro name.
#[derive(Debug, Clone, Default)]
pub struct MemoryMacroStore {
    macros: HashMap<String, String>,
}

impl MemoryMacroStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a macro.
    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.macros.insert(name.into(), text.into());
    }

    /// Builder form of [`MemoryMacroStore::insert`].
    pub fn with_macro(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    /// Number of stored macros.
    pub fn len(&self) -> usize {
        self.macros.len()
    }

    /// Whether the store holds no macros.
    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

impl MacroStore for MemoryMacroStore {
    fn get_macro_text(&self, name: &str) -> Option<String> {
        self.macros.get(name).cloned()
    }
}
