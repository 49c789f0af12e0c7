//! `require` resolution for Lua macros.
//!
//! The default Lua searchers are replaced by the preload searcher followed
//! by a single searcher that walks an ordered list of
//! [`ResolverStrategy`] values:
//!
//! 1. absolute file paths,
//! 2. each configured search directory, in order,
//! 3. other macros from the [`MacroStore`], looked up by name.
//!
//! Modules already in `package.loaded` or `package.preload` never reach the
//! strategies.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mlua::{Lua, Result as LuaResult, Table, Value};
use tracing::debug;

use super::store::MacroStore;
use crate::Result;

/// Suffix marking a module name as a stored macro. Such names skip the
/// filesystem strategies.
pub const MACRO_MODULE_SUFFIX: &str = ".macro";

/// One way of locating a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverStrategy {
    /// The module name is itself an absolute file path.
    AbsolutePath,
    /// Look for the module below this directory.
    SearchPath(PathBuf),
    /// The module name is the name of another stored macro.
    MacroStore,
}

/// Where a resolved module came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOrigin {
    /// Read from a file.
    File(PathBuf),
    /// Taken from the macro store.
    Macro(String),
}

/// Source of a resolved module.
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    /// Chunk name used in Lua error messages.
    pub chunk_name: String,
    /// Lua source. Files are passed to Lua as raw bytes, like `loadfile`.
    pub source: Vec<u8>,
    /// Where the source came from.
    pub origin: ModuleOrigin,
}

/// Ordered, immutable set of module resolution strategies.
pub struct ModuleResolver {
    strategies: Vec<ResolverStrategy>,
    store: Option<Rc<dyn MacroStore>>,
}

impl ModuleResolver {
    /// Build the standard strategy order: absolute paths, then
    /// `search_paths` in order, then the macro store if one is given.
    pub fn new<P: AsRef<Path>>(search_paths: &[P], store: Option<Rc<dyn MacroStore>>) -> Self {
        let mut strategies = vec![ResolverStrategy::AbsolutePath];
        strategies.extend(
            search_paths
                .iter()
                .map(|p| ResolverStrategy::SearchPath(p.as_ref().to_path_buf())),
        );
        if store.is_some() {
            strategies.push(ResolverStrategy::MacroStore);
        }

        Self { strategies, store }
    }

    /// The strategies in the order they are tried.
    pub fn strategies(&self) -> &[ResolverStrategy] {
        &self.strategies
    }

    /// The configured search directories.
    pub fn search_paths(&self) -> Vec<&Path> {
        self.strategies
            .iter()
            .filter_map(|s| match s {
                ResolverStrategy::SearchPath(p) => Some(p.as_path()),
                _ => None,
            })
            .collect()
    }

    /// Resolve a module name to its source. `Ok(None)` means no strategy
    /// matched; see [`ModuleResolver::not_found_message`].
    pub fn resolve(&self, name: &str) -> Result<Option<ResolvedModule>> {
        let is_macro_name = name.ends_with(MACRO_MODULE_SUFFIX);

        for strategy in &self.strategies {
            let found = match strategy {
                ResolverStrategy::AbsolutePath if !is_macro_name => {
                    let path = Path::new(name);
                    if path.is_absolute() && path.is_file() {
                        Some(Self::read_file(path)?)
                    } else {
                        None
                    }
                }
                ResolverStrategy::SearchPath(dir) if !is_macro_name => {
                    match Self::candidates(dir, name).into_iter().find(|p| p.is_file()) {
                        Some(path) => Some(Self::read_file(&path)?),
                        None => None,
                    }
                }
                ResolverStrategy::MacroStore => self.lookup_store(name),
                _ => None,
            };

            if let Some(module) = found {
                debug!(module = name, chunk = %module.chunk_name, "Resolved Lua module");
                return Ok(Some(module));
            }
        }

        Ok(None)
    }

    /// Describe a failed lookup, listing every directory searched.
    pub fn not_found_message(&self, name: &str) -> String {
        let paths = self.search_paths();
        let mut message = if paths.is_empty() {
            format!("module '{name}' not found (no module search paths configured)")
        } else {
            let listed: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
            format!(
                "module '{name}' not found, paths searched:\n  {}",
                listed.join("\n  ")
            )
        };

        if self.store.is_some() {
            message.push_str(&format!(
                "\n  no stored macro named '{}'",
                Self::macro_name(name)
            ));
        }

        message
    }

    /// Replace `package.searchers` with the preload searcher followed by
    /// this resolver.
    pub fn install(self, lua: &Lua) -> LuaResult<()> {
        let package: Table = lua.globals().get("package")?;
        let searchers: Table = package.get("searchers")?;
        let preload: Value = searchers.get(1)?;

        let resolver = Rc::new(self);
        let searcher = lua.create_function(move |lua, name: String| {
            match resolver.resolve(&name).map_err(mlua::Error::external)? {
                Some(module) => {
                    let loader = lua
                        .load(module.source.as_slice())
                        .set_name(module.chunk_name.clone())
                        .into_function()?;
                    let extra = match &module.origin {
                        ModuleOrigin::File(path) => path.display().to_string(),
                        ModuleOrigin::Macro(macro_name) => macro_name.clone(),
                    };
                    Ok((Value::Function(loader), Value::String(lua.create_string(&extra)?)))
                }
                None => {
                    let message = resolver.not_found_message(&name);
                    Ok((Value::String(lua.create_string(&message)?), Value::Nil))
                }
            }
        })?;

        let replaced = lua.create_table()?;
        replaced.raw_set(1, preload)?;
        replaced.raw_set(2, searcher)?;
        package.set("searchers", replaced)?;

        Ok(())
    }

    fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
        let dotted = name.replace('.', "/");
        vec![
            dir.join(name),
            dir.join(format!("{name}.lua")),
            dir.join(format!("{dotted}.lua")),
            dir.join(&dotted).join("init.lua"),
        ]
    }

    fn read_file(path: &Path) -> Result<ResolvedModule> {
        let source = fs::read(path)?;
        Ok(ResolvedModule {
            chunk_name: format!("@{}", path.display()),
            source,
            origin: ModuleOrigin::File(path.to_path_buf()),
        })
    }

    fn lookup_store(&self, name: &str) -> Option<ResolvedModule> {
        let store = self.store.as_ref()?;
        let macro_name = Self::macro_name(name);
        let source = store.get_macro_text(macro_name)?;
        Some(ResolvedModule {
            chunk_name: format!("=macro[\"{macro_name}\"]"),
            source: source.into_bytes(),
            origin: ModuleOrigin::Macro(macro_name.to_string()),
        })
    }

    fn macro_name(name: &str) -> &str {
        name.strip_suffix(MACRO_MODULE_SUFFIX).unwrap_or(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::store::MemoryMacroStore;

    fn store_with(name: &str, text: &str) -> Option<Rc<dyn MacroStore>> {
        Some(Rc::new(MemoryMacroStore::new().with_macro(name, text)))
    }

    #[test]
    fn test_strategy_order() {
        let resolver = ModuleResolver::new(&["/a", "/b"], store_with("m", ""));
        assert_eq!(
            resolver.strategies(),
            &[
                ResolverStrategy::AbsolutePath,
                ResolverStrategy::SearchPath(PathBuf::from("/a")),
                ResolverStrategy::SearchPath(PathBuf::from("/b")),
                ResolverStrategy::MacroStore,
            ]
        );
    }

    #[test]
    fn test_resolve_from_store() {
        let resolver = ModuleResolver::new::<&str>(&[], store_with("helpers", "return 1"));

        let module = resolver.resolve("helpers").unwrap().unwrap();
        assert_eq!(module.source, b"return 1");
        assert_eq!(module.origin, ModuleOrigin::Macro("helpers".to_string()));

        let module = resolver.resolve("helpers.macro").unwrap().unwrap();
        assert_eq!(module.origin, ModuleOrigin::Macro("helpers".to_string()));
    }

    #[test]
    fn test_resolve_unknown() {
        let resolver = ModuleResolver::new::<&str>(&[], None);
        assert!(resolver.resolve("nothing_here").unwrap().is_none());
    }

    #[test]
    fn test_not_found_message_without_paths() {
        let resolver = ModuleResolver::new::<&str>(&[], None);
        let message = resolver.not_found_message("utils");
        assert!(message.contains("module 'utils' not found"));
        assert!(message.contains("no module search paths configured"));
    }

    #[test]
    fn test_not_found_message_lists_paths() {
        let resolver = ModuleResolver::new(&["/first", "/second"], store_with("x", ""));
        let message = resolver.not_found_message("utils.macro");
        assert!(message.contains("paths searched:\n  /first\n  /second"));
        assert!(message.contains("no stored macro named 'utils'"));
    }

    #[test]
    fn test_install_replaces_searchers() {
        let lua = Lua::new();
        ModuleResolver::new::<&str>(&[], store_with("answer", "return 42"))
            .install(&lua)
            .unwrap();

        let count: i64 = lua.load("return #package.searchers").eval().unwrap();
        assert_eq!(count, 2);

        let value: i64 = lua.load("return require('answer')").eval().unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_install_not_found_error() {
        let lua = Lua::new();
        ModuleResolver::new(&["/nowhere"], None).install(&lua).unwrap();

        let err = lua.load("require('missing')").exec().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("module 'missing' not found"));
        assert!(message.contains("/nowhere"));
    }
}
