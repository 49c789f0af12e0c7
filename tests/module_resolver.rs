//! Module resolution order: absolute paths, then search directories in
//! order, then stored macros.

use std::fs;
use std::path::Path;
use std::rc::Rc;

use macro_engine::script::{MacroStore, ModuleOrigin, ModuleResolver};
use macro_engine::MemoryMacroStore;
use tempfile::TempDir;

fn write(dir: &Path, relative: &str, text: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

fn store(name: &str, text: &str) -> Option<Rc<dyn MacroStore>> {
    Some(Rc::new(MemoryMacroStore::new().with_macro(name, text)))
}

#[test]
fn test_absolute_path_wins() {
    let abs = TempDir::new().unwrap();
    let search = TempDir::new().unwrap();
    write(abs.path(), "util.lua", "return 'absolute'");
    write(search.path(), "util.lua", "return 'search'");

    let target = abs.path().join("util.lua");
    let name = target.to_string_lossy().into_owned();
    let resolver = ModuleResolver::new(&[search.path()], store(&name, "return 'macro'"));

    let module = resolver.resolve(&name).unwrap().unwrap();
    assert_eq!(module.source, b"return 'absolute'");
    assert_eq!(module.origin, ModuleOrigin::File(target));
}

#[test]
fn test_search_paths_in_order() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    write(first.path(), "util.lua", "return 'first'");
    write(second.path(), "util.lua", "return 'second'");
    write(second.path(), "only_second.lua", "return 'second only'");

    let resolver = ModuleResolver::new(&[first.path(), second.path()], None);

    assert_eq!(resolver.resolve("util").unwrap().unwrap().source, b"return 'first'");
    assert_eq!(
        resolver.resolve("only_second").unwrap().unwrap().source,
        b"return 'second only'"
    );
}

#[test]
fn test_search_path_filename_conventions() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "plain", "return 'plain'");
    write(dir.path(), "crafting/food.lua", "return 'dotted'");
    write(dir.path(), "gathering/init.lua", "return 'init'");

    let resolver = ModuleResolver::new(&[dir.path()], None);

    assert_eq!(resolver.resolve("plain").unwrap().unwrap().source, b"return 'plain'");
    assert_eq!(
        resolver.resolve("crafting.food").unwrap().unwrap().source,
        b"return 'dotted'"
    );
    assert_eq!(
        resolver.resolve("gathering").unwrap().unwrap().source,
        b"return 'init'"
    );
}

#[test]
fn test_search_path_beats_store() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "util.lua", "return 'file'");

    let resolver = ModuleResolver::new(&[dir.path()], store("util", "return 'macro'"));
    let module = resolver.resolve("util").unwrap().unwrap();

    assert_eq!(module.source, b"return 'file'");
    assert!(matches!(module.origin, ModuleOrigin::File(_)));
}

#[test]
fn test_store_fallback() {
    let dir = TempDir::new().unwrap();
    let resolver = ModuleResolver::new(&[dir.path()], store("Shared Helpers", "return 'macro'"));

    let module = resolver.resolve("Shared Helpers").unwrap().unwrap();
    assert_eq!(module.source, b"return 'macro'");
    assert_eq!(module.origin, ModuleOrigin::Macro("Shared Helpers".to_string()));
}

#[test]
fn test_macro_suffix_skips_files() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "util.macro", "return 'file'");
    write(dir.path(), "util.macro.lua", "return 'file'");

    let resolver = ModuleResolver::new(&[dir.path()], store("util", "return 'macro'"));
    let module = resolver.resolve("util.macro").unwrap().unwrap();

    assert_eq!(module.origin, ModuleOrigin::Macro("util".to_string()));
}

#[test]
fn test_not_found_lists_search_paths() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let resolver = ModuleResolver::new(&[first.path(), second.path()], None);

    assert!(resolver.resolve("missing").unwrap().is_none());

    let message = resolver.not_found_message("missing");
    assert!(message.contains(&first.path().display().to_string()));
    assert!(message.contains(&second.path().display().to_string()));
}

#[test]
fn test_non_utf8_module_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("latin.lua"), b"-- caf\xe9\nreturn 'ok'").unwrap();

    let resolver = ModuleResolver::new(&[dir.path()], None);
    let module = resolver.resolve("latin").unwrap().unwrap();
    assert_eq!(module.source, b"-- caf\xe9\nreturn 'ok'");

    let lua = mlua::Lua::new();
    resolver.install(&lua).unwrap();
    let value: String = lua.load("return require('latin')").eval().unwrap();
    assert_eq!(value, "ok");
}
