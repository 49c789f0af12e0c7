use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::rc::Rc;

use tracing::{error, info, info_span, warn};

use macro_engine::{ActiveMacro, Config, Language, LineParser, MacroNode, MemoryMacroStore, ScriptHost};

/// Load every macro next to `path` into a store, keyed by file stem.
fn sibling_store(path: &Path) -> MemoryMacroStore {
    let mut store = MemoryMacroStore::new();
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let Ok(entries) = fs::read_dir(dir) else {
        return store;
    };
    for entry in entries.flatten() {
        let file = entry.path();
        if !file.is_file() || file == path {
            continue;
        }
        let Some(stem) = file.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        match fs::read_to_string(&file) {
            Ok(text) => store.insert(stem, text),
            Err(e) => warn!("Skipping {}: {e}", file.display()),
        }
    }

    store
}

fn run(path: &Path, config: &Config) -> macro_engine::Result<usize> {
    let contents = fs::read_to_string(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let _span = info_span!("macro", name = %name).entered();
    let node = MacroNode::new(name, contents).with_language(Language::from_path(path));

    let host = ScriptHost::new().with_store(sibling_store(path));
    let mut active = ActiveMacro::new(node, config, Rc::new(LineParser), host)?;

    let mut executed = 0;
    loop {
        match active.current_step()? {
            Some(command) => {
                println!("{:>4}  {}", executed + 1, command);
                executed += 1;
                active.advance();
            }
            None if active.is_running_script() => continue,
            None => break,
        }
    }
    active.dispose();

    Ok(executed)
}

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(macro_path) = args.next() else {
        eprintln!("usage: macro-engine <macro-file> [config.toml]");
        return ExitCode::FAILURE;
    };
    let config_path = args.next().unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = macro_engine::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        macro_engine::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    match run(Path::new(&macro_path), &config) {
        Ok(steps) => {
            info!("Macro finished after {steps} steps");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
