//! Config command: view or initialize configuration.

use anyhow::{Context, Result, bail};

use crate::config;

/// Runs the config command. Showing the file is the default action, so the
/// `--show` flag needs no handling of its own.
pub fn run(init: bool, path: bool) -> Result<()> {
    let Some(config_path) = config::default_config_file() else {
        bail!("could not determine the configuration directory");
    };

    if path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            bail!("config file already exists at {}", config_path.display());
        }
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&config_path, config::default_config_content())
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        println!("Created config file at {}", config_path.display());
        return Ok(());
    }

    // Default action (and --show): print the current file
    if config_path.exists() {
        println!("Config file: {}", config_path.display());
        println!();
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        print!("{content}");
    } else {
        println!("No config file found at {}", config_path.display());
        println!("Run 'fund config --init' to create one.");
    }

    Ok(())
}
