use anyhow::Result;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::core::config::AppConfig;

pub fn init(_opts: &OutputOptions) -> Result<()> {
    let path = AppConfig::config_path();
    if path.exists() {
        eprintln!("Config file already exists at {}", path.display());
        eprintln!("Remove it first if you want to regenerate.");
        return Ok(());
    }

    match AppConfig::default().save() {
        Ok(path) => println!("Generated config at {}", path.display()),
        Err(e) => {
            eprintln!("Failed to generate config: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}

pub fn check(_opts: &OutputOptions) -> Result<()> {
    let path = AppConfig::config_path();
    if !path.exists() {
        eprintln!("No config file found at {}", path.display());
        eprintln!("Run `cmon config init` to create one.");
        return Ok(());
    }

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let issues = config.validate();
    if issues.is_empty() {
        println!("Config is valid: {}", path.display());
        println!(
            "  Polling every {}s, alerts {}",
            config.settings.refresh_interval,
            if config.settings.alerts_enabled { "on" } else { "off" }
        );
    } else {
        eprintln!("Config issues found in {}:", path.display());
        for issue in &issues {
            eprintln!("  - {}", issue);
        }
        std::process::exit(1);
    }
    Ok(())
}

/// Print the effective configuration (file merged over defaults).
pub fn show(config: &AppConfig, opts: &OutputOptions) -> Result<()> {
    match opts.format {
        OutputFormat::Text => {
            println!("# {}", AppConfig::config_path().display());
            println!("# history: {}", config.history_path().display());
            print!("{}", toml::to_string_pretty(config)?);
        }
        OutputFormat::Json => println!("{}", opts.to_json(config)?),
    }
    Ok(())
}
