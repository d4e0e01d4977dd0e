//! Settings management for CLI set/unset/config commands.
//!
//! Each configuration key has a [`SettingHandler`]; the [`SettingRegistry`]
//! maps user-facing key names to their handlers.

pub mod error;
pub mod handlers;
pub mod registry;

pub use error::SettingError;
pub use registry::SettingRegistry;

use std::error::Error;

use crate::cli::CliContext;
use crate::core::config::{ConfigStore, ResolvedConfig};
use crate::core::storage::path_display;

/// Trait for handling a configuration setting.
pub trait SettingHandler: Send + Sync {
    /// Returns the configuration key this handler manages.
    fn key(&self) -> &'static str;

    /// Validate and store a value; returns the message to show.
    fn set(&self, args: &[String], config: &ConfigStore) -> Result<String, SettingError>;

    fn unset(&self, config: &ConfigStore) -> Result<String, SettingError>;

    /// Format the current value for display in `ichat config` output.
    fn format(&self, resolved: &ResolvedConfig) -> String;
}

pub fn apply_set(
    registry: &SettingRegistry,
    config: &ConfigStore,
    key: &str,
    args: &[String],
) -> Result<String, SettingError> {
    let handler = registry
        .get(key)
        .ok_or_else(|| SettingError::UnknownKey(key.to_string()))?;
    handler.set(args, config)
}

pub fn apply_unset(
    registry: &SettingRegistry,
    config: &ConfigStore,
    key: &str,
) -> Result<String, SettingError> {
    let handler = registry
        .get(key)
        .ok_or_else(|| SettingError::UnknownKey(key.to_string()))?;
    handler.unset(config)
}

pub fn run_set(context: &CliContext, key: &str, args: &[String]) -> Result<(), Box<dyn Error>> {
    let registry = SettingRegistry::new();
    if args.is_empty() && registry.get(key).is_none() {
        return print_config(context);
    }
    match apply_set(&registry, &context.config, key, args) {
        Ok(message) => {
            println!("{message}");
            Ok(())
        }
        Err(err) => {
            err.print();
            std::process::exit(err.exit_code());
        }
    }
}

pub fn run_unset(context: &CliContext, key: &str) -> Result<(), Box<dyn Error>> {
    let registry = SettingRegistry::new();
    match apply_unset(&registry, &context.config, key) {
        Ok(message) => {
            println!("{message}");
            Ok(())
        }
        Err(err) => {
            err.print();
            std::process::exit(err.exit_code());
        }
    }
}

pub fn format_config(registry: &SettingRegistry, resolved: &ResolvedConfig) -> Vec<String> {
    let width = registry
        .keys_display_order()
        .iter()
        .map(|key| key.len())
        .max()
        .unwrap_or(0);
    registry
        .keys_display_order()
        .iter()
        .filter_map(|key| registry.get(key))
        .map(|handler| {
            format!(
                "  {:<width$}  {}",
                handler.key(),
                handler.format(resolved),
                width = width
            )
        })
        .collect()
}

pub fn print_config(context: &CliContext) -> Result<(), Box<dyn Error>> {
    let registry = SettingRegistry::new();
    let resolved = context.config.resolve(&context.defaults)?;

    println!("⚙️  Configuration");
    for line in format_config(&registry, &resolved) {
        println!("{line}");
    }
    println!();
    match &context.data_file {
        Some(path) => println!("Data file: {}", path_display(path)),
        None => println!("Data file: none (in-memory run)"),
    }
    if !resolved.is_configured() {
        println!();
        println!("💡 Chat needs both api-key and api-url.");
    }
    Ok(())
}
