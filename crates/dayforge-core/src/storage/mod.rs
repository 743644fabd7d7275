pub mod config;
pub mod log_store;
pub mod migrations;

pub use config::Config;
pub use log_store::{LogStore, StoredLog};

use std::path::PathBuf;

use crate::error::Result;

/// Returns `~/.config/dayforge[-dev]/` based on DAYFORGE_ENV.
///
/// Set DAYFORGE_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("DAYFORGE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("dayforge-dev")
    } else {
        base_dir.join("dayforge")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
