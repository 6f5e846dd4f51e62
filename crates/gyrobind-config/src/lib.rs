pub mod counter;
mod profile;
mod settings;
mod types;

pub use profile::*;
pub use settings::*;
pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Returns the config directory, e.g. `~/.config/gyrobind/`.
pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("gyrobind");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn profile_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("profile.toml"))
}

/// Load settings, falling back to defaults when the file is missing,
/// unreadable or out of range.
pub fn load_config(path: &Path) -> AppConfig {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(?path, "No config found, using defaults");
            return AppConfig::default();
        }
        Err(e) => {
            warn!(?path, error = %e, "Failed to read config, using defaults");
            return AppConfig::default();
        }
    };
    let config: AppConfig = match toml::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
            warn!(?path, error = %e, "Failed to parse config, using defaults");
            return AppConfig::default();
        }
    };
    if let Err(e) = config.validate() {
        warn!(?path, error = %e, "Invalid config, using defaults");
        return AppConfig::default();
    }
    info!(?path, "Loaded config");
    config
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<()> {
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(?path, "Saved config");
    Ok(())
}

/// Load the entity profile. A missing file is an empty profile; a malformed
/// one is an error. Exported repetition counts are refreshed from their files.
pub fn load_profile(path: &Path) -> Result<Profile> {
    if !path.exists() {
        info!(?path, "No profile found, starting empty");
        return Ok(Profile::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut profile: Profile = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse profile {}", path.display()))?;
    profile.sync_repetition_counts();
    info!(
        ?path,
        positions = profile.positions.len(),
        sequences = profile.sequences.len(),
        points = profile.reference_points.len(),
        groups = profile.groups.len(),
        "Loaded profile"
    );
    Ok(profile)
}

pub fn save_profile(path: &Path, profile: &Profile) -> Result<()> {
    let contents = toml::to_string_pretty(profile)?;
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(?path, "Saved profile");
    Ok(())
}
