//! Stored configuration, kept as JSON between runs.

use anyhow::{Context, Result};
use log::{debug, info};
use rxchain_messages::Config;
use std::fs;
use std::path::{Path, PathBuf};

/// `$HOME/.rxchain/config.json`, or the working directory without a home.
pub fn default_path() -> PathBuf {
    let base = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(".rxchain").join("config.json")
}

/// Load the stored configuration. A missing file gives the defaults.
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!("No stored configuration at {}", path.display());
        return Ok(Config::default());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

pub fn save(path: &Path, config: &Config) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let text = serde_json::to_string_pretty(config)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    info!("Stored configuration in {}", path.display());
    Ok(())
}

/// Remove the stored configuration, if any.
pub fn reset(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("removing {}", path.display()))?;
        info!("Discarded stored configuration {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_load_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            frequency: 20_900,
            preamp: -1,
            ..Config::default()
        };
        save(&path, &config).unwrap();
        assert_eq!(load(&path).unwrap(), config);

        reset(&path).unwrap();
        assert!(!path.exists());
        reset(&path).unwrap();
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(load(&path).is_err());
    }
}
