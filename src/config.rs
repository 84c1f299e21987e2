// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use directories::BaseDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the configuration directory.
pub const CONFIG_DIR_ENV: &str = "UNCORS_CONFIG_DIR";

/// File name of the CA certificate inside the configuration directory.
pub const CA_CERT_FILE: &str = "ca.crt";

/// File name of the CA private key inside the configuration directory.
pub const CA_KEY_FILE: &str = "ca.key";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Validity of a newly generated CA certificate, in days
    #[serde(default = "default_ca_days")]
    pub ca_days: u32,
    /// Warn when the CA expires within this many days
    #[serde(default = "default_expiry_warning_days")]
    pub expiry_warning_days: u32,
}

fn default_ca_days() -> u32 {
    365
}

fn default_expiry_warning_days() -> u32 {
    7
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ca_days: default_ca_days(),
            expiry_warning_days: default_expiry_warning_days(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| Error::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })?;
            toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        crate::ca::validate_days(self.ca_days)?;
        if self.expiry_warning_days < 1 {
            return Err(Error::Config(
                "expiry_warning_days must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn expiry_threshold(&self) -> time::Duration {
        time::Duration::days(i64::from(self.expiry_warning_days))
    }
}

/// Locations of the CA material and config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub base: PathBuf,
    pub ca_cert: PathBuf,
    pub ca_key: PathBuf,
    pub config: PathBuf,
}

impl Paths {
    /// Resolve the per-user configuration directory (`~/.config/uncors`).
    pub fn new() -> Result<Self> {
        Ok(Self::with_base(Self::base_dir()?))
    }

    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            ca_cert: base.join(CA_CERT_FILE),
            ca_key: base.join(CA_KEY_FILE),
            config: base.join("config.toml"),
            base,
        }
    }

    fn base_dir() -> Result<PathBuf> {
        if let Ok(custom) = std::env::var(CONFIG_DIR_ENV) {
            let path = PathBuf::from(&custom);
            if !path.is_absolute() {
                return Err(Error::Config(format!(
                    "{} must be an absolute path, got: {}",
                    CONFIG_DIR_ENV, custom
                )));
            }
            return Ok(path);
        }

        let base_dirs = BaseDirs::new().ok_or_else(|| {
            Error::Config(format!(
                "Could not determine home directory. Set {} to choose a location.",
                CONFIG_DIR_ENV
            ))
        })?;
        Ok(base_dirs.home_dir().join(".config").join("uncors"))
    }

    pub fn ca_exists(&self) -> bool {
        self.ca_cert.exists() && self.ca_key.exists()
    }

    /// First CA file already present, if any.
    pub fn existing_ca_file(&self) -> Option<&Path> {
        [&self.ca_cert, &self.ca_key]
            .into_iter()
            .find(|p| p.exists())
            .map(PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.ca_days, 365);
        assert_eq!(config.expiry_warning_days, 7);
        assert_eq!(config.expiry_threshold(), time::Duration::days(7));
    }

    #[test]
    fn test_config_load_missing_file() {
        let path = PathBuf::from("/nonexistent/config.toml");
        let config =
            Config::load(&path).expect("Config should load with defaults for missing file");
        assert_eq!(config.ca_days, 365);
        assert_eq!(config.expiry_warning_days, 7);
    }

    #[test]
    fn test_config_load_partial() {
        let mut file = NamedTempFile::new().expect("temp file should be created");
        writeln!(file, "ca_days = 30").expect("write ca_days should succeed");

        let config = Config::load(file.path()).expect("Config should load with partial values");
        assert_eq!(config.ca_days, 30);
        assert_eq!(config.expiry_warning_days, 7);
    }

    #[test]
    fn test_config_load_full() {
        let mut file = NamedTempFile::new().expect("temp file should be created");
        writeln!(file, "ca_days = 90\nexpiry_warning_days = 14").unwrap();

        let loaded = Config::load(file.path()).expect("Config should load");
        assert_eq!(loaded.ca_days, 90);
        assert_eq!(loaded.expiry_warning_days, 14);
        assert_eq!(loaded.expiry_threshold(), time::Duration::days(14));
    }

    #[test]
    fn test_config_invalid_values() {
        let mut file = NamedTempFile::new().expect("temp file should be created");
        writeln!(file, "ca_days = 0").unwrap();
        assert!(Config::load(file.path()).is_err());

        let mut file = NamedTempFile::new().expect("temp file should be created");
        writeln!(file, "expiry_warning_days = 0").unwrap();
        assert!(Config::load(file.path()).is_err());

        let mut file = NamedTempFile::new().expect("temp file should be created");
        writeln!(file, "ca_days = \"soon\"").unwrap();
        assert!(matches!(Config::load(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_paths_with_base() {
        let paths = Paths::with_base("/tmp/uncors-test");
        assert_eq!(paths.ca_cert, PathBuf::from("/tmp/uncors-test/ca.crt"));
        assert_eq!(paths.ca_key, PathBuf::from("/tmp/uncors-test/ca.key"));
        assert_eq!(paths.config, PathBuf::from("/tmp/uncors-test/config.toml"));
    }

    #[test]
    fn test_paths_respects_env_override() {
        let original = std::env::var(CONFIG_DIR_ENV).ok();

        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let custom_path = temp_dir.path().join("uncors");
        std::env::set_var(CONFIG_DIR_ENV, &custom_path);

        let paths = Paths::new().expect("Paths should be created from env override");
        assert_eq!(paths.base, custom_path);
        assert_eq!(paths.ca_cert, custom_path.join("ca.crt"));
        assert_eq!(
            crate::ca::default_ca_paths().unwrap(),
            (custom_path.join("ca.crt"), custom_path.join("ca.key"))
        );
        assert!(matches!(
            crate::ca::Ca::load_default(),
            Err(Error::CaNotFound(p)) if p == custom_path
        ));

        std::env::set_var(CONFIG_DIR_ENV, "relative/dir");
        assert!(Paths::new().is_err());

        match original {
            Some(val) => std::env::set_var(CONFIG_DIR_ENV, val),
            None => std::env::remove_var(CONFIG_DIR_ENV),
        }
    }

    #[test]
    fn test_existing_ca_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let paths = Paths::with_base(temp_dir.path());
        assert!(paths.existing_ca_file().is_none());
        assert!(!paths.ca_exists());

        std::fs::write(&paths.ca_key, "key").unwrap();
        assert_eq!(paths.existing_ca_file(), Some(paths.ca_key.as_path()));
        assert!(!paths.ca_exists());
    }
}
