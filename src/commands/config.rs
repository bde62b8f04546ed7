//! Configuration persistence commands
//!
//! Save/load/list/delete configuration profiles as JSON files in a
//! profiles directory.

use std::path::{Path, PathBuf};

use crate::domain::{Configuration, RigError, RigResult};

/// Environment variable overriding the profiles directory
pub const CONFIG_DIR_ENV: &str = "AR7030_CONFIG_DIR";

/// `$AR7030_CONFIG_DIR`, else `$XDG_CONFIG_HOME/ar7030ctl`, else
/// `$HOME/.config/ar7030ctl`.
pub fn default_config_dir() -> RigResult<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok_or_else(|| RigError::Config("No home directory for configuration".into()))?;
    Ok(base.join("ar7030ctl"))
}

/// Ensure the profiles directory exists and return it.
fn config_dir(base: &Path) -> RigResult<PathBuf> {
    std::fs::create_dir_all(base)
        .map_err(|e| RigError::Config(format!("Failed to create configs dir: {e}")))?;
    Ok(base.to_path_buf())
}

/// Sanitize a configuration name to prevent path traversal.
/// Rejects anything with path separators, "..", or empty strings.
fn sanitize_name(name: &str) -> RigResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RigError::Config("Configuration name cannot be empty".into()));
    }
    if trimmed.contains("..") || trimmed.contains('/') || trimmed.contains('\\') {
        return Err(RigError::Config("Invalid configuration name".into()));
    }
    // Only allow alphanumeric, spaces, hyphens, underscores
    if !trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_')
    {
        return Err(RigError::Config(
            "Configuration name contains invalid characters".into(),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn save_configuration(base: &Path, config: &Configuration) -> RigResult<()> {
    let name = sanitize_name(&config.name)?;
    let path = config_dir(base)?.join(format!("{name}.json"));
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| RigError::Config(format!("Serialization error: {e}")))?;
    std::fs::write(&path, json)
        .map_err(|e| RigError::Config(format!("Failed to write config: {e}")))?;
    log::info!("Saved configuration '{name}' to {}", path.display());
    Ok(())
}

pub fn load_configuration(base: &Path, name: &str) -> RigResult<Configuration> {
    let name = sanitize_name(name)?;
    let path = config_dir(base)?.join(format!("{name}.json"));
    let json = std::fs::read_to_string(&path)
        .map_err(|e| RigError::Config(format!("Failed to read config '{name}': {e}")))?;
    serde_json::from_str(&json)
        .map_err(|e| RigError::Config(format!("Failed to parse config '{name}': {e}")))
}

pub fn list_configurations(base: &Path) -> RigResult<Vec<String>> {
    let dir = config_dir(base)?;
    let mut names: Vec<String> = std::fs::read_dir(&dir)
        .map_err(|e| RigError::Config(format!("Failed to read configs dir: {e}")))?
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            if path.extension()?.to_str()? == "json" {
                path.file_stem()?.to_str().map(String::from)
            } else {
                None
            }
        })
        .collect();
    names.sort();
    Ok(names)
}

pub fn delete_configuration(base: &Path, name: &str) -> RigResult<()> {
    let name = sanitize_name(name)?;
    if name == "Default" {
        return Err(RigError::Config(
            "Cannot delete the Default configuration".into(),
        ));
    }
    let path = config_dir(base)?.join(format!("{name}.json"));
    if !path.exists() {
        return Err(RigError::Config(format!("Configuration '{name}' not found")));
    }
    std::fs::remove_file(&path)
        .map_err(|e| RigError::Config(format!("Failed to delete config '{name}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_name_rejects_path_traversal() {
        assert!(sanitize_name("../evil").is_err());
        assert!(sanitize_name("foo/bar").is_err());
        assert!(sanitize_name("foo\\bar").is_err());
        assert!(sanitize_name("").is_err());
        assert!(sanitize_name("  ").is_err());
    }

    #[test]
    fn sanitize_name_accepts_valid_names() {
        assert_eq!(sanitize_name("Default").unwrap(), "Default");
        assert_eq!(sanitize_name("AR7030 Shack").unwrap(), "AR7030 Shack");
        assert_eq!(sanitize_name("  listening_post-2 ").unwrap(), "listening_post-2");
    }

    #[test]
    fn sanitize_name_rejects_special_characters() {
        assert!(sanitize_name("config<>").is_err());
        assert!(sanitize_name("config;drop").is_err());
        assert!(sanitize_name("config|pipe").is_err());
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let config = Configuration {
            name: "Shack".into(),
            serial_port: Some("/dev/ttyUSB1".into()),
            retries: 2,
            ..Configuration::default()
        };
        save_configuration(dir.path(), &config).unwrap();
        assert_eq!(load_configuration(dir.path(), "Shack").unwrap(), config);
    }

    #[test]
    fn list_only_json_profiles_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zulu", "alpha"] {
            let config = Configuration {
                name: name.into(),
                ..Configuration::default()
            };
            save_configuration(dir.path(), &config).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        assert_eq!(list_configurations(dir.path()).unwrap(), vec!["alpha", "zulu"]);
    }

    #[test]
    fn delete_profile() {
        let dir = tempfile::tempdir().unwrap();
        save_configuration(dir.path(), &Configuration::default()).unwrap();
        let spare = Configuration {
            name: "Spare".into(),
            ..Configuration::default()
        };
        save_configuration(dir.path(), &spare).unwrap();

        assert!(delete_configuration(dir.path(), "Default").is_err());
        delete_configuration(dir.path(), "Spare").unwrap();
        assert!(delete_configuration(dir.path(), "Spare").is_err());
        assert_eq!(list_configurations(dir.path()).unwrap(), vec!["Default"]);
    }

    #[test]
    fn load_missing_profile_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_configuration(dir.path(), "Nope"),
            Err(RigError::Config(_))
        ));
    }

    #[test]
    fn profiles_dir_created_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        assert!(list_configurations(&nested).unwrap().is_empty());
        assert!(nested.is_dir());
    }
}
