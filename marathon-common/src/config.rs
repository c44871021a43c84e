//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the database file inside the root folder
pub const DATABASE_FILE_NAME: &str = "marathon.db";

/// Name of the upload tree inside the root folder
pub const UPLOADS_DIR_NAME: &str = "uploads";

/// Logging section shared by every service TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config value
/// 4. OS-dependent compiled default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_value: Option<&Path>,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_value {
        return path.to_path_buf();
    }

    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/marathon (or /var/lib/marathon for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("marathon"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/marathon"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("marathon"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/marathon"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("marathon"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\marathon"))
    } else {
        PathBuf::from("./marathon_data")
    }
}

/// Default per-user config file location: `<config dir>/marathon/<service>.toml`
pub fn default_config_path(service_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("marathon").join(format!("{}.toml", service_name)))
}

/// Load and parse a TOML config file
///
/// A missing file is not an error: returns `Ok(None)` so callers fall back
/// to defaults. A file that exists but does not parse is a config error.
pub fn load_toml_config<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    Ok(Some(config))
}

/// Create the root folder (and its upload tree) if missing
pub fn ensure_root_folder(root: &Path) -> Result<()> {
    std::fs::create_dir_all(root.join(UPLOADS_DIR_NAME))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sample {
        root_folder: Option<PathBuf>,
        #[serde(default)]
        logging: LoggingConfig,
    }

    #[test]
    fn test_cli_argument_wins() {
        let resolved = resolve_root_folder(
            Some(Path::new("/from/cli")),
            "MARATHON_TEST_ROOT_UNSET_1",
            Some(Path::new("/from/toml")),
        );
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_toml_used_when_no_cli_or_env() {
        let resolved = resolve_root_folder(
            None,
            "MARATHON_TEST_ROOT_UNSET_2",
            Some(Path::new("/from/toml")),
        );
        assert_eq!(resolved, PathBuf::from("/from/toml"));
    }

    #[test]
    fn test_missing_toml_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: Option<Sample> = load_toml_config(&dir.path().join("absent.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_toml_file_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svc.toml");
        std::fs::write(&path, "root_folder = \"/data\"\n[logging]\nlevel = \"debug\"\n").unwrap();

        let loaded: Sample = load_toml_config(&path).unwrap().unwrap();
        assert_eq!(loaded.root_folder, Some(PathBuf::from("/data")));
        assert_eq!(loaded.logging.level, "debug");
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "root_folder = [").unwrap();

        let result: Result<Option<Sample>> = load_toml_config(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
