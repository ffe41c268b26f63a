//! Configuration for actionform.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (ACTIONFORM_HOME, ACTIONFORM_DRAFTS)
//! 2. Config file (.actionform/config.yaml)
//! 3. Defaults (~/.actionform)
//!
//! Config file discovery:
//! - Searches current directory and parents for .actionform/config.yaml
//! - Paths in config file are relative to the .actionform/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::Encoding;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const DEFAULT_DEBOUNCE_MS: u64 = 300;
const DEFAULT_SUBMIT_TIMEOUT: u64 = 30;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub persist: Option<PersistConfig>,
    #[serde(default)]
    pub submit: Option<SubmitConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .actionform/)
    pub home: Option<String>,
    /// Draft snapshot directory (relative to .actionform/)
    pub drafts: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistConfig {
    pub debounce_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitConfig {
    pub endpoint: Option<String>,
    pub encoding: Option<Encoding>,
    pub timeout_seconds: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Absolute path to the actionform home
    pub home: PathBuf,
    /// Directory holding file-store snapshots
    pub drafts: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Quiet period for debounced snapshot writes
    pub persist_debounce_ms: u64,
    /// Remote submit settings
    pub submit: SubmitSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitSettings {
    pub endpoint: Option<String>,
    pub encoding: Encoding,
    pub timeout_seconds: u64,
}

impl Default for SubmitSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            encoding: Encoding::Json,
            timeout_seconds: DEFAULT_SUBMIT_TIMEOUT,
        }
    }
}

impl SubmitSettings {
    fn from_file(submit: Option<&SubmitConfig>) -> Self {
        let defaults = Self::default();
        let Some(submit) = submit else {
            return defaults;
        };
        Self {
            endpoint: submit.endpoint.clone(),
            encoding: submit.encoding.unwrap_or(defaults.encoding),
            timeout_seconds: submit.timeout_seconds.unwrap_or(defaults.timeout_seconds),
        }
    }
}

impl ResolvedConfig {
    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".actionform").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let config_file = find_config_file();
    let file = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };
    resolve(config_file, file)
}

/// Layer env vars over an optional parsed config file
fn resolve(config_file: Option<PathBuf>, file: Option<ConfigFile>) -> Result<ResolvedConfig> {
    let default_home = || -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(".actionform"))
    };

    // Paths in the file are relative to .actionform/
    let config_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));
    let paths = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();

    let home = if let Ok(env_home) = std::env::var("ACTIONFORM_HOME") {
        PathBuf::from(env_home)
    } else if let Some(ref home_path) = paths.home {
        resolve_path(config_dir, home_path)
    } else {
        default_home()?
    };

    let drafts = if let Ok(env_drafts) = std::env::var("ACTIONFORM_DRAFTS") {
        PathBuf::from(env_drafts)
    } else if let Some(ref drafts_path) = paths.drafts {
        resolve_path(config_dir, drafts_path)
    } else {
        home.join("drafts")
    };

    let persist_debounce_ms = file
        .as_ref()
        .and_then(|f| f.persist.as_ref())
        .and_then(|p| p.debounce_ms)
        .unwrap_or(DEFAULT_DEBOUNCE_MS);

    let submit = SubmitSettings::from_file(file.as_ref().and_then(|f| f.submit.as_ref()));

    Ok(ResolvedConfig {
        home,
        drafts,
        config_file,
        persist_debounce_ms,
        submit,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the actionform home directory
pub fn actionform_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the draft snapshot directory
pub fn drafts_dir() -> Result<PathBuf> {
    Ok(config()?.drafts.clone())
}

/// Configured debounce for snapshot writes
pub fn persist_debounce() -> Result<Duration> {
    Ok(config()?.persist_debounce())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(temp: &TempDir, body: &str) -> PathBuf {
        let dir = temp.path().join(".actionform");
        std::fs::create_dir_all(&dir).unwrap();

        let config_path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "{}", body).unwrap();
        config_path
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            &temp,
            r#"
version: "1.0"
paths:
  home: ./state
  drafts: ../drafts
persist:
  debounce_ms: 500
submit:
  endpoint: http://localhost:3000/api/signup
  encoding: form
"#,
        );

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.paths.home, Some("./state".to_string()));
        assert_eq!(config.paths.drafts, Some("../drafts".to_string()));
        assert_eq!(config.persist.unwrap().debounce_ms, Some(500));

        let submit = config.submit.unwrap();
        assert_eq!(submit.encoding, Some(Encoding::Form));
        assert!(submit.timeout_seconds.is_none());
    }

    #[test]
    fn test_file_settings_resolved() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            &temp,
            r#"
version: "1.0"
paths:
  drafts: /var/tmp/actionform-drafts
persist:
  debounce_ms: 120
submit:
  endpoint: http://localhost:3000/api/signup
  timeout_seconds: 5
"#,
        );

        let file = load_config_file(&config_path).unwrap();
        let config = resolve(Some(config_path.clone()), Some(file)).unwrap();

        if std::env::var("ACTIONFORM_DRAFTS").is_err() {
            assert_eq!(config.drafts, PathBuf::from("/var/tmp/actionform-drafts"));
        }
        assert_eq!(config.persist_debounce(), Duration::from_millis(120));
        assert_eq!(config.submit.endpoint.as_deref(), Some("http://localhost:3000/api/signup"));
        assert_eq!(config.submit.encoding, Encoding::Json);
        assert_eq!(config.submit.timeout_seconds, 5);
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(None, None).unwrap();

        if std::env::var("ACTIONFORM_HOME").is_err() {
            let expected_home = dirs::home_dir().unwrap().join(".actionform");
            assert_eq!(config.home, expected_home);
        }
        if std::env::var("ACTIONFORM_DRAFTS").is_err() {
            assert_eq!(config.drafts, config.home.join("drafts"));
        }
        assert_eq!(config.persist_debounce_ms, 300);
        assert!(config.submit.endpoint.is_none());
        assert_eq!(config.submit.timeout_seconds, 30);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
