//! Connection and prompt defaults shared by every component and tool.
//!
//! Values are layered: built-in defaults, then an optional `config.toml`,
//! then `OLLAMATUI_*` environment variables. Setting `OLLAMATUI_NOENV` to
//! `true`, `yes` or `1` turns the environment layer off.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_HOST: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2-vision:11b";

pub const ENV_HOST: &str = "OLLAMATUI_HOST";
pub const ENV_MODEL: &str = "OLLAMATUI_MODEL";
pub const ENV_PROMPT: &str = "OLLAMATUI_PROMPT";
pub const ENV_SYSTEM: &str = "OLLAMATUI_SYSTEM";
pub const ENV_NO_ENV: &str = "OLLAMATUI_NOENV";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub host: Option<String>,
    pub model: Option<String>,
    pub prompt: Option<String>,
    pub system: Option<String>,
}

impl ConfigFile {
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "ollamatui").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path`; a missing file is not an error.
    pub fn load_from_path(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(parsed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub host: String,
    pub model: String,
    pub prompt: String,
    pub system: String,
}

impl Defaults {
    pub fn builtin() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            model: DEFAULT_MODEL.to_string(),
            prompt: String::new(),
            system: String::new(),
        }
    }

    /// Layer a config file and an environment lookup over the built-ins.
    pub fn resolve<F>(file: Option<&ConfigFile>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut defaults = Self::builtin();

        if let Some(file) = file {
            overlay(&mut defaults.host, file.host.clone());
            overlay(&mut defaults.model, file.model.clone());
            overlay(&mut defaults.prompt, file.prompt.clone());
            overlay(&mut defaults.system, file.system.clone());
        }

        if env_disabled(env(ENV_NO_ENV).as_deref()) {
            return defaults;
        }

        overlay(&mut defaults.host, env(ENV_HOST));
        overlay(&mut defaults.model, env(ENV_MODEL));
        overlay(&mut defaults.prompt, env(ENV_PROMPT));
        overlay(&mut defaults.system, env(ENV_SYSTEM));
        defaults
    }

    fn from_process() -> Self {
        let file = match ConfigFile::default_path() {
            Some(path) => match ConfigFile::load_from_path(&path) {
                Ok(file) => file,
                Err(e) => {
                    warn!(error = %e, "ignoring unreadable config file");
                    None
                }
            },
            None => None,
        };
        let defaults = Self::resolve(file.as_ref(), |key| std::env::var(key).ok());
        debug!(host = %defaults.host, model = %defaults.model, "resolved defaults");
        defaults
    }
}

/// Empty values leave the lower layer in place.
fn overlay(slot: &mut String, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        *slot = value;
    }
}

fn env_disabled(value: Option<&str>) -> bool {
    value
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"))
        .unwrap_or(false)
}

static DEFAULTS: OnceLock<Defaults> = OnceLock::new();

/// Process-wide defaults, resolved on first use.
pub fn defaults() -> &'static Defaults {
    DEFAULTS.get_or_init(Defaults::from_process)
}

pub fn default_host() -> String {
    defaults().host.clone()
}

pub fn default_model() -> String {
    defaults().model.clone()
}

/// Empty unless set by the config file or `OLLAMATUI_PROMPT`.
pub fn default_prompt() -> String {
    defaults().prompt.clone()
}

/// System prompt sent with each generate request; empty unless set by the
/// config file or `OLLAMATUI_SYSTEM`.
pub fn default_system() -> String {
    defaults().system.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn builtin_defaults_apply_without_overrides() {
        let defaults = Defaults::resolve(None, env_from(&[]));
        assert_eq!(defaults, Defaults::builtin());
        assert_eq!(defaults.host, "http://localhost:11434");
        assert_eq!(defaults.model, "llama3.2-vision:11b");
    }

    #[test]
    fn environment_overrides_config_file() {
        let file = ConfigFile {
            host: Some("http://file-host:11434".to_string()),
            model: Some("file-model".to_string()),
            prompt: None,
            system: Some("be brief".to_string()),
        };
        let env = env_from(&[
            (ENV_MODEL, "env-model"),
            (ENV_PROMPT, "hello"),
            (ENV_HOST, ""),
        ]);

        let defaults = Defaults::resolve(Some(&file), env);
        assert_eq!(defaults.host, "http://file-host:11434");
        assert_eq!(defaults.model, "env-model");
        assert_eq!(defaults.prompt, "hello");
        assert_eq!(defaults.system, "be brief");
    }

    #[test]
    fn accessors_read_the_process_defaults() {
        let defaults = defaults();
        assert_eq!(default_host(), defaults.host);
        assert_eq!(default_model(), defaults.model);
        assert_eq!(default_prompt(), defaults.prompt);
        assert_eq!(default_system(), defaults.system);
    }

    #[test]
    fn kill_switch_ignores_environment() {
        for switch in ["true", "YES", "1", " True "] {
            let env = env_from(&[(ENV_NO_ENV, switch), (ENV_MODEL, "env-model")]);
            let defaults = Defaults::resolve(None, env);
            assert_eq!(defaults.model, DEFAULT_MODEL, "switch value {switch:?}");
        }

        let env = env_from(&[(ENV_NO_ENV, "0"), (ENV_MODEL, "env-model")]);
        assert_eq!(Defaults::resolve(None, env).model, "env-model");
    }

    #[test]
    fn config_file_loads_from_disk() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        assert_eq!(ConfigFile::load_from_path(&path).unwrap(), None);

        fs::write(&path, "host = \"http://gpu:11434\"\nmodel = \"qwen2.5\"\n").unwrap();
        let loaded = ConfigFile::load_from_path(&path).unwrap().unwrap();
        assert_eq!(loaded.host.as_deref(), Some("http://gpu:11434"));
        assert_eq!(loaded.model.as_deref(), Some("qwen2.5"));
        assert_eq!(loaded.prompt, None);
    }

    #[test]
    fn malformed_config_reports_path() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "host = [").unwrap();

        let err = ConfigFile::load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }
}
