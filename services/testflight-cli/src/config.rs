//! Configuration types and loading
//!
//! Config precedence: `--config` > TESTFLIGHT_CONFIG env var > `testflight.toml`
//! in the working directory > defaults. Credentials never live in the TOML;
//! the file only says where the credential store is kept.

use serde::Deserialize;
use std::path::PathBuf;

/// Env var naming the config file
pub const CONFIG_PATH_ENV: &str = "TESTFLIGHT_CONFIG";

/// Env var overriding `[credentials] path`
pub const CREDENTIALS_PATH_ENV: &str = "ASC_CREDENTIALS_PATH";

const DEFAULT_CONFIG_FILE: &str = "testflight.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// App Store Connect endpoint settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Whole-request timeout. Unset leaves the transport default in place.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: None,
        }
    }
}

/// Credential store location
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_base_url() -> String {
    asc_auth::API_BASE_URL.to_string()
}

impl Config {
    /// Resolve, load and validate the configuration.
    ///
    /// A missing default file yields defaults; a file named explicitly via
    /// CLI or env var must exist.
    pub fn load(cli_path: Option<&str>) -> common::Result<Self> {
        let explicit = cli_path.is_some() || std::env::var_os(CONFIG_PATH_ENV).is_some();
        let path = common::resolve_path(cli_path, CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE);

        let mut config: Config = if explicit || path.exists() {
            common::load_toml(&path)?
        } else {
            Config::default()
        };

        if let Some(p) = std::env::var_os(CREDENTIALS_PATH_ENV) {
            config.credentials.path = Some(PathBuf::from(p));
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }
        if self.api.timeout_secs == Some(0) {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Credential file path: configured, else `$XDG_CONFIG_HOME/testflight`,
    /// else `$HOME/.config/testflight`, else the working directory.
    pub fn credentials_path(&self) -> PathBuf {
        if let Some(p) = &self.credentials.path {
            return p.clone();
        }
        let config_home = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")));
        match config_home {
            Some(dir) => dir.join("testflight").join("credentials.json"),
            None => PathBuf::from("credentials.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that mutate environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("testflight.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_full_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CREDENTIALS_PATH_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[api]
base_url = "https://asc-mirror.internal/v1"
timeout_secs = 30

[credentials]
path = "/var/lib/testflight/credentials.json"
"#,
        );

        let config = Config::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.api.base_url, "https://asc-mirror.internal/v1");
        assert_eq!(config.api.timeout_secs, Some(30));
        assert_eq!(
            config.credentials_path(),
            PathBuf::from("/var/lib/testflight/credentials.json")
        );
    }

    #[test]
    fn empty_file_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CREDENTIALS_PATH_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");

        let config = Config::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(
            config.api.base_url,
            "https://api.appstoreconnect.apple.com/v1"
        );
        assert!(config.api.timeout_secs.is_none());
        assert!(config.credentials.path.is_none());
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let result = Config::load(Some("/nonexistent/testflight.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn invalid_toml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(Config::load(Some(path.to_str().unwrap())).is_err());
    }

    #[test]
    fn base_url_without_scheme_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\nbase_url = \"api.appstoreconnect.apple.com/v1\"\n");

        let err = Config::load(Some(path.to_str().unwrap())).unwrap_err();
        assert!(
            err.to_string().contains("base_url must start with http"),
            "got: {err}"
        );
    }

    #[test]
    fn zero_timeout_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\ntimeout_secs = 0\n");
        assert!(Config::load(Some(path.to_str().unwrap())).is_err());
    }

    #[test]
    fn credentials_path_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[credentials]\npath = \"/from/file.json\"\n");

        unsafe { set_env(CREDENTIALS_PATH_ENV, "/from/env.json") };
        let config = Config::load(Some(path.to_str().unwrap())).unwrap();
        unsafe { remove_env(CREDENTIALS_PATH_ENV) };

        assert_eq!(config.credentials_path(), PathBuf::from("/from/env.json"));
    }

    #[test]
    fn default_credentials_path_under_xdg_config_home() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("XDG_CONFIG_HOME", "/home/dev/.config-alt") };
        let path = Config::default().credentials_path();
        unsafe { remove_env("XDG_CONFIG_HOME") };

        assert_eq!(
            path,
            PathBuf::from("/home/dev/.config-alt/testflight/credentials.json")
        );
    }
}
