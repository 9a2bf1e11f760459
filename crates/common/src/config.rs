//! Config file location and TOML loading helpers
//!
//! Path precedence: CLI arg > env var > default file name.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::Result;

/// Resolve a config file path from a CLI arg, an env var, or a default.
pub fn resolve_path(cli_path: Option<&str>, env_var: &str, default: &str) -> PathBuf {
    if let Some(p) = cli_path {
        return PathBuf::from(p);
    }
    if let Ok(p) = std::env::var(env_var) {
        return PathBuf::from(p);
    }
    PathBuf::from(default)
}

/// Read and deserialize a TOML file.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
        #[serde(default)]
        limit: Option<u32>,
    }

    #[test]
    fn cli_path_wins() {
        let path = resolve_path(Some("/cli/config.toml"), "COMMON_TEST_UNSET_VAR", "x.toml");
        assert_eq!(path, PathBuf::from("/cli/config.toml"));
    }

    #[test]
    fn default_used_without_cli_or_env() {
        let path = resolve_path(None, "COMMON_TEST_DEFINITELY_UNSET_VAR", "default.toml");
        assert_eq!(path, PathBuf::from("default.toml"));
    }

    #[test]
    fn load_toml_parses_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.toml");
        std::fs::write(&path, "name = \"apps\"\nlimit = 200\n").unwrap();

        let sample: Sample = load_toml(&path).unwrap();
        assert_eq!(sample.name, "apps");
        assert_eq!(sample.limit, Some(200));
    }

    #[test]
    fn load_toml_missing_file_is_io_error() {
        let result: Result<Sample> = load_toml(Path::new("/nonexistent/sample.toml"));
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }

    #[test]
    fn load_toml_invalid_is_toml_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "name = {{{{").unwrap();

        let result: Result<Sample> = load_toml(&path);
        assert!(matches!(result, Err(crate::Error::Toml(_))));
    }
}
