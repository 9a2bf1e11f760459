//! Errors from locating and reading the TOML config file

use thiserror::Error;

/// Why the CLI could not produce a usable configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// The file parsed but a value is unusable (bad `base_url`, zero timeout).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The config file named on the command line or in the environment could
    /// not be read.
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
