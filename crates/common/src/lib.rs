//! Common types shared by the App Store Connect crates

mod config;
mod error;
mod secret;

pub use config::{load_toml, resolve_path};
pub use error::{Error, Result};
pub use secret::Secret;
