//! App Store Connect authentication library
//!
//! Holds the API key credentials and mints the short-lived ES256 bearer
//! tokens App Store Connect expects on every request. The crate has no
//! HTTP dependency; `asc-client` drives it once per outbound request.
//!
//! Credential flow:
//! 1. Caller reads the `.p8` key via `credentials::encode_private_key_file()`
//! 2. Credentials stored via `CredentialStore::set()`
//! 3. `token::TokenMinter::mint()` reads the store and signs a fresh JWT
//! 4. Sign-out (or failed sign-in verification) calls `CredentialStore::clear()`

pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use constants::*;
pub use credentials::{
    CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore,
    encode_private_key_file,
};
pub use error::{Error, Result};
pub use token::{BearerToken, Claims, TokenMinter};
