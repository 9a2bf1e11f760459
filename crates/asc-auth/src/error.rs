//! Error types for credential storage and token minting

/// Errors from credential and token operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing API credentials")]
    MissingCredentials,

    #[error("token signing failed: {0}")]
    SigningFailure(String),

    #[error("invalid private key file: {0}")]
    InvalidKeyFile(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
