//! Error types for App Store Connect requests

use serde::Deserialize;

/// Title used when the server gives no usable error envelope.
pub const FALLBACK_TITLE: &str = "Oh no!";

/// A non-2xx answer from App Store Connect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{title}: {detail}")]
pub struct ApiError {
    pub status: u16,
    pub title: String,
    pub detail: String,
}

/// `{ "errors": [{ "title": ..., "detail": ... }] }`
#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<ErrorObject>,
}

#[derive(Deserialize)]
struct ErrorObject {
    #[serde(default)]
    title: String,
    #[serde(default)]
    detail: String,
}

impl ApiError {
    /// The synthetic error used when the body carries no error details.
    pub fn fallback(status: u16) -> Self {
        Self {
            status,
            title: FALLBACK_TITLE.into(),
            detail: format!("Something went wrong, error code: {status}"),
        }
    }

    /// Build the error for a failed response from its status and raw body.
    ///
    /// The first element of a non-empty `errors` array wins. An empty or
    /// missing array, or a body that is not JSON, yields the fallback.
    pub fn from_body(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorEnvelope>(body) {
            Ok(envelope) => match envelope.errors.into_iter().next() {
                Some(first) => Self {
                    status,
                    title: first.title,
                    detail: first.detail,
                },
                None => Self::fallback(status),
            },
            Err(_) => Self::fallback(status),
        }
    }
}

/// Errors from the request pipeline and pagination driver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing API credentials")]
    MissingCredentials,

    #[error("token signing failed: {0}")]
    SigningFailure(String),

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("credential store error: {0}")]
    CredentialStore(String),

    #[error("response decode failed: {0}")]
    Decode(String),

    #[error("pagination error: {0}")]
    Pagination(String),
}

impl Error {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MissingCredentials => "missing_credentials",
            Error::SigningFailure(_) => "signing",
            Error::Transport(_) => "transport",
            Error::Api(_) => "api",
            Error::CredentialStore(_) => "credential_store",
            Error::Decode(_) => "decode",
            Error::Pagination(_) => "pagination",
        }
    }
}

impl From<asc_auth::Error> for Error {
    fn from(err: asc_auth::Error) -> Self {
        match err {
            asc_auth::Error::MissingCredentials => Error::MissingCredentials,
            asc_auth::Error::SigningFailure(msg) => Error::SigningFailure(msg),
            other => Error::CredentialStore(other.to_string()),
        }
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
