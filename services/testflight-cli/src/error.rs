//! CLI-level errors
//!
//! Library failures pass through as `asc_client::Error`; these cover the
//! outcomes only the command layer knows about.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("not signed in, run `testflight sign-in` first")]
    NotSignedIn,

    #[error("App Store Connect rejected the credentials, nothing was saved: {0}")]
    SignInRejected(#[source] asc_client::Error),

    #[error("request body is not valid JSON: {0}")]
    InvalidBody(String),

    #[error("build {build_id} has no What to Test localization{}", locale_suffix(.locale))]
    NoLocalization {
        build_id: String,
        locale: Option<String>,
    },
}

fn locale_suffix(locale: &Option<String>) -> String {
    locale
        .as_deref()
        .map(|l| format!(" for {l}"))
        .unwrap_or_default()
}

/// Swap the library's missing-credentials error for the CLI hint.
pub fn signed_in(err: asc_client::Error) -> anyhow::Error {
    match err {
        asc_client::Error::MissingCredentials => Error::NotSignedIn.into(),
        other => other.into(),
    }
}
