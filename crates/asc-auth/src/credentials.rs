//! Credential storage for App Store Connect API keys
//!
//! Three values make up a usable credential: the API key id, the issuer id
//! and the base64-encoded `.p8` private key. Stores hold them as three
//! independent keys; a store reports credentials only when all three are
//! present and non-empty, so a half-written sign-in reads back as absent.
//!
//! The store is injected into `TokenMinter` as an `Arc<dyn CredentialStore>`.
//! Minting only reads; writes happen at sign-in and sign-out.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// A complete set of App Store Connect API credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Key id shown in App Store Connect; becomes the JWT `kid` header
    pub api_key_id: String,
    /// Issuer id of the team; becomes the JWT `iss` claim
    pub issuer_id: String,
    /// Base64 of the PKCS#8 PEM private key
    pub private_key: Secret<String>,
}

impl Credentials {
    pub fn new(
        api_key_id: impl Into<String>,
        issuer_id: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            api_key_id: api_key_id.into(),
            issuer_id: issuer_id.into(),
            private_key: Secret::new(private_key.into()),
        }
    }
}

/// Persistent home of the API credentials.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn CredentialStore>`).
pub trait CredentialStore: Send + Sync {
    /// Current credentials, or `None` when any of the three values is absent.
    fn get(&self) -> Pin<Box<dyn Future<Output = Result<Option<Credentials>>> + Send + '_>>;

    /// Replace all three values.
    fn set(
        &self,
        credentials: Credentials,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Remove all three values at once.
    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Raw key/value view of the three stored values.
///
/// Field names are the storage keys `apiKey`, `issuerID` and `privateKey`, so an
/// exported credential file can be read back unchanged.
#[derive(Default, Serialize, Deserialize)]
struct StoredKeys {
    #[serde(rename = "apiKey", default, skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    #[serde(rename = "issuerID", default, skip_serializing_if = "Option::is_none")]
    issuer_id: Option<String>,
    #[serde(rename = "privateKey", default, skip_serializing_if = "Option::is_none")]
    private_key: Option<String>,
}

impl StoredKeys {
    fn from_credentials(credentials: &Credentials) -> Self {
        Self {
            api_key: Some(credentials.api_key_id.clone()),
            issuer_id: Some(credentials.issuer_id.clone()),
            private_key: Some(credentials.private_key.expose().clone()),
        }
    }

    fn complete(&self) -> Option<Credentials> {
        let present = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_owned);
        Some(Credentials::new(
            present(&self.api_key)?,
            present(&self.issuer_id)?,
            present(&self.private_key)?,
        ))
    }

    fn is_empty(&self) -> bool {
        self.api_key.is_none() && self.issuer_id.is_none() && self.private_key.is_none()
    }
}

impl Drop for StoredKeys {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        if let Some(key) = self.private_key.as_mut() {
            key.zeroize();
        }
    }
}

/// Credential store backed by a JSON file.
///
/// All writes use atomic temp-file + rename and leave the file at 0600.
/// A tokio Mutex serializes writers within the process.
pub struct FileCredentialStore {
    path: PathBuf,
    state: Mutex<StoredKeys>,
}

impl FileCredentialStore {
    /// Load the credential file at `path`.
    ///
    /// If the file doesn't exist it is created as `{}` (signed-out state).
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let keys: StoredKeys = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            info!(
                path = %path.display(),
                signed_in = keys.complete().is_some(),
                "loaded credentials"
            );
            keys
        } else {
            info!(path = %path.display(), "credential file not found, starting signed out");
            let keys = StoredKeys::default();
            write_atomic(&path, &keys).await?;
            keys
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Pin<Box<dyn Future<Output = Result<Option<Credentials>>> + Send + '_>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.complete())
        })
    }

    fn set(
        &self,
        credentials: Credentials,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let keys = StoredKeys::from_credentials(&credentials);
            write_atomic(&self.path, &keys).await?;
            *state = keys;
            debug!(api_key_id = %credentials.api_key_id, "stored credentials");
            Ok(())
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if state.is_empty() {
                return Ok(());
            }
            let keys = StoredKeys::default();
            write_atomic(&self.path, &keys).await?;
            *state = keys;
            info!(path = %self.path.display(), "cleared credentials");
            Ok(())
        })
    }
}

/// In-process credential store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    state: Mutex<StoredKeys>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            state: Mutex::new(StoredKeys::from_credentials(&credentials)),
        }
    }

    /// Store with any subset of the three values set.
    pub fn partial(
        api_key_id: Option<&str>,
        issuer_id: Option<&str>,
        private_key: Option<&str>,
    ) -> Self {
        Self {
            state: Mutex::new(StoredKeys {
                api_key: api_key_id.map(str::to_owned),
                issuer_id: issuer_id.map(str::to_owned),
                private_key: private_key.map(str::to_owned),
            }),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Pin<Box<dyn Future<Output = Result<Option<Credentials>>> + Send + '_>> {
        Box::pin(async move { Ok(self.state.lock().await.complete()) })
    }

    fn set(
        &self,
        credentials: Credentials,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            *self.state.lock().await = StoredKeys::from_credentials(&credentials);
            Ok(())
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            *self.state.lock().await = StoredKeys::default();
            Ok(())
        })
    }
}

/// Read a `.p8` private key file and return it base64-encoded for storage.
///
/// The path must exist and be a regular file. Contents are not validated;
/// a malformed key surfaces as `SigningFailure` on the first mint.
pub async fn encode_private_key_file(path: &Path) -> Result<String> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::InvalidKeyFile(format!("{}: {e}", path.display())))?;
    if !metadata.is_file() {
        return Err(Error::InvalidKeyFile(format!(
            "{} is not a regular file",
            path.display()
        )));
    }

    let pem = zeroize::Zeroizing::new(
        tokio::fs::read(path)
            .await
            .map_err(|e| Error::Io(format!("reading private key file: {e}")))?,
    );
    Ok(STANDARD.encode(pem.as_slice()))
}

/// Write the stored keys to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets permissions to 0600 since the file holds the private key.
async fn write_atomic(path: &Path, keys: &StoredKeys) -> Result<()> {
    let json = zeroize::Zeroizing::new(
        serde_json::to_string_pretty(keys)
            .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?,
    );

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;
    if !dir.as_os_str().is_empty() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::Io(format!("creating credential directory: {e}")))?;
    }

    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
