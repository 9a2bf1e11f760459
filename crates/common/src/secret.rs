//! Key material and signed tokens that must never reach a log line

use std::fmt;
use zeroize::Zeroize;

/// What `{:?}` and `{}` print in place of the wrapped value.
pub const MASK: &str = "[REDACTED]";

/// Holds a `.p8` private key (base64) or a minted JWT.
///
/// Formatting always yields [`MASK`]; each copy is zeroized when it is
/// dropped. Reach the value only through `expose` at the point of use
/// (signing, building the `Authorization` header, writing the store file).
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}
