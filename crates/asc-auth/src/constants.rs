//! App Store Connect API constants
//!
//! Fixed by Apple's API; none of these are secrets.

/// Base URL every request path is appended to
pub const API_BASE_URL: &str = "https://api.appstoreconnect.apple.com/v1";

/// `aud` claim required on every App Store Connect token
pub const TOKEN_AUDIENCE: &str = "appstoreconnect-v1";

/// Token lifetime in seconds. Apple rejects tokens living longer than 20 minutes.
pub const TOKEN_LIFETIME_SECS: u64 = 20 * 60;
