//! Storage key constants.

/// Storage keys used by the SDK
pub struct StorageKeys;

impl StorageKeys {
    /// Persisted refresh token
    pub const REFRESH_TOKEN: &'static str = "helios_refresh_token";

    /// Logout signal observed by sibling instances sharing a backend
    pub const LOGOUT_SIGNAL: &'static str = "helios_logout";
}
