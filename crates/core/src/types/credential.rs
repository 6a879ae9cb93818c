//! Bearer credential types.
//!
//! The ordering backend issues a JWT access/refresh pair on login. Both
//! tokens are opaque to the client and are kept behind [`SecretString`] so
//! they never show up in `Debug` output or logs.

use secrecy::{ExposeSecret, SecretString};

/// Keys under which the credential is kept in durable client storage.
///
/// Values are stored as plain strings, not serialized structures.
pub mod storage_keys {
    /// Access token key.
    pub const ACCESS_TOKEN: &str = "token";
    /// Refresh token key.
    pub const REFRESH_TOKEN: &str = "refresh_token";
}

/// Access/refresh token pair held by an authenticated session.
#[derive(Clone)]
pub struct Credential {
    access: SecretString,
    refresh: Option<SecretString>,
}

impl Credential {
    /// Create a credential from an access token and optional refresh token.
    #[must_use]
    pub fn new(access: impl Into<String>, refresh: Option<String>) -> Self {
        Self {
            access: SecretString::from(access.into()),
            refresh: refresh.map(SecretString::from),
        }
    }

    /// The bearer access token.
    #[must_use]
    pub const fn access_token(&self) -> &SecretString {
        &self.access
    }

    /// The refresh token, if one was issued or restored.
    #[must_use]
    pub const fn refresh_token(&self) -> Option<&SecretString> {
        self.refresh.as_ref()
    }

    /// Value for the `Authorization` header.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access.expose_secret())
    }

    /// Replace the access token, keeping the refresh token unless a rotated
    /// one is supplied.
    #[must_use]
    pub fn with_access(self, access: impl Into<String>, rotated_refresh: Option<String>) -> Self {
        Self {
            access: SecretString::from(access.into()),
            refresh: rotated_refresh.map(SecretString::from).or(self.refresh),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access", &"[REDACTED]")
            .field("refresh", &self.refresh.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header_value() {
        let credential = Credential::new("abc.def", Some("r1".to_string()));
        assert_eq!(credential.bearer(), "Bearer abc.def");
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let credential = Credential::new("super_secret_access", Some("super_secret_refresh".into()));
        let debug_output = format!("{credential:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_access"));
        assert!(!debug_output.contains("super_secret_refresh"));
    }

    #[test]
    fn test_with_access_keeps_refresh_unless_rotated() {
        let credential = Credential::new("a1", Some("r1".to_string()));

        let refreshed = credential.clone().with_access("a2", None);
        assert_eq!(refreshed.access_token().expose_secret(), "a2");
        assert_eq!(
            refreshed.refresh_token().map(|t| t.expose_secret()),
            Some("r1")
        );

        let rotated = credential.with_access("a3", Some("r2".to_string()));
        assert_eq!(
            rotated.refresh_token().map(|t| t.expose_secret()),
            Some("r2")
        );
    }
}
