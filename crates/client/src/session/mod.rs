//! Authentication lifecycle: login, identity, profile and logout.
//!
//! [`SessionContext`] drives the backend calls; [`SessionState`] holds the
//! credential and identity shared with the HTTP adapter.

mod state;

pub use state::SessionState;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::instrument;
use zdrink_core::{Credential, UserId, UserType};

use crate::error::ApiError;
use crate::http::ApiClient;

const LOGIN_PATH: &str = "/auth/login/";
const REGISTER_PATH: &str = "/auth/register/";
const ME_PATH: &str = "/auth/me/";
const PROFILE_UPDATE_PATH: &str = "/auth/profile/update/";
const CHANGE_PASSWORD_PATH: &str = "/auth/change-password/";
const LOGOUT_PATH: &str = "/auth/logout/";
const TOKEN_REFRESH_PATH: &str = "/auth/token/refresh/";

// =============================================================================
// Request types
// =============================================================================

/// Username and password for [`SessionContext::login`].
pub struct LoginCredentials {
    /// Account username.
    pub username: String,
    /// Account password.
    pub password: SecretString,
}

impl LoginCredentials {
    /// Create login credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

/// New account details for [`SessionContext::register`].
#[derive(Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    /// Password confirmation; must equal `password`.
    pub password2: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub user_type: UserType,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("user_type", &self.user_type)
            .finish_non_exhaustive()
    }
}

/// Partial profile update. Only `Some` fields are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl ProfileUpdate {
    /// Whether no field would be sent.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.avatar.is_none()
    }
}

/// Password change request.
pub struct PasswordChange {
    pub old_password: SecretString,
    pub new_password: SecretString,
    pub new_password2: SecretString,
}

#[derive(Serialize)]
struct PasswordChangeBody<'a> {
    old_password: &'a str,
    new_password: &'a str,
    new_password2: &'a str,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh: &'a str,
}

// =============================================================================
// Response types
// =============================================================================

/// Server-provided profile of the signed-in user.
///
/// Kept as an open JSON object so fields the client does not know about
/// survive merges. Typed accessors cover the common ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserIdentity(Map<String, Value>);

impl UserIdentity {
    /// Raw field lookup.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    #[must_use]
    pub fn id(&self) -> Option<UserId> {
        self.0.get("id").and_then(Value::as_i64).map(UserId::new)
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.str_field("username")
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.str_field("email")
    }

    #[must_use]
    pub fn phone(&self) -> Option<&str> {
        self.str_field("phone")
    }

    #[must_use]
    pub fn user_type(&self) -> Option<UserType> {
        self.0
            .get("user_type")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Loyalty points balance.
    #[must_use]
    pub fn points(&self) -> Option<i64> {
        self.0.get("points").and_then(Value::as_i64)
    }

    /// Overwrite same-named fields with those in `other`; keep the rest.
    pub fn merge(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// All fields.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for UserIdentity {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Result of a successful registration.
#[derive(Debug, Clone, Deserialize)]
pub struct Registered {
    pub user: UserIdentity,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

// =============================================================================
// SessionContext
// =============================================================================

/// Session operations against the backend.
///
/// Cheap to clone; clones share the same [`SessionState`].
#[derive(Clone)]
pub struct SessionContext {
    api: ApiClient,
}

impl SessionContext {
    /// Create a session context over `api` and the state it authenticates with.
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Shared session state.
    #[must_use]
    pub fn state(&self) -> &Arc<SessionState> {
        self.api.session()
    }

    /// Whether a credential is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// The current user identity, if fetched.
    #[must_use]
    pub fn identity(&self) -> Option<UserIdentity> {
        self.state().identity()
    }

    /// Exchange credentials for a token pair, persist it, then fetch the
    /// identity.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the login call fails (prior state untouched) or
    /// if the identity fetch fails (session fully logged out).
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<UserIdentity, ApiError> {
        let body = LoginBody {
            username: &credentials.username,
            password: credentials.password.expose_secret(),
        };
        let tokens: TokenResponse = self.api.post(LOGIN_PATH, &body).await?;
        self.state()
            .install_credential(Credential::new(tokens.access, tokens.refresh))?;
        tracing::info!("Logged in");

        self.fetch_identity().await
    }

    /// Create an account. Does not sign in.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the backend rejects the registration.
    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: &Registration) -> Result<Registered, ApiError> {
        let registered: Registered = self.api.post(REGISTER_PATH, registration).await?;
        tracing::info!("Account registered");
        Ok(registered)
    }

    /// Fetch and store the current identity.
    ///
    /// Any failure is taken to mean the credential is no longer valid: the
    /// session is logged out before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotAuthenticated` without calling the backend when
    /// no credential is held, otherwise the fetch error.
    #[instrument(skip(self))]
    pub async fn fetch_identity(&self) -> Result<UserIdentity, ApiError> {
        if !self.is_authenticated() {
            return Err(ApiError::NotAuthenticated);
        }

        match self.api.get::<UserIdentity>(ME_PATH).await {
            Ok(identity) => {
                self.state().set_identity(identity.clone());
                Ok(identity)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Identity fetch failed, logging out");
                self.logout();
                Err(e)
            }
        }
    }

    /// Send a partial profile update and merge the returned fields into the
    /// identity.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the update fails; the identity is untouched.
    #[instrument(skip(self, update))]
    pub async fn update_identity(&self, update: &ProfileUpdate) -> Result<UserIdentity, ApiError> {
        let returned: UserIdentity = self.api.patch(PROFILE_UPDATE_PATH, update).await?;
        self.state().merge_identity(returned);
        self.state().identity().ok_or(ApiError::NotAuthenticated)
    }

    /// Change the account password. The session stays signed in.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the backend rejects the change.
    #[instrument(skip(self, change))]
    pub async fn change_password(&self, change: &PasswordChange) -> Result<Option<String>, ApiError> {
        let body = PasswordChangeBody {
            old_password: change.old_password.expose_secret(),
            new_password: change.new_password.expose_secret(),
            new_password2: change.new_password2.expose_secret(),
        };
        let response: MessageResponse = self.api.post(CHANGE_PASSWORD_PATH, &body).await?;
        Ok(response.message)
    }

    /// Drop the credential and identity locally. Never calls the backend.
    pub fn logout(&self) {
        self.state().clear();
        tracing::info!("Logged out");
    }

    /// Tell the backend the session ended, then log out locally.
    ///
    /// The backend call is best-effort: its failure is logged and the local
    /// logout happens regardless.
    #[instrument(skip(self))]
    pub async fn logout_remote(&self) {
        if self.is_authenticated()
            && let Err(e) = self.api.post_empty::<Value>(LOGOUT_PATH).await
        {
            tracing::warn!(error = %e, "Backend logout failed");
        }
        self.logout();
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotAuthenticated` if no refresh token is held, or
    /// the backend error.
    #[instrument(skip(self))]
    pub async fn refresh_credential(&self) -> Result<(), ApiError> {
        let credential = self.state().credential().ok_or(ApiError::NotAuthenticated)?;
        let refresh = credential
            .refresh_token()
            .ok_or(ApiError::NotAuthenticated)?
            .expose_secret()
            .to_string();

        let tokens: TokenResponse = self
            .api
            .post(TOKEN_REFRESH_PATH, &RefreshBody { refresh: &refresh })
            .await?;
        self.state()
            .install_credential(credential.with_access(tokens.access, tokens.refresh))?;
        tracing::debug!("Access token refreshed");
        Ok(())
    }

    /// Startup hook: fetch the identity for a restored credential.
    ///
    /// This is the one place a failure is not propagated. It is logged and
    /// the session is left logged out.
    #[instrument(skip(self))]
    pub async fn initialize(&self) {
        if !self.is_authenticated() {
            return;
        }
        if let Err(e) = self.fetch_identity().await {
            tracing::warn!(error = %e, "Could not restore session at startup");
        }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("state", self.state())
            .finish()
    }
}
