//! Failure taxonomy for calls against the ordering API.
//!
//! Every non-2xx response and every transport failure is classified into an
//! [`ApiError`] by [`ApiClient`](crate::ApiClient). Classification never
//! swallows the failure: the error is always returned to the caller, and
//! any user-facing notification is published as a side effect.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::events::Notification;
use crate::orders::OrderValidationError;
use crate::storage::StorageError;

/// Notification text for requests that never got a response.
pub const NETWORK_UNAVAILABLE_MESSAGE: &str = "Network error, please check your connection";
/// Notification text for 403 responses.
pub const FORBIDDEN_MESSAGE: &str = "You do not have permission to access this resource";
/// Notification text for 404 responses.
pub const NOT_FOUND_MESSAGE: &str = "The requested resource does not exist";
/// Notification text for 500 responses.
pub const SERVER_ERROR_MESSAGE: &str = "Internal server error";
/// Notification text for other failures without a server message.
pub const REQUEST_FAILED_MESSAGE: &str = "Request failed";

/// Errors returned by the ordering API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response reached the client (connect failure, timeout).
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(#[source] reqwest::Error),

    /// 401: the credential was rejected. The session has been cleared.
    #[error("Unauthorized")]
    Unauthorized,

    /// 403.
    #[error("Forbidden")]
    Forbidden,

    /// 404.
    #[error("Not found")]
    NotFound,

    /// 500.
    #[error("Server error")]
    ServerError,

    /// Any other non-success status.
    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or(REQUEST_FAILED_MESSAGE))]
    Http {
        /// Response status code.
        status: u16,
        /// Server-supplied `message` or `detail` field, if present.
        message: Option<String>,
    },

    /// The operation requires a credential and none is held.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// A successful response carried a body that could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Durable credential storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// An order was rejected locally before being sent.
    #[error("Invalid order: {0}")]
    InvalidOrder(#[from] OrderValidationError),

    /// A cart line quantity above what the backend can store.
    #[error("Quantity {0} is out of range")]
    InvalidQuantity(i64),

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),
}

impl ApiError {
    /// Classify a non-success response.
    ///
    /// `body` is the decoded JSON error payload, when the server sent one.
    #[must_use]
    pub fn from_status(status: StatusCode, body: Option<&Value>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::INTERNAL_SERVER_ERROR => Self::ServerError,
            other => Self::Http {
                status: other.as_u16(),
                message: body.and_then(server_message),
            },
        }
    }

    /// The toast-style notification to surface for this error, if any.
    ///
    /// 401 has no notification: it is handled by invalidating the session.
    /// Errors raised locally (decode, storage, missing credential) are left
    /// to the caller to render.
    #[must_use]
    pub fn notification(&self) -> Option<Notification> {
        let message = match self {
            Self::NetworkUnavailable(_) => NETWORK_UNAVAILABLE_MESSAGE.to_string(),
            Self::Forbidden => FORBIDDEN_MESSAGE.to_string(),
            Self::NotFound => NOT_FOUND_MESSAGE.to_string(),
            Self::ServerError => SERVER_ERROR_MESSAGE.to_string(),
            Self::Http { message, .. } => message
                .clone()
                .unwrap_or_else(|| REQUEST_FAILED_MESSAGE.to_string()),
            Self::Unauthorized
            | Self::NotAuthenticated
            | Self::Decode(_)
            | Self::Storage(_)
            | Self::InvalidUrl(_)
            | Self::InvalidOrder(_)
            | Self::InvalidQuantity(_)
            | Self::Client(_) => return None,
        };
        Some(Notification::new(message))
    }

    /// Whether this error ended the session.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// HTTP status associated with the error, if it came from a response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Forbidden => Some(403),
            Self::NotFound => Some(404),
            Self::ServerError => Some(500),
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Extract the server's human-readable message: `message` first, then `detail`.
fn server_message(body: &Value) -> Option<String> {
    ["message", "detail"].iter().find_map(|key| match body.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Null => None,
        Value::String(_) => None,
        other => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classifies_known_statuses() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, None),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, None),
            ApiError::Forbidden
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, None),
            ApiError::NotFound
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, None),
            ApiError::ServerError
        ));
    }

    #[test]
    fn test_other_status_prefers_message_then_detail() {
        let body = json!({"message": "out of stock", "detail": "ignored"});
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, Some(&body));
        assert!(matches!(
            &err,
            ApiError::Http { status: 400, message: Some(m) } if m == "out of stock"
        ));

        let body = json!({"detail": "Method \"PUT\" not allowed."});
        let err = ApiError::from_status(StatusCode::METHOD_NOT_ALLOWED, Some(&body));
        assert_eq!(
            err.notification().map(|n| n.message),
            Some("Method \"PUT\" not allowed.".to_string())
        );
    }

    #[test]
    fn test_other_status_without_message_uses_generic_text() {
        let body = json!({"quantity": ["Ensure this value is greater than or equal to 1."]});
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, Some(&body));
        assert_eq!(
            err.notification().map(|n| n.message),
            Some(REQUEST_FAILED_MESSAGE.to_string())
        );

        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, None);
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.to_string(), "HTTP 502: Request failed");
    }

    #[test]
    fn test_notification_texts() {
        assert_eq!(
            ApiError::Forbidden.notification().map(|n| n.message),
            Some(FORBIDDEN_MESSAGE.to_string())
        );
        assert_eq!(
            ApiError::NotFound.notification().map(|n| n.message),
            Some(NOT_FOUND_MESSAGE.to_string())
        );
        assert_eq!(
            ApiError::ServerError.notification().map(|n| n.message),
            Some(SERVER_ERROR_MESSAGE.to_string())
        );
    }

    #[test]
    fn test_unauthorized_has_no_notification() {
        assert!(ApiError::Unauthorized.notification().is_none());
        assert!(ApiError::Unauthorized.is_unauthorized());
        assert!(ApiError::NotAuthenticated.notification().is_none());
    }
}
