use thiserror::Error;

/// Error returned by every backend call.
///
/// Errors flow unchanged from the accessor into [`QueryState::Error`] and
/// [`MutationState::Error`], so the type is cheap to clone and compare.
///
/// [`QueryState::Error`]: crate::query::QueryState::Error
/// [`MutationState::Error`]: crate::mutation::MutationState::Error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request never reached the server (DNS, connection refused, TLS, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {}", .body.as_deref().unwrap_or("<empty body>"))]
    Http { status: u16, body: Option<String> },

    /// The server answered 2xx but the body was not what we expected.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// The HTTP status code, for [`ApiError::Http`].
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for a 401 response.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401))
    }

    /// Returns `true` for a 404 response.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ApiError::Network("connection refused".to_string());
        assert_eq!(err.to_string(), "Network error: connection refused");

        let err = ApiError::Http {
            status: 404,
            body: Some(r#"{"detail":"Listing not found"}"#.to_string()),
        };
        assert_eq!(err.to_string(), r#"HTTP 404: {"detail":"Listing not found"}"#);

        let err = ApiError::Http {
            status: 502,
            body: None,
        };
        assert_eq!(err.to_string(), "HTTP 502: <empty body>");
    }

    #[test]
    fn test_status_helpers() {
        let unauthorized = ApiError::Http {
            status: 401,
            body: None,
        };
        assert!(unauthorized.is_unauthorized());
        assert!(!unauthorized.is_not_found());

        let network = ApiError::Network("timeout".to_string());
        assert_eq!(network.status(), None);
        assert!(!network.is_unauthorized());
    }
}
