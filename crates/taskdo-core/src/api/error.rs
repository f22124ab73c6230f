use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not logged in")]
    Unauthenticated,

    #[error("Authentication failed: {detail}")]
    Auth { detail: String },

    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response from {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Shown when the auth endpoint rejects a login without saying why
const DEFAULT_AUTH_DETAIL: &str = "Invalid username or password";

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        ApiError::Http {
            status,
            body: Self::truncate_body(body),
        }
    }

    pub fn auth(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let detail = if detail.trim().is_empty() {
            DEFAULT_AUTH_DETAIL.to_string()
        } else {
            detail
        };
        ApiError::Auth { detail }
    }

    pub fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        ApiError::Decode {
            context: context.into(),
            source,
        }
    }

    /// HTTP status of a non-2xx response, if that is what this error is
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Text suitable for showing to the user next to the failed action.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthenticated => "You are not logged in".to_string(),
            ApiError::Auth { detail } => detail.clone(),
            ApiError::Http { status, body } => match status.as_u16() {
                401 => "Session expired or invalid - please log in again".to_string(),
                403 => "You do not have permission to do that".to_string(),
                404 => "Not found".to_string(),
                500..=599 => "Server error - please try again later".to_string(),
                _ if body.is_empty() => format!("Request failed ({})", status),
                _ => format!("Request failed ({}): {}", status, body),
            },
            ApiError::Transport(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            ApiError::Transport(e) if e.is_connect() => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            ApiError::Transport(e) => format!("Network error: {}", e),
            ApiError::Decode { .. } => "Unexpected response from server".to_string(),
        }
    }
}
