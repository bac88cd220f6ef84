use thiserror::Error;

pub type DeskResult<T> = std::result::Result<T, DeskError>;

/// Why an authentication check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    InvalidCredentials,
    Unauthenticated,
    SessionExpired,
    InvalidCsrfToken,
}

impl AuthFailure {
    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Invalid email or password.",
            Self::Unauthenticated => "Unauthorized",
            Self::SessionExpired => "Your session has expired. Please log in again.",
            Self::InvalidCsrfToken => "Invalid CSRF token.",
        }
    }
}

/// Errors surfaced by the ticket and account stores.
#[derive(Debug, Error)]
pub enum DeskError {
    #[error("{0}")]
    Validation(String),

    #[error("{resource} not found")]
    NotFound { resource: &'static str, id: String },

    #[error("{0}")]
    Duplicate(String),

    #[error("{}", .0.message())]
    Auth(AuthFailure),

    /// Storage, hashing or token signing failed. Not shown to clients verbatim.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl DeskError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn ticket_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: "Ticket",
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_user_facing() {
        assert_eq!(DeskError::ticket_not_found("42").to_string(), "Ticket not found");
        assert_eq!(
            DeskError::Auth(AuthFailure::InvalidCredentials).to_string(),
            "Invalid email or password."
        );
        assert_eq!(DeskError::validation("Title is required.").to_string(), "Title is required.");
    }
}
