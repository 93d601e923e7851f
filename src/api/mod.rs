//! The remote expense API. The `ExpenseApi` trait is the boundary between the client-side state
//! and the server that owns authentication and storage.

mod http;
mod test_api;

use crate::error::{Error, ErrorType, Res};
use crate::model::{Expense, ExpenseId, ExpenseInput, LoginForm, Session, SignupForm};
use crate::Config;
use std::fmt::{Debug, Display, Formatter};

pub(crate) use http::HttpApi;
pub use test_api::{TestApi, TestApiState, DEMO_EMAIL, DEMO_PASSWORD};

/// The environment variable that, when set and non-empty, swaps the HTTP client for `TestApi`.
pub const TEST_MODE_ENV: &str = "EXPENSES_IN_TEST_MODE";

/// Operations offered by the remote expense API.
#[async_trait::async_trait]
pub trait ExpenseApi: Send + Sync {
    /// Fetch all expenses of the current session.
    async fn list_expenses(&self) -> Result<Vec<Expense>, ApiError>;

    /// Create an expense. The returned record carries the server-assigned id and date.
    async fn create_expense(&self, input: &ExpenseInput) -> Result<Expense, ApiError>;

    /// Replace the fields of the expense `id`, returning the authoritative record.
    async fn update_expense(
        &self,
        id: &ExpenseId,
        input: &ExpenseInput,
    ) -> Result<Expense, ApiError>;

    /// Delete the expense `id`.
    async fn delete_expense(&self, id: &ExpenseId) -> Result<(), ApiError>;

    async fn signup(&self, form: &SignupForm) -> Result<(), ApiError>;

    async fn login(&self, form: &LoginForm) -> Result<Session, ApiError>;
}

/// A failed call to the remote API.
///
/// `message` is the human-readable text the server sent, when it sent one. Callers show it to
/// the user and fall back to their own text otherwise.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiError {
    status: Option<u16>,
    message: Option<String>,
}

impl ApiError {
    /// A failure that produced an HTTP response.
    pub fn status(status: u16, message: Option<String>) -> Self {
        Self {
            status: Some(status),
            message,
        }
    }

    /// A failure before any response arrived, e.g. a connection error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: Some(message.into()),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The message to show a user: the server's text when present, otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match (self.status, self.message()) {
            (Some(_), Some(message)) if !message.trim().is_empty() => message.to_string(),
            _ => fallback.to_string(),
        }
    }

    /// Converts into a `Remote` error whose text is `user_message(fallback)`.
    pub fn into_error(self, fallback: &str) -> Error {
        Error::new(
            ErrorType::Remote,
            anyhow::Error::msg(self.user_message(fallback)),
        )
    }
}

impl Debug for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.status, self.message()) {
            (Some(status), Some(message)) => write!(f, "HTTP {status}: {message}"),
            (Some(status), None) => write!(f, "HTTP {status}"),
            (None, Some(message)) => write!(f, "Request failed: {message}"),
            (None, None) => write!(f, "Request failed"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Controls which `ExpenseApi` implementation is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Talk to the configured server over HTTP.
    #[default]
    Remote,
    /// Use the in-memory `TestApi`.
    Test,
}

impl Mode {
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(s) if !s.is_empty() => Mode::Test,
            _ => Mode::Remote,
        }
    }
}

/// Creates the `ExpenseApi` for `config`, authenticated with `session` when there is one.
pub fn api(config: &Config, session: Option<&Session>, mode: Mode) -> Res<Box<dyn ExpenseApi>> {
    match mode {
        Mode::Remote => Ok(Box::new(HttpApi::new(config.api_url().clone(), session)?)),
        Mode::Test => Ok(Box::new(TestApi::new(config.api_url().as_str()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_server_text() {
        let err = ApiError::status(400, Some("Title too long".into()));
        assert_eq!(err.user_message("Operation failed"), "Title too long");
    }

    #[test]
    fn test_user_message_fallback() {
        assert_eq!(
            ApiError::status(500, None).user_message("Delete failed"),
            "Delete failed"
        );
        assert_eq!(
            ApiError::status(500, Some("  ".into())).user_message("Delete failed"),
            "Delete failed"
        );
        assert_eq!(
            ApiError::transport("connection refused").user_message("Failed to load expenses"),
            "Failed to load expenses"
        );
    }

    #[test]
    fn test_into_error() {
        let err = ApiError::status(400, Some("User already exists".into()))
            .into_error("Something went wrong");
        assert_eq!(err.error_type(), ErrorType::Remote);
        assert_eq!(err.to_string(), "User already exists");
    }

    #[test]
    fn test_display() {
        let err = ApiError::status(401, Some("Unauthorized".into()));
        assert_eq!(err.to_string(), "HTTP 401: Unauthorized");
    }
}
