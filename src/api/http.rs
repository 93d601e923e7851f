//! Implements the `ExpenseApi` trait with `reqwest` against the configured server.

use crate::api::{ApiError, ExpenseApi};
use crate::error::Res;
use crate::model::{Expense, ExpenseId, ExpenseInput, LoginForm, Session, SignupForm};
use anyhow::Context;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, trace};
use url::Url;

const EXPENSES: &str = "expenses";
const SIGNUP: [&str; 2] = ["auth", "signup"];
const LOGIN: [&str; 2] = ["auth", "login"];

/// Talks to the expense server over HTTP. When a session token is present it is sent as a bearer
/// token with every request.
pub(crate) struct HttpApi {
    base: Url,
    token: Option<String>,
    client: Client,
}

impl HttpApi {
    pub(crate) fn new(base: Url, session: Option<&Session>) -> Res<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Unable to build the HTTP client")?;
        Ok(Self {
            base,
            token: session.map(|s| s.token.clone()),
            client,
        })
    }

    /// Appends `segments` to the base URL, which may or may not end with a slash. Each segment is
    /// percent-encoded, so an id can never add path levels or a query.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::transport(format!("Bad base URL '{}'", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ApiError::transport(e.to_string()))?;
        let status = response.status();
        trace!("Response status {status}");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!("Request failed with {status}: {body}");
        Err(ApiError::status(status.as_u16(), error_message(&body)))
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::transport(format!("Unable to parse the response: {e}")))
    }
}

#[async_trait::async_trait]
impl ExpenseApi for HttpApi {
    async fn list_expenses(&self) -> Result<Vec<Expense>, ApiError> {
        let url = self.endpoint(&[EXPENSES])?;
        self.json(self.client.get(url)).await
    }

    async fn create_expense(&self, input: &ExpenseInput) -> Result<Expense, ApiError> {
        let url = self.endpoint(&[EXPENSES])?;
        self.json(self.client.post(url).json(input)).await
    }

    async fn update_expense(
        &self,
        id: &ExpenseId,
        input: &ExpenseInput,
    ) -> Result<Expense, ApiError> {
        let url = self.endpoint(&[EXPENSES, id.as_str()])?;
        self.json(self.client.put(url).json(input)).await
    }

    async fn delete_expense(&self, id: &ExpenseId) -> Result<(), ApiError> {
        let url = self.endpoint(&[EXPENSES, id.as_str()])?;
        match self.send(self.client.delete(url)).await {
            Ok(_) => Ok(()),
            // Already gone
            Err(e) if e.status_code() == Some(StatusCode::NOT_FOUND.as_u16()) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn signup(&self, form: &SignupForm) -> Result<(), ApiError> {
        let url = self.endpoint(&SIGNUP)?;
        self.send(self.client.post(url).json(form)).await.map(|_| ())
    }

    async fn login(&self, form: &LoginForm) -> Result<Session, ApiError> {
        let url = self.endpoint(&LOGIN)?;
        self.json(self.client.post(url).json(form)).await
    }
}

/// The shape of the server's error bodies, e.g. `{"msg": "Invalid credentials"}`.
#[derive(Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
}

/// Extracts the human-readable message from an error response body, if it has one.
fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .msg
        .or(parsed.message)
        .filter(|m| !m.trim().is_empty())
}
