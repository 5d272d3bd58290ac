//! Auth gateway: exchanging credentials for a bearer token.

use serde::{Deserialize, Serialize};

use crate::client::{AuthResponse, ChatBackend};
use crate::error::Result;
use crate::observability::{AUTH_LOGINS, AUTH_NOTICES};

/// Which auth endpoint to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    /// `/login`: on success the response carries `access_token`.
    Login,
    /// `/register`: the response is shown to the user as-is.
    Register,
}

impl AuthKind {
    /// Path of the endpoint, relative to the API base.
    pub fn endpoint(self) -> &'static str {
        match self {
            AuthKind::Login => "login",
            AuthKind::Register => "register",
        }
    }
}

/// Username and password, serialized as the request body.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Plain-text password; sent over the transport as-is.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What an auth call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Login succeeded with this bearer token.
    Token(String),
    /// Anything else: the raw response body, to be shown verbatim.
    Notice(String),
}

#[derive(Deserialize)]
struct TokenBody {
    access_token: Option<serde_json::Value>,
}

impl AuthOutcome {
    /// Interprets an auth response.
    ///
    /// Only a successful login whose body holds a string `access_token` is a
    /// token. Register responses, failed statuses, and bodies without a token
    /// all become notices; their shape is not otherwise inspected.
    pub fn from_response(kind: AuthKind, response: AuthResponse) -> Self {
        if kind == AuthKind::Login && response.is_success() {
            let token = serde_json::from_str::<TokenBody>(&response.body)
                .ok()
                .and_then(|body| body.access_token)
                .and_then(|token| token.as_str().map(str::to_string))
                .filter(|token| !token.is_empty());
            if let Some(token) = token {
                return AuthOutcome::Token(token);
            }
        }
        AuthOutcome::Notice(response.body)
    }
}

/// Calls the auth endpoint for `kind` and interprets the answer.
pub async fn authenticate<B: ChatBackend + ?Sized>(
    backend: &B,
    kind: AuthKind,
    credentials: &Credentials,
) -> Result<AuthOutcome> {
    let response = backend.authenticate(kind, credentials).await?;
    let outcome = AuthOutcome::from_response(kind, response);
    match &outcome {
        AuthOutcome::Token(_) => {
            AUTH_LOGINS.click();
            tracing::debug!(username = %credentials.username, "login succeeded");
        }
        AuthOutcome::Notice(_) => {
            AUTH_NOTICES.click();
            tracing::debug!(username = %credentials.username, ?kind, "auth returned a notice");
        }
    }
    Ok(outcome)
}
