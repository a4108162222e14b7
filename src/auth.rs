//! Optional HTTP Basic authentication in front of the exposition endpoint.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use subtle::ConstantTimeEq;

const CHALLENGE: &str = "Basic realm=\"metrics\"";

/// Credentials accepted by [`require_basic_auth`].
#[derive(Clone)]
pub struct BasicAuth {
    username: String,
    password_hash: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl BasicAuth {
    /// Creates the expected credentials from a username and a bcrypt hash of
    /// the password.
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        BasicAuth {
            username: username.into(),
            password_hash: password_hash.into(),
        }
    }

    /// Checks the `Authorization` header of a request.
    pub async fn authorize(&self, headers: &HeaderMap) -> bool {
        let Some((username, password)) = credentials(headers) else {
            tracing::debug!("missing or malformed authorization header");
            return false;
        };

        let username_matches: bool = username.as_bytes().ct_eq(self.username.as_bytes()).into();

        // Always pay for the hash so a wrong username is not faster to reject.
        let hash = self.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await;
        let password_matches = match verified {
            Ok(Ok(matches)) => matches,
            Ok(Err(error)) => {
                tracing::error!(%error, "cannot verify password against configured hash");
                false
            }
            Err(error) => {
                tracing::error!(%error, "password verification task failed");
                false
            }
        };

        if !(username_matches && password_matches) {
            tracing::debug!("rejected credentials");
            return false;
        }
        true
    }
}

/// Middleware rejecting requests without valid credentials.
///
/// Use with [`axum::middleware::from_fn_with_state`].
pub async fn require_basic_auth(
    State(auth): State<Arc<BasicAuth>>,
    request: Request,
    next: Next,
) -> Response {
    if auth.authorize(request.headers()).await {
        next.run(request).await
    } else {
        unauthorised()
    }
}

fn unauthorised() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE))],
        "Unauthorised\n",
    )
        .into_response()
}

// Extracts `(username, password)` from `Authorization: Basic <base64>`.
fn credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_owned(), password.to_owned()))
}
