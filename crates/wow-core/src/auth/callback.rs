//! Magic-link callback URL handling.

use reqwest::Url;

use super::{AuthError, AuthResult};

const DEFAULT_NEXT: &str = "/";
/// Base for callbacks given as a path or bare query.
const RELATIVE_BASE: &str = "http://localhost/";

/// What the auth server put on the redirect URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Authorization code to exchange for a session
    Code(String),
    /// The server refused the sign-in
    Denied {
        error: String,
        description: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCallback {
    pub outcome: CallbackOutcome,
    /// Path to return to after sign-in
    pub next: String,
}

/// Parse the query string of a magic-link redirect.
///
/// Accepts a full URL, a path with a query, or a bare query string. Only the
/// first occurrence of each parameter counts. An `error` parameter wins over
/// `code`; a URL carrying neither is rejected.
pub fn parse_auth_callback(url: &str) -> AuthResult<AuthCallback> {
    let url = callback_url(url.trim())?;

    let mut code = None;
    let mut error = None;
    let mut description = None;
    let mut next = None;
    for (key, value) in url.query_pairs() {
        let slot = match key.as_ref() {
            "code" => &mut code,
            "error" => &mut error,
            "error_description" => &mut description,
            "next" => &mut next,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value.into_owned());
        }
    }

    let next = non_blank(next).unwrap_or_else(|| DEFAULT_NEXT.to_string());
    let outcome = match (non_blank(error), non_blank(code)) {
        (Some(error), _) => CallbackOutcome::Denied {
            error,
            description: non_blank(description),
        },
        (None, Some(code)) => CallbackOutcome::Code(code),
        (None, None) => {
            return Err(AuthError::Api(
                "No authentication code provided".to_string(),
            ))
        }
    };
    Ok(AuthCallback { outcome, next })
}

fn callback_url(input: &str) -> AuthResult<Url> {
    Url::parse(input)
        .or_else(|_| {
            let relative = if input.starts_with(['/', '?']) {
                input.to_string()
            } else {
                format!("?{input}")
            };
            Url::parse(RELATIVE_BASE)?.join(&relative)
        })
        .map_err(|error| AuthError::Api(format!("Malformed callback URL: {error}")))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
