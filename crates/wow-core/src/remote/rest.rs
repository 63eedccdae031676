//! PostgREST backend over HTTP.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_RANGE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::backend::{
    BackendError, BackendResult, Filter, Principal, RemoteBackend, SelectQuery, SelectResult,
    Table,
};
use crate::auth::AuthState;
use crate::config::BackendConfig;
use crate::util::compact_text;

const PREFER_COUNT: &str = "count=exact";
const PREFER_RETURN: &str = "return=representation";

/// Row access through Supabase's `/rest/v1` endpoint.
///
/// Requests carry the signed-in user's access token when there is one, so
/// row-level security applies as that user; otherwise the anon key.
#[derive(Clone)]
pub struct PostgrestBackend {
    rest_url: String,
    anon_key: String,
    client: Client,
    auth: AuthState,
}

impl PostgrestBackend {
    pub fn new(config: &BackendConfig, auth: AuthState) -> BackendResult<Self> {
        Ok(Self {
            rest_url: config.rest_url(),
            anon_key: config.anon_key().to_string(),
            client: Client::builder().build()?,
            auth,
        })
    }

    fn request(&self, method: Method, table: Table) -> RequestBuilder {
        let token = self
            .auth
            .access_token()
            .unwrap_or_else(|| self.anon_key.clone());
        self.client
            .request(method, format!("{}/{}", self.rest_url, table.name()))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn send_for_rows(&self, request: RequestBuilder) -> BackendResult<Vec<Value>> {
        let response = check_status(request.send().await?).await?;
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|error| BackendError::Decode(error.to_string()))
    }
}

#[async_trait]
impl RemoteBackend for PostgrestBackend {
    async fn select_rows(&self, table: Table, query: &SelectQuery) -> BackendResult<SelectResult> {
        let method = if query.head { Method::HEAD } else { Method::GET };
        let mut request = self
            .request(method, table)
            .query(&[("select", query.select_clause())])
            .query(&filter_params(&query.filters));
        if let Some(order) = &query.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            request = request.query(&[("order", format!("{}.{direction}", order.column))]);
        }
        if let Some(range) = query.range {
            request = request.query(&[("offset", range.offset), ("limit", range.limit)]);
        }
        if query.count {
            request = request.header("Prefer", PREFER_COUNT);
        }

        tracing::debug!("Selecting from {} ({:?})", table.name(), query);
        let response = check_status(request.send().await?).await?;
        let total = if query.count {
            let total = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(parse_content_range);
            if total.is_none() {
                return Err(BackendError::Decode(
                    "missing or malformed Content-Range header".to_string(),
                ));
            }
            total
        } else {
            None
        };

        let rows = if query.head {
            Vec::new()
        } else {
            response
                .json::<Vec<Value>>()
                .await
                .map_err(|error| BackendError::Decode(error.to_string()))?
        };
        Ok(SelectResult { rows, total })
    }

    async fn insert_rows(&self, table: Table, rows: Vec<Value>) -> BackendResult<Vec<Value>> {
        tracing::debug!("Inserting {} row(s) into {}", rows.len(), table.name());
        let request = self
            .request(Method::POST, table)
            .header("Prefer", PREFER_RETURN)
            .json(&rows);
        self.send_for_rows(request).await
    }

    async fn update_rows(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Value,
    ) -> BackendResult<Vec<Value>> {
        tracing::debug!("Updating {} where {:?}", table.name(), filters);
        let request = self
            .request(Method::PATCH, table)
            .query(&filter_params(filters))
            .header("Prefer", PREFER_RETURN)
            .json(&patch);
        self.send_for_rows(request).await
    }

    async fn delete_rows(&self, table: Table, filters: &[Filter]) -> BackendResult<Vec<Value>> {
        tracing::debug!("Deleting from {} where {:?}", table.name(), filters);
        let request = self
            .request(Method::DELETE, table)
            .query(&filter_params(filters))
            .header("Prefer", PREFER_RETURN);
        self.send_for_rows(request).await
    }

    fn principal(&self) -> Option<Principal> {
        self.auth.user().map(|user| Principal {
            id: user.id,
            email: user.email,
        })
    }
}

async fn check_status(response: Response) -> BackendResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Api(parse_api_error(status, &body)))
}

/// Query parameters for a filter list: `col=eq.v` and `col=in.(a,b)`.
fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq(column, value) => (column.clone(), format!("eq.{}", literal(value, false))),
            Filter::In(column, values) => {
                let items = values
                    .iter()
                    .map(|value| literal(value, true))
                    .collect::<Vec<_>>()
                    .join(",");
                (column.clone(), format!("in.({items})"))
            }
        })
        .collect()
}

fn literal(value: &Value, in_list: bool) -> String {
    match value {
        Value::String(text) if in_list => {
            format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
        }
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Total from `Content-Range: 0-19/57` (or `*/57` for an empty page).
fn parse_content_range(header: &HeaderValue) -> Option<usize> {
    let (_, total) = header.to_str().ok()?.rsplit_once('/')?;
    total.trim().parse().ok()
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorResponse {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorResponse>(body) {
        if let Some(message) = payload.message {
            let mut rendered = message.trim().to_string();
            for extra in [payload.details, payload.hint].into_iter().flatten() {
                if !extra.trim().is_empty() {
                    rendered.push_str(" - ");
                    rendered.push_str(extra.trim());
                }
            }
            return format!("{rendered} ({})", status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{trimmed} ({})", status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn encodes_filters_in_postgrest_syntax() {
        let params = filter_params(&[
            Filter::eq("note_id", "abc"),
            Filter::is_in("mastery_level", [1, 2]),
            Filter::eq("is_public", true),
        ]);
        assert_eq!(
            params,
            vec![
                ("note_id".to_string(), "eq.abc".to_string()),
                ("mastery_level".to_string(), "in.(1,2)".to_string()),
                ("is_public".to_string(), "eq.true".to_string()),
            ]
        );
    }

    #[test]
    fn quotes_strings_in_lists() {
        let params = filter_params(&[Filter::In("id".into(), vec![json!("a,b"), json!("c")])]);
        assert_eq!(params[0].1, r#"in.("a,b","c")"#);
    }

    #[test]
    fn reads_total_from_content_range() {
        assert_eq!(
            parse_content_range(&HeaderValue::from_static("0-19/57")),
            Some(57)
        );
        assert_eq!(parse_content_range(&HeaderValue::from_static("*/0")), Some(0));
        assert_eq!(parse_content_range(&HeaderValue::from_static("0-19/*")), None);
    }

    #[test]
    fn api_error_includes_details_and_hint() {
        let body = r#"{"code":"42501","message":"permission denied for table notes","details":null,"hint":"Check policies"}"#;
        assert_eq!(
            parse_api_error(StatusCode::FORBIDDEN, body),
            "permission denied for table notes - Check policies (403)"
        );
        assert_eq!(
            parse_api_error(StatusCode::SERVICE_UNAVAILABLE, "  "),
            "HTTP 503"
        );
    }

    #[test]
    fn principal_follows_auth_state() {
        let config = BackendConfig::new("https://demo.supabase.co", "anon").unwrap();
        let auth = AuthState::signed_out();
        let backend = PostgrestBackend::new(&config, auth.clone()).unwrap();
        assert!(backend.principal().is_none());

        auth.apply(crate::auth::AuthEvent::SignedIn(crate::auth::AuthSession {
            access_token: "token".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: i64::MAX,
            user: crate::auth::AuthUser {
                id: "alice".to_string(),
                email: Some("alice@example.com".to_string()),
            },
        }));
        assert_eq!(backend.principal().unwrap().id, "alice");
    }
}
