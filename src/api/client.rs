use log::{debug, warn};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::config::Settings;
use crate::error::{LabkitError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RESPONSE_PREVIEW_LEN: usize = 200;

pub(crate) const PAGE_SIZE: usize = 100;

/// Hard ceiling for pagination loops. An upstream that keeps returning full
/// pages (broken total counts) must not spin forever.
const MAX_PAGES: usize = 1000;

/// HTTP client for a GitLab instance, covering the REST v4 API and the
/// GraphQL endpoint. Holds the immutable connection settings; one instance
/// is shared by every resource fetcher.
pub struct GitLabClient {
    http: reqwest::Client,
    api_url: Url,
    graphql_url: Url,
    token: Option<String>,
}

impl GitLabClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("labkit/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LabkitError::Config(format!("Failed to create HTTP client: {e}")))?;

        let base = Url::parse(&format!("{}/", settings.base_url))
            .map_err(|e| LabkitError::Config(format!("Invalid base URL: {e}")))?;

        let api_url = base
            .join("api/v4/")
            .map_err(|e| LabkitError::Config(format!("Invalid API base URL: {e}")))?;

        let graphql_url = base
            .join("api/graphql")
            .map_err(|e| LabkitError::Config(format!("Invalid GraphQL URL: {e}")))?;

        Ok(Self {
            http,
            api_url,
            graphql_url,
            token: settings.token.clone(),
        })
    }

    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token)
        } else {
            request
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        self.api_url
            .join(endpoint)
            .map_err(|e| LabkitError::Config(format!("Invalid endpoint '{endpoint}': {e}")))
    }

    /// Issue a single REST request. GET params travel as a query string,
    /// POST/PUT params as a JSON body; DELETE carries no body.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = self.endpoint_url(endpoint)?;
        debug!("{method} {url}");
        if !query.is_empty() {
            debug!("Query params: {query:?}");
        }
        if let Some(body) = body {
            debug!("Body: {}", preview(&body.to_string()));
        }

        let mut request = self.http.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = self.auth_request(request).send().await?;
        self.read_json(response).await
    }

    pub async fn get(&self, endpoint: &str, query: &[(String, String)]) -> Result<Value> {
        self.request(Method::GET, endpoint, query, None).await
    }

    /// GET variant that converts HTTP 404 into `Ok(None)`, so a missing
    /// resource renders as "not found" instead of an error.
    pub async fn get_optional(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<Option<Value>> {
        match self.get(endpoint, query).await {
            Ok(value) => Ok(Some(value)),
            Err(LabkitError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn post(&self, endpoint: &str, body: Option<&Value>) -> Result<Value> {
        self.request(Method::POST, endpoint, &[], body).await
    }

    pub async fn put(&self, endpoint: &str, body: Option<&Value>) -> Result<Value> {
        self.request(Method::PUT, endpoint, &[], body).await
    }

    async fn read_json(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(LabkitError::Api {
                status: status.as_u16(),
                message: extract_error_message(&text, status),
            });
        }

        let value: Value = serde_json::from_str(&text)?;
        debug!("Response: {}", preview(&value.to_string()));
        Ok(value)
    }

    /// Post a single query+variables document to the GraphQL endpoint.
    ///
    /// GraphQL reports partial failure inside an HTTP 200, so the body's
    /// top-level `errors` array is inspected even on success.
    pub async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let payload = serde_json::json!({ "query": query, "variables": variables });
        debug!("GraphQL POST {}", self.graphql_url);
        debug!("Query: {}", preview(query));

        let request = self.auth_request(self.http.post(self.graphql_url.clone()).json(&payload));
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await?;
            return Err(LabkitError::Api {
                status: status.as_u16(),
                message: extract_error_message(&text, status),
            });
        }

        let body: GraphQlResponse = response.json().await?;

        if let Some(errors) = body.errors {
            if !errors.is_empty() {
                return Err(LabkitError::GraphQl {
                    errors: errors
                        .into_iter()
                        .map(|e| e.message)
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }

        let data = body.data.ok_or_else(|| LabkitError::GraphQl {
            errors: "response contained no data".to_string(),
        })?;
        debug!("GraphQL response: {}", preview(&data.to_string()));
        Ok(data)
    }

    /// Fetch every page of a REST collection, in upstream order.
    ///
    /// A non-list response stops the loop; use [`Self::paginate_optional`]
    /// when that case must be distinguishable from an empty collection.
    pub async fn paginate(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        limit: Option<usize>,
    ) -> Result<Vec<Value>> {
        Ok(self
            .paginate_optional(endpoint, params, limit)
            .await?
            .unwrap_or_default())
    }

    /// Like [`Self::paginate`], but returns `None` when the first response
    /// is not a list (endpoint absent or of an unexpected shape) so callers
    /// can tell "no such collection" apart from "zero results".
    pub async fn paginate_optional(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        limit: Option<usize>,
    ) -> Result<Option<Vec<Value>>> {
        let mut per_page = PAGE_SIZE;
        if let Some(limit) = limit {
            // Shrink the first request when the caller wants less than a page.
            per_page = per_page.min(limit.max(1));
        }

        let mut items: Vec<Value> = Vec::new();
        let mut page = 1usize;

        loop {
            let mut query: Vec<(String, String)> = params.to_vec();
            query.push(("per_page".to_string(), per_page.to_string()));
            query.push(("page".to_string(), page.to_string()));

            let result = self.get(endpoint, &query).await?;

            let Some(batch) = result.as_array() else {
                if page == 1 {
                    return Ok(None);
                }
                break;
            };

            let batch_len = batch.len();
            items.extend(batch.iter().cloned());

            if let Some(limit) = limit {
                if items.len() >= limit {
                    items.truncate(limit);
                    break;
                }
            }

            // A short page signals the last page.
            if batch_len < per_page {
                break;
            }

            page += 1;
            if page > MAX_PAGES {
                warn!(
                    "Pagination of '{endpoint}' hit the {MAX_PAGES}-page ceiling; \
                     returning the {} items fetched so far",
                    items.len()
                );
                break;
            }
        }

        Ok(Some(items))
    }
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    errors: Option<Vec<GraphQlMessage>>,
}

#[derive(Deserialize)]
struct GraphQlMessage {
    message: String,
}

/// Percent-encode a project or group path for use in a REST endpoint
/// (`group/project` -> `group%2Fproject`).
pub(crate) fn encode_path(path: &str) -> String {
    urlencoding::encode(path).into_owned()
}

fn preview(text: &str) -> String {
    if text.chars().count() <= RESPONSE_PREVIEW_LEN {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(RESPONSE_PREVIEW_LEN).collect();
        format!("{truncated}...")
    }
}

/// Extract a human-readable message from a platform error envelope:
/// `{"message": "..."}`, `{"message": {"base": [...]}}`, or `{"error": "..."}`.
/// An unparseable body becomes the message verbatim.
fn extract_error_message(body: &str, status: StatusCode) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return if body.trim().is_empty() {
            status.to_string()
        } else {
            body.to_string()
        };
    };

    match value.get("message") {
        Some(Value::String(message)) => message.clone(),
        Some(Value::Object(message)) => match message.get("base") {
            Some(Value::Array(parts)) => parts
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" "),
            _ => Value::Object(message.clone()).to_string(),
        },
        _ => match value.get("error") {
            Some(Value::String(error)) => error.clone(),
            _ => value.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn test_settings(base_url: &str) -> Settings {
        Settings {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Some("test-token".to_string()),
            project: None,
            debug: false,
        }
    }

    fn page_body(start: usize, count: usize) -> String {
        let items: Vec<Value> = (start..start + count)
            .map(|n| serde_json::json!({ "id": n }))
            .collect();
        serde_json::to_string(&items).unwrap()
    }

    fn mock_page(
        server: &mut mockito::Server,
        page: usize,
        per_page: usize,
        body: &str,
    ) -> mockito::Mock {
        server
            .mock("GET", "/api/v4/widgets")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), page.to_string()),
                Matcher::UrlEncoded("per_page".into(), per_page.to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
    }

    #[tokio::test]
    async fn paginate_collects_all_pages_in_order() {
        let mut server = mockito::Server::new_async().await;
        let m1 = mock_page(&mut server, 1, 100, &page_body(0, 100)).create_async().await;
        let m2 = mock_page(&mut server, 2, 100, &page_body(100, 100)).create_async().await;
        let m3 = mock_page(&mut server, 3, 100, &page_body(200, 100)).create_async().await;
        let m4 = mock_page(&mut server, 4, 100, &page_body(300, 42)).create_async().await;

        let client = GitLabClient::new(&test_settings(&server.url())).unwrap();
        let items = client.paginate("widgets", &[], None).await.unwrap();

        assert_eq!(items.len(), 342);
        let ids: Vec<u64> = items.iter().map(|v| v["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, (0..342).collect::<Vec<u64>>());

        m1.assert_async().await;
        m2.assert_async().await;
        m3.assert_async().await;
        m4.assert_async().await;
    }

    #[tokio::test]
    async fn paginate_limit_truncates_and_stops_requesting() {
        let mut server = mockito::Server::new_async().await;
        let m1 = mock_page(&mut server, 1, 100, &page_body(0, 100))
            .expect(1)
            .create_async()
            .await;
        let m2 = mock_page(&mut server, 2, 100, &page_body(100, 100))
            .expect(1)
            .create_async()
            .await;
        // No page 3 mock: a third request would fail the test with a 501.

        let client = GitLabClient::new(&test_settings(&server.url())).unwrap();
        let items = client.paginate("widgets", &[], Some(150)).await.unwrap();

        assert_eq!(items.len(), 150);
        assert_eq!(items[149]["id"].as_u64(), Some(149));
        m1.assert_async().await;
        m2.assert_async().await;
    }

    #[tokio::test]
    async fn paginate_small_limit_shrinks_per_page() {
        let mut server = mockito::Server::new_async().await;
        let m = mock_page(&mut server, 1, 25, &page_body(0, 25)).create_async().await;

        let client = GitLabClient::new(&test_settings(&server.url())).unwrap();
        let items = client.paginate("widgets", &[], Some(25)).await.unwrap();

        assert_eq!(items.len(), 25);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn paginate_distinguishes_absent_endpoint_from_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v4/widgets")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .expect(2)
            .create_async()
            .await;

        let client = GitLabClient::new(&test_settings(&server.url())).unwrap();

        let optional = client.paginate_optional("widgets", &[], None).await.unwrap();
        assert!(optional.is_none());

        let plain = client.paginate("widgets", &[], None).await.unwrap();
        assert!(plain.is_empty());
    }

    #[tokio::test]
    async fn paginate_empty_list_is_not_absent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v4/widgets")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let client = GitLabClient::new(&test_settings(&server.url())).unwrap();
        let optional = client.paginate_optional("widgets", &[], None).await.unwrap();
        assert_eq!(optional, Some(Vec::new()));
    }

    #[tokio::test]
    async fn repeated_fetches_return_identical_results() {
        let mut server = mockito::Server::new_async().await;
        mock_page(&mut server, 1, 100, &page_body(0, 3))
            .expect(2)
            .create_async()
            .await;

        let client = GitLabClient::new(&test_settings(&server.url())).unwrap();
        let first = client.paginate("widgets", &[], None).await.unwrap();
        let second = client.paginate("widgets", &[], None).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn api_error_extracts_nested_base_messages() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v4/widgets")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message": {"base": ["ref is missing", "ref is invalid"]}}"#)
            .create_async()
            .await;

        let client = GitLabClient::new(&test_settings(&server.url())).unwrap();
        let err = client.get("widgets", &[]).await.unwrap_err();

        match err {
            LabkitError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "ref is missing ref is invalid");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn api_error_falls_back_to_error_field_and_raw_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v4/a")
            .with_status(401)
            .with_body(r#"{"error": "invalid_token"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/v4/b")
            .with_status(502)
            .with_body("bad gateway upstream")
            .create_async()
            .await;

        let client = GitLabClient::new(&test_settings(&server.url())).unwrap();

        match client.get("a", &[]).await.unwrap_err() {
            LabkitError::Api { message, .. } => assert_eq!(message, "invalid_token"),
            other => panic!("expected Api error, got {other:?}"),
        }
        match client.get("b", &[]).await.unwrap_err() {
            LabkitError::Api { message, .. } => assert_eq!(message, "bad gateway upstream"),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_optional_converts_404_to_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v4/projects/missing")
            .with_status(404)
            .with_body(r#"{"message": "404 Project Not Found"}"#)
            .create_async()
            .await;

        let client = GitLabClient::new(&test_settings(&server.url())).unwrap();
        let result = client.get_optional("projects/missing", &[]).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn graphql_errors_surface_despite_http_200() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/graphql")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data": null, "errors": [{"message": "Field 'foo' doesn't exist"}, {"message": "access denied"}]}"#,
            )
            .create_async()
            .await;

        let client = GitLabClient::new(&test_settings(&server.url())).unwrap();
        let err = client
            .graphql("query { foo }", serde_json::json!({}))
            .await
            .unwrap_err();

        match err {
            LabkitError::GraphQl { errors } => {
                assert_eq!(errors, "Field 'foo' doesn't exist, access denied");
            }
            other => panic!("expected GraphQl error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn graphql_returns_data_on_success() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/graphql")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": {"project": {"id": "gid://gitlab/Project/1"}}}"#)
            .create_async()
            .await;

        let client = GitLabClient::new(&test_settings(&server.url())).unwrap();
        let data = client
            .graphql("query { project { id } }", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(data["project"]["id"].as_str(), Some("gid://gitlab/Project/1"));
    }

    #[test]
    fn encode_path_escapes_slashes() {
        assert_eq!(encode_path("group/project"), "group%2Fproject");
    }
}
