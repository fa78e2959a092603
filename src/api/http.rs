//! JSON over HTTP with bearer authentication.

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::ApiError;

use super::session::SessionStore;

/// A thin adapter over [`reqwest::Client`] that speaks the backend's conventions.
///
/// - `Authorization: Bearer <token>` is attached whenever the session holds a token.
/// - Non-2xx responses become [`ApiError::Http`] with the response body, if any.
/// - A 401 on a request that carried a token expires the session.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    session: SessionStore,
}

impl HttpClient {
    /// Creates a client for the backend at `base_url` (e.g. `http://localhost:8000`).
    #[must_use]
    pub fn new(base_url: impl Into<String>, session: SessionStore) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, session)
    }

    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        session: SessionStore,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            session,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub const fn session(&self) -> &SessionStore {
        &self.session
    }

    pub async fn get<T>(&self, path: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let (request, token) = self.request(Method::GET, path);
        decode(self.send(request, token).await?).await
    }

    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let (request, token) = self.request(Method::GET, path);
        decode(self.send(request.query(query), token).await?).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (request, token) = self.request(Method::POST, path);
        decode(self.send(request.json(body), token).await?).await
    }

    /// Sends a DELETE; the response body is ignored.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let (request, token) = self.request(Method::DELETE, path);
        self.send(request, token).await.map(drop)
    }

    /// Builds a request and returns the token it carries, if any.
    fn request(&self, method: Method, path: &str) -> (RequestBuilder, Option<String>) {
        let url = format!("{}{path}", self.base_url);
        debug!(%method, %url, "request");
        let request = self.client.request(method, url);
        match self.session.token() {
            Some(token) => (request.bearer_auth(&token), Some(token)),
            None => (request, None),
        }
    }

    async fn send(
        &self,
        request: RequestBuilder,
        token: Option<String>,
    ) -> Result<Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.ok().filter(|body| !body.is_empty());
        if status == StatusCode::UNAUTHORIZED {
            if let Some(token) = token {
                warn!("token rejected");
                self.session.expire(&token);
            }
        }
        Err(ApiError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{bearer_token, body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u64,
    }

    async fn setup(token: Option<&str>) -> (MockServer, HttpClient) {
        let server = MockServer::start().await;
        let session = SessionStore::in_memory();
        if let Some(token) = token {
            session.set_token(token);
        }
        let client = HttpClient::new(format!("{}/", server.uri()), session);
        (server, client)
    }

    #[tokio::test]
    async fn test_get_attaches_bearer_token() {
        let (server, client) = setup(Some("abc")).await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .and(bearer_token("abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let item: Item = client.get("/api/auth/me").await.expect("request succeeds");
        assert_eq!(item, Item { id: 1 });
    }

    #[tokio::test]
    async fn test_no_authorization_header_without_token() {
        let (server, client) = setup(None).await;
        Mock::given(method("GET"))
            .and(path("/api/listings/"))
            .and(query_param("limit", "20"))
            .and(|req: &Request| !req.headers.contains_key("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}, {"id": 2}])))
            .expect(1)
            .mount(&server)
            .await;

        let items: Vec<Item> = client
            .get_with_query("/api/listings/", &[("limit", 20)])
            .await
            .expect("request succeeds");
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_post_sends_json() {
        let (server, client) = setup(None).await;
        Mock::given(method("POST"))
            .and(path("/api/listings/ingest-url/"))
            .and(body_json(json!({"url": "https://avito.ru/x"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 42})))
            .mount(&server)
            .await;

        let item: Item = client
            .post("/api/listings/ingest-url/", &json!({"url": "https://avito.ru/x"}))
            .await
            .expect("request succeeds");
        assert_eq!(item.id, 42);
    }

    #[tokio::test]
    async fn test_http_error_keeps_status_and_body() {
        let (server, client) = setup(None).await;
        Mock::given(method("GET"))
            .and(path("/api/listings/9/"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Listing not found"})),
            )
            .mount(&server)
            .await;

        let err = client
            .get::<Item>("/api/listings/9/")
            .await
            .expect_err("404 should fail");
        assert!(err.is_not_found());
        assert!(matches!(
            err,
            ApiError::Http { body: Some(ref body), .. } if body.contains("Listing not found")
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_with_token_expires_session() {
        let (server, client) = setup(Some("stale")).await;
        let mut expired = client.session().expired_events();
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client.get::<Item>("/api/auth/me").await.expect_err("401");

        assert!(err.is_unauthorized());
        assert!(!client.session().has_token());
        assert!(expired.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_late_unauthorized_keeps_newer_token() {
        let (server, client) = setup(Some("stale")).await;
        let mut expired = client.session().expired_events();
        Mock::given(method("GET"))
            .and(path("/api/listings/"))
            .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(100)))
            .mount(&server)
            .await;

        let slow = {
            let client = client.clone();
            tokio::spawn(async move { client.get::<Vec<Item>>("/api/listings/").await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        client.session().set_token("fresh");

        let err = slow.await.expect("task").expect_err("401");

        assert!(err.is_unauthorized());
        assert_eq!(client.session().token().as_deref(), Some("fresh"));
        assert!(expired.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unauthorized_without_token_keeps_session_alone() {
        let (server, client) = setup(None).await;
        let mut expired = client.session().expired_events();
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"detail": "Invalid username or password"})),
            )
            .mount(&server)
            .await;

        let err = client
            .post::<_, Item>("/api/auth/login", &json!({"username": "a", "password": "b"}))
            .await
            .expect_err("401");

        assert!(err.is_unauthorized());
        assert!(expired.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode_error() {
        let (server, client) = setup(None).await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client.get::<Item>("/api/auth/me").await.expect_err("bad body");
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_delete_ignores_body() {
        let (server, client) = setup(Some("abc")).await;
        Mock::given(method("DELETE"))
            .and(path("/api/comments/5/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client.delete("/api/comments/5/").await.expect("delete succeeds");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let client = HttpClient::new("http://127.0.0.1:1", SessionStore::in_memory());
        let err = client.get::<Item>("/api/auth/me").await.expect_err("no server");
        assert!(matches!(err, ApiError::Network(_)));
    }
}
