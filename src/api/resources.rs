use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::error::ApiError;

use super::AvitologApi;
use super::http::HttpClient;
use super::session::SessionStore;
use super::types::{AuthToken, Comment, Credentials, Listing, Me, RegisterForm};

#[derive(Serialize)]
struct IngestRequest<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct NewComment<'a> {
    text: &'a str,
}

/// The backend reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpApi {
    http: HttpClient,
}

impl HttpApi {
    #[must_use]
    pub fn new(base_url: impl Into<String>, session: SessionStore) -> Self {
        Self::with_http(HttpClient::new(base_url, session))
    }

    #[must_use]
    pub const fn with_http(http: HttpClient) -> Self {
        Self { http }
    }

    #[must_use]
    pub const fn http(&self) -> &HttpClient {
        &self.http
    }
}

#[async_trait]
impl AvitologApi for HttpApi {
    async fn register(&self, form: &RegisterForm) -> Result<AuthToken, ApiError> {
        let token: AuthToken = self.http.post("/api/auth/register", form).await?;
        info!(user_id = token.id, username = %token.username, "registered");
        Ok(token)
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthToken, ApiError> {
        let token: AuthToken = self.http.post("/api/auth/login", credentials).await?;
        info!(user_id = token.id, username = %token.username, "signed in");
        Ok(token)
    }

    async fn me(&self) -> Result<Me, ApiError> {
        self.http.get("/api/auth/me").await
    }

    async fn top_listings(&self, limit: u32) -> Result<Vec<Listing>, ApiError> {
        self.http
            .get_with_query("/api/listings/", &[("limit", limit)])
            .await
    }

    async fn listing(&self, id: u64) -> Result<Listing, ApiError> {
        self.http.get(&format!("/api/listings/{id}/")).await
    }

    async fn ingest_by_url(&self, url: &str) -> Result<Listing, ApiError> {
        let listing: Listing = self
            .http
            .post("/api/listings/ingest-url/", &IngestRequest { url })
            .await?;
        info!(listing_id = listing.id, "ingested {url}");
        Ok(listing)
    }

    async fn comments(&self, listing_id: u64) -> Result<Vec<Comment>, ApiError> {
        self.http
            .get(&format!("/api/listings/{listing_id}/comments/"))
            .await
    }

    async fn add_comment(&self, listing_id: u64, text: &str) -> Result<Comment, ApiError> {
        self.http
            .post(
                &format!("/api/listings/{listing_id}/comments/"),
                &NewComment { text },
            )
            .await
    }

    async fn delete_comment(&self, comment_id: u64) -> Result<(), ApiError> {
        self.http
            .delete(&format!("/api/comments/{comment_id}/"))
            .await
    }
}
