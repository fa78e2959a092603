//! Typed access to the Avitolog backend.
//!
//! Every operation is one HTTP request. Pages never talk to [`HttpApi`] directly: they
//! hold an `Arc<dyn AvitologApi>` so tests can swap in an in-memory backend.

#[cfg(test)]
pub(crate) mod fake;
mod http;
pub mod keys;
mod resources;
mod session;
mod types;

use async_trait::async_trait;

use crate::error::ApiError;

pub use http::HttpClient;
pub use resources::HttpApi;
pub use session::SessionStore;
pub use types::{AuthToken, Comment, Credentials, Listing, Me, RegisterForm};

/// The backend's resources.
#[async_trait]
pub trait AvitologApi: Send + Sync {
    /// `POST /api/auth/register`
    async fn register(&self, form: &RegisterForm) -> Result<AuthToken, ApiError>;

    /// `POST /api/auth/login`
    async fn login(&self, credentials: &Credentials) -> Result<AuthToken, ApiError>;

    /// `GET /api/auth/me`; requires a session.
    async fn me(&self) -> Result<Me, ApiError>;

    /// `GET /api/listings/?limit=N`, most viewed first. The backend caps `limit` at 50.
    async fn top_listings(&self, limit: u32) -> Result<Vec<Listing>, ApiError>;

    /// `GET /api/listings/{id}/`
    async fn listing(&self, id: u64) -> Result<Listing, ApiError>;

    /// `POST /api/listings/ingest-url/`: imports (or refreshes) the listing behind an
    /// Avito URL.
    async fn ingest_by_url(&self, url: &str) -> Result<Listing, ApiError>;

    /// `GET /api/listings/{id}/comments/`
    async fn comments(&self, listing_id: u64) -> Result<Vec<Comment>, ApiError>;

    /// `POST /api/listings/{id}/comments/`; requires a session.
    async fn add_comment(&self, listing_id: u64, text: &str) -> Result<Comment, ApiError>;

    /// `DELETE /api/comments/{id}/`; requires a session.
    async fn delete_comment(&self, comment_id: u64) -> Result<(), ApiError>;
}
