//! An in-memory backend for page tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::ApiError;

use super::AvitologApi;
use super::session::SessionStore;
use super::types::{AuthToken, Comment, Credentials, Listing, Me, RegisterForm};

pub const TOKEN: &str = "abc";
pub const PASSWORD: &str = "secret123";

#[derive(Default)]
pub struct Calls {
    pub me: AtomicUsize,
    pub top_listings: AtomicUsize,
    pub listing: AtomicUsize,
    pub comments: AtomicUsize,
    pub add_comment: AtomicUsize,
    pub delete_comment: AtomicUsize,
    pub ingest: AtomicUsize,
    pub login: AtomicUsize,
}

/// Behaves like the real backend for one user account.
pub struct FakeApi {
    session: SessionStore,
    user: Me,
    listings: Mutex<Vec<Listing>>,
    comments: Mutex<BTreeMap<u64, Vec<Comment>>>,
    next_id: AtomicU64,
    me_fails: bool,
    pub calls: Calls,
}

pub fn listing(id: u64, title: &str) -> Listing {
    Listing {
        id,
        url: format!("https://www.avito.ru/{id}"),
        title: title.to_string(),
        price: Some("1500.00".to_string()),
        description: String::new(),
        image_url: None,
        published_at: Some("2024-03-12T14:05:00+03:00".to_string()),
        views_count: 0,
    }
}

pub fn comment(id: u64, user_id: u64, text: &str) -> Comment {
    Comment {
        id,
        text: text.to_string(),
        user_id,
        user_username: format!("user{user_id}"),
        created_at: "2024-03-12T14:05:00+03:00".to_string(),
    }
}

pub fn user(id: u64) -> Me {
    Me {
        id,
        username: format!("user{id}"),
        is_staff: false,
        is_superuser: false,
        is_blocked: false,
    }
}

impl FakeApi {
    pub fn new(session: SessionStore) -> Self {
        Self {
            session,
            user: user(1),
            listings: Mutex::new(Vec::new()),
            comments: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1000),
            me_fails: false,
            calls: Calls::default(),
        }
    }

    pub fn with_user(mut self, user: Me) -> Self {
        self.user = user;
        self
    }

    pub fn with_listing(self, listing: Listing) -> Self {
        self.listings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listing);
        self
    }

    pub fn with_comment(self, listing_id: u64, comment: Comment) -> Self {
        self.comments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(listing_id)
            .or_default()
            .push(comment);
        self
    }

    /// `GET /api/auth/me` answers 500.
    pub fn with_failing_me(mut self) -> Self {
        self.me_fails = true;
        self
    }

    /// Any request carrying an unknown token is refused, public endpoints included, and
    /// the session expires the way the HTTP adapter expires it.
    fn known_token(&self) -> Result<(), ApiError> {
        match self.session.token() {
            Some(token) if token != TOKEN => {
                self.session.expire(&token);
                Err(unauthorized())
            }
            _ => Ok(()),
        }
    }

    fn authorized(&self) -> Result<(), ApiError> {
        self.known_token()?;
        if self.session.has_token() {
            Ok(())
        } else {
            Err(unauthorized())
        }
    }

    fn token(&self) -> AuthToken {
        AuthToken {
            id: self.user.id,
            username: self.user.username.clone(),
            token: TOKEN.to_string(),
        }
    }
}

fn unauthorized() -> ApiError {
    ApiError::Http {
        status: 401,
        body: None,
    }
}

fn not_found() -> ApiError {
    ApiError::Http {
        status: 404,
        body: Some(r#"{"detail":"Not found"}"#.to_string()),
    }
}

#[async_trait]
impl AvitologApi for FakeApi {
    async fn register(&self, form: &RegisterForm) -> Result<AuthToken, ApiError> {
        self.known_token()?;
        if form.password.len() < 8 {
            return Err(ApiError::Http {
                status: 400,
                body: None,
            });
        }
        Ok(self.token())
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthToken, ApiError> {
        self.calls.login.fetch_add(1, Ordering::SeqCst);
        self.known_token()?;
        if credentials.username == self.user.username && credentials.password == PASSWORD {
            Ok(self.token())
        } else {
            Err(ApiError::Http {
                status: 401,
                body: Some(r#"{"detail":"Invalid username or password"}"#.to_string()),
            })
        }
    }

    async fn me(&self) -> Result<Me, ApiError> {
        self.calls.me.fetch_add(1, Ordering::SeqCst);
        self.authorized()?;
        if self.me_fails {
            return Err(ApiError::Http {
                status: 500,
                body: None,
            });
        }
        Ok(self.user.clone())
    }

    async fn top_listings(&self, limit: u32) -> Result<Vec<Listing>, ApiError> {
        self.calls.top_listings.fetch_add(1, Ordering::SeqCst);
        self.known_token()?;
        let listings = self.listings.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(listings.iter().take(limit as usize).cloned().collect())
    }

    async fn listing(&self, id: u64) -> Result<Listing, ApiError> {
        self.calls.listing.fetch_add(1, Ordering::SeqCst);
        self.known_token()?;
        self.listings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|listing| listing.id == id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn ingest_by_url(&self, url: &str) -> Result<Listing, ApiError> {
        self.calls.ingest.fetch_add(1, Ordering::SeqCst);
        self.known_token()?;
        if !url.contains("avito.ru") {
            return Err(ApiError::Http {
                status: 400,
                body: Some(r#"{"detail":"Not an Avito URL"}"#.to_string()),
            });
        }
        let mut listings = self.listings.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = listings.iter().find(|listing| listing.url == url) {
            return Ok(existing.clone());
        }
        let mut created = listing(42, "Импортированное объявление");
        created.url = url.to_string();
        listings.push(created.clone());
        Ok(created)
    }

    async fn comments(&self, listing_id: u64) -> Result<Vec<Comment>, ApiError> {
        self.calls.comments.fetch_add(1, Ordering::SeqCst);
        self.known_token()?;
        let comments = self.comments.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(comments.get(&listing_id).cloned().unwrap_or_default())
    }

    async fn add_comment(&self, listing_id: u64, text: &str) -> Result<Comment, ApiError> {
        self.calls.add_comment.fetch_add(1, Ordering::SeqCst);
        self.authorized()?;
        if self.user.is_blocked {
            return Err(ApiError::Http {
                status: 403,
                body: Some(r#"{"detail":"User is blocked"}"#.to_string()),
            });
        }
        let comment = Comment {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            text: text.to_string(),
            user_id: self.user.id,
            user_username: self.user.username.clone(),
            created_at: "2024-03-12T15:00:00+03:00".to_string(),
        };
        self.comments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(listing_id)
            .or_default()
            .insert(0, comment.clone());
        Ok(comment)
    }

    async fn delete_comment(&self, comment_id: u64) -> Result<(), ApiError> {
        self.calls.delete_comment.fetch_add(1, Ordering::SeqCst);
        self.authorized()?;
        let mut comments = self.comments.lock().unwrap_or_else(PoisonError::into_inner);
        for thread in comments.values_mut() {
            if let Some(index) = thread.iter().position(|c| c.id == comment_id) {
                let owner = thread[index].user_id;
                if owner != self.user.id && !self.user.is_staff {
                    return Err(ApiError::Http {
                        status: 403,
                        body: None,
                    });
                }
                thread.remove(index);
                return Ok(());
            }
        }
        Err(not_found())
    }
}
