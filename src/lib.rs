//! # Avitolog - comment on Avito listings from the terminal
//!
//! Avitolog is a terminal client for the Avitolog backend: paste an Avito link to import a
//! listing, browse the most viewed listings and discuss them in comment threads.
//!
//! ## Architecture
//!
//! The client follows the Elm Architecture on top of [ratatui](https://ratatui.rs/):
//!
//! 1. **Model**: the [`App`](app::App) and its current page
//! 2. **Message**: key presses, query results and finished mutations
//! 3. **Update**: applies a message and may return a [`Command`](command::Command)
//! 4. **View**: renders the model every frame
//! 5. **Subscriptions**: terminal input, session expiry and the page's queries
//!
//! Server state lives outside the model, in a [`QueryClient`](query::QueryClient): a
//! keyed cache that de-duplicates fetches, refetches invalidated data that is on screen
//! and drops what nobody observes. Writes go through a [`Mutation`](mutation::Mutation),
//! whose hooks invalidate the affected keys.
//!
//! ## Core Components
//!
//! - [`Application`](application::Application) and [`Runtime`](runtime::Runtime): the event loop
//! - [`query`]: cache keys, entries, the store and query subscriptions
//! - [`mutation`]: write operations with observable state
//! - [`api`]: the backend's endpoints, its types and the persisted session
//! - [`app`]: pages, navigation and authorization gating
//!
//! ## Example
//!
//! ```rust,no_run
//! use avitolog::{api::keys, query::QueryClient};
//!
//! let queries = QueryClient::new();
//!
//! // After posting a comment, refetch the thread of listing 42.
//! queries.invalidate_queries(&keys::comments(42).into());
//! ```

pub mod api;
pub mod app;
pub mod application;
pub mod command;
pub mod config;
pub mod error;
pub mod mutation;
pub mod prelude;
pub mod query;
pub mod runtime;
pub mod subscription;

pub use error::ApiError;
