//! Prelude module for convenient imports.
//!
//! ```
//! use avitolog::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`Application`] - The application trait
//! - [`Command`] and [`Action`] - For performing side effects
//! - [`Subscription`] - For handling event sources
//! - [`Runtime`] - The application runtime
//! - [`QueryClient`], [`Query`], [`QueryKey`], [`QueryFilter`] - Cached server state
//! - [`Mutation`] - Write operations
//! - [`ApiError`] - The error every backend call returns

pub use crate::application::Application;
pub use crate::command::{Action, Command};
pub use crate::error::ApiError;
pub use crate::mutation::{MutateOptions, Mutation, MutationState};
pub use crate::query::{Query, QueryClient, QueryFilter, QueryKey, QueryOptions, QueryResult};
pub use crate::runtime::Runtime;
pub use crate::subscription::Subscription;
