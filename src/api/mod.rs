//! Client for the to-do REST API.

mod cached_client;
mod client;
mod error;
mod http;
mod keys;
mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use cached_client::{CachedTodoClient, TodoListObserver};
pub use client::TodoClient;
pub use error::ApiError;
pub use http::Navigator;
pub use types::{AuthToken, Credentials, Todo, TodoCreate, TodoUpdate};
