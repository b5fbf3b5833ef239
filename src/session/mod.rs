//! Session state: durable token storage and navigation guards.

pub mod gate;
mod storage;
mod token_store;

pub use gate::Route;
pub use storage::SqliteStorage;
pub use token_store::TokenStore;
