//! `SQLite` storage for the hush client.
//!
//! Persists keypairs, cached message history and derived session secrets in
//! three namespaces. Every call is its own transaction.

mod db;
mod models;
mod queries;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;

pub use db::{LocalStore, StoreError};
pub use models::*;
