//! Database layer for the stdio host
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - kv, secret and settings stores behind the host capability traits

pub mod schema;
pub mod store;

pub use store::SqliteStore;
