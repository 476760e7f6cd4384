//! jfp-db: SQLite persistence for the federation proxy.
//!
//! Pooled connections, embedded migrations, and one query module per entity
//! (`users`, `backends`, `mappings`, `sessions`). No ORM — plain functions
//! taking `&Connection`.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;

pub use models::*;
pub use pool::{get_conn, init_memory_pool, init_pool, DbPool, PooledConnection};
