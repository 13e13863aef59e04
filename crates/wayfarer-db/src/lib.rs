//! PostgreSQL persistence for wayfarer: pool construction, embedded
//! migrations, row models, and per-table query functions.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;

pub use config::DbConfig;
pub use pool::{MIGRATOR, create_pool, create_pool_with_retry, ensure_database_exists, run_migrations};
