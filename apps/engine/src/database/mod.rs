/// Database abstraction layer
///
/// This module provides a unified interface for database operations
/// over the LibSQL (SQLite) store shared with the CRUD layer.
pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{Database, DatabaseImpl};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
