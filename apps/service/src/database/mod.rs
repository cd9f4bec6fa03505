/// Persistence for users, targets and check history on libsql
pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::LibsqlRepository;

use anyhow::Result;

use crate::pool::LibsqlPool;

/// Initialize database with schema
pub async fn initialize_database(pool: &LibsqlPool) -> Result<()> {
    let conn = pool.get().await.map_err(|e| anyhow::anyhow!("Failed to get database connection: {}", e))?;
    migrations::run_migrations(&conn).await
}

/// Helper to create a migrated database in a temporary directory
#[cfg(test)]
pub(crate) async fn create_test_database() -> Result<(LibsqlPool, tempfile::TempDir)> {
    let temp_dir = tempfile::tempdir()?;
    let db_path = temp_dir.path().join("test.db");

    let pool = crate::pool::open_local(&db_path).await?;
    initialize_database(&pool).await?;

    Ok((pool, temp_dir))
}
