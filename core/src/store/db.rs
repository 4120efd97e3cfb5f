//! SQLite connection pool and embedded migrations

use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::{Error, Result};

/// All diesel migrations, embedded at compile time
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Type alias for the SQLite connection pool
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Initialize the connection pool and apply pending migrations.
///
/// Must be called once at startup; `database_url` may be `:memory:` for
/// tests.
pub fn init_db_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);

    let pool = Pool::builder()
        .build(manager)
        .map_err(|e| Error::Storage(format!("failed to create database pool: {}", e)))?;

    run_migrations(&pool)?;

    Ok(pool)
}

fn run_migrations(pool: &DbPool) -> Result<()> {
    let mut conn = pool
        .get()
        .map_err(|e| Error::Storage(e.to_string()))?;

    tracing::info!("running database migrations");
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::Storage(format!("migration failed: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_pool_migrates() {
        let pool = init_db_pool(":memory:").unwrap();
        assert!(pool.get().is_ok());
    }
}
