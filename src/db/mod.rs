#[macro_use]
pub mod macros;
pub mod migrations;
pub mod models;
pub mod repos;

use std::path::Path;
use std::time::Duration;

use r2d2::{CustomizeConnection, Pool};
use r2d2_sqlite::SqliteConnectionManager;

use crate::error::AppError;

pub type DbPool = Pool<SqliteConnectionManager>;

const DB_FILE_NAME: &str = "billcycle.db";
const POOL_SIZE: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Applied to every pooled connection. The scheduler and the commands write
/// from different threads, so writers wait on the lock instead of failing.
#[derive(Debug)]
struct BillDbPragmas;

impl CustomizeConnection<rusqlite::Connection, rusqlite::Error> for BillDbPragmas {
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA synchronous = NORMAL;")
    }
}

fn open_pool(path: &Path, max_size: u32) -> Result<DbPool, AppError> {
    let pool = Pool::builder()
        .max_size(max_size)
        .connection_timeout(Duration::from_secs(5))
        .connection_customizer(Box::new(BillDbPragmas))
        .build(SqliteConnectionManager::file(path))?;

    let conn = pool.get()?;
    migrations::run(&conn)?;
    Ok(pool)
}

/// Open `billcycle.db` under `data_dir` in WAL mode with the schema applied.
pub fn init_db(data_dir: &Path) -> Result<DbPool, AppError> {
    std::fs::create_dir_all(data_dir)?;
    let path = data_dir.join(DB_FILE_NAME);

    let pool = open_pool(&path, POOL_SIZE)?;
    let mode: String = pool
        .get()?
        .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;

    tracing::info!(path = %path.display(), journal_mode = %mode, "Bill database ready");
    Ok(pool)
}

/// A throwaway database file per test; in-memory databases are per
/// connection and would not be shared across the pool.
#[cfg(test)]
pub fn init_test_db() -> Result<DbPool, AppError> {
    let path = std::env::temp_dir().join(format!("billcycle_test_{}.db", uuid::Uuid::new_v4()));
    open_pool(&path, 2)
}
