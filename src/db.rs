//! Connection pooling for the `sqlite3` store.
//!
//! Every request checks out its own connection from the pool, wrapped in an [`AttendanceManager`].
//! The connection goes back to the pool when the manager is dropped.

use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::manager::AttendanceManager;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Applied to every connection as it is opened by the pool.
#[derive(Debug)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        // SQLite leaves foreign keys off unless asked, per connection.
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(r2d2::Error::QueryError)
    }
}

#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Opens a pool of at most `pool_size` connections to the `sqlite3` database at
    /// `database_url` and brings its schema up to date.
    pub fn connect(database_url: &str, pool_size: u32) -> AppResult<Self> {
        if pool_size == 0 {
            return Err(AppError::Storage(
                "database pool size must be at least 1".to_string(),
            ));
        }

        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_customizer(Box::new(SqlitePragmas))
            .build(manager)?;

        let database = Self { pool };
        database.run_migrations()?;

        info!("Connected to {database_url}");
        Ok(database)
    }

    fn run_migrations(&self) -> AppResult<()> {
        let mut pooled = self.pool.get()?;
        let conn: &mut SqliteConnection = &mut pooled;

        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| AppError::Storage(format!("migrations failed: {e}")))?;

        for version in applied {
            info!("Applied migration {version}");
        }

        Ok(())
    }

    /// Checks out a connection, blocking until one is free.
    pub fn manager(&self) -> AppResult<AttendanceManager> {
        Ok(AttendanceManager::new(self.pool.get()?))
    }

    /// Runs `f` against a freshly checked-out connection on the blocking thread pool.
    pub async fn run<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut AttendanceManager) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let database = self.clone();

        tokio::task::spawn_blocking(move || {
            let mut manager = database.manager()?;
            f(&mut manager)
        })
        .await?
    }
}
