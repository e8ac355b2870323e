//! Embedded schema migrations.

use anyhow::anyhow;
use diesel::{Connection, SqliteConnection, connection::SimpleConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

/// Embedded Diesel migrations bundled with this crate.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Runs pending Diesel migrations on a SQLite database at the given URL.
///
/// Sets the journal mode to WAL first, then applies every embedded migration that
/// has not run yet. Returns the names of the migrations that were applied.
pub fn run_sqlite(url: &str) -> anyhow::Result<Vec<String>> {
    let mut conn = SqliteConnection::establish(url)?;
    conn.batch_execute("PRAGMA journal_mode=WAL;")?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!(e))?
        .into_iter()
        .map(|version| version.to_string())
        .collect::<Vec<_>>();

    info!(database = url, applied = applied.len(), "migrations up to date");
    Ok(applied)
}
