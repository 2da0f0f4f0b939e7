//! Schema steps for the collection tables and the settings table.
//!
//! # Responsibility
//! - Create the `memories`, `todos` and `settings` tables a profile needs.
//! - Confirm every table the steps create is present before the store is used.
//!
//! # Invariants
//! - Step versions increase strictly; the newest applied one is mirrored to
//!   `PRAGMA user_version`.
//! - A failing step rolls back every step of the same open, leaving the
//!   previous version in place.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
    tables: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "collections",
        sql: include_str!("0001_collections.sql"),
        tables: &["memories", "todos"],
    },
    Migration {
        version: 2,
        name: "settings",
        sql: include_str!("0002_settings.sql"),
        tables: &["settings"],
    },
];

/// Returns the latest schema version this binary can open.
pub fn latest_version() -> u32 {
    latest_in(MIGRATIONS)
}

/// Reads the schema version recorded in the store.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Brings the store up to the latest version and checks its tables.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    apply_migration_list(conn, MIGRATIONS)
}

fn latest_in(migrations: &[Migration]) -> u32 {
    migrations.last().map_or(0, |migration| migration.version)
}

fn apply_migration_list(conn: &mut Connection, migrations: &[Migration]) -> DbResult<()> {
    let current_version = schema_version(conn)?;
    let latest = latest_in(migrations);

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version < latest {
        let tx = conn.transaction()?;
        for migration in migrations
            .iter()
            .filter(|migration| migration.version > current_version)
        {
            tx.execute_batch(migration.sql)
                .and_then(|()| {
                    tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
                })
                .map_err(|source| DbError::Migration {
                    version: migration.version,
                    name: migration.name,
                    source,
                })?;
        }
        tx.commit()?;
        info!(
            "event=db_migrate module=db status=ok from_version={current_version} to_version={latest}"
        );
    }

    verify_tables(conn, migrations)
}

fn verify_tables(conn: &Connection, migrations: &[Migration]) -> DbResult<()> {
    let mut statement = conn.prepare(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
    )?;
    for table in migrations
        .iter()
        .flat_map(|migration| migration.tables.iter().copied())
    {
        let exists: bool = statement.query_row([table], |row| row.get(0))?;
        if !exists {
            return Err(DbError::MissingTable { table });
        }
    }
    Ok(())
}
