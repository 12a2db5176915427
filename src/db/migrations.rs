use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Schema files applied in order; `user_version` tracks how many have run.
const SCHEMAS: &[&str] = &[
    include_str!("schemas/schema_v1.sql"),
    include_str!("schemas/schema_v2.sql"),
];

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;

    let current = SCHEMAS.len() as i32;
    if version > current {
        bail!("database version ({version}) is newer than supported schema ({current})");
    }
    if version == current {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;

    for next_version in (version + 1)..=current {
        tx.execute_batch(SCHEMAS[(next_version - 1) as usize])
            .with_context(|| format!("migration to version {next_version} failed"))?;
    }

    tx.pragma_update(None, "user_version", current)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")?;

    Ok(())
}
