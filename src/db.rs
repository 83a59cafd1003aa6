use std::fs;
use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDate};
use log::{debug, info};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use crate::error::{RadarError, Result};
use crate::models::{LedgerEntry, Record};

const SCHEMA_SQL: &str = include_str!("../schema.sql");

/// Columns that older releases stored on `items` and that are no longer kept.
const OBSOLETE_COLUMNS: &[&str] = &["source"];

const LAST_RUN_AT: &str = "last_run_at";

/// Where the ledger rows live and which column holds the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    table: &'static str,
    category: &'static str,
}

const CURRENT: Layout = Layout {
    table: "items",
    category: "last_category",
};

/// Earlier releases kept the rows in `dramas`, with the category in `last_info`.
const LEGACY: Layout = Layout {
    table: "dramas",
    category: "last_info",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    /// Never creates or modifies the file. Used for dry runs.
    ReadOnly,
}

/// The set of every show seen so far, keyed by name.
pub struct Ledger {
    conn: Connection,
    access: Access,
    /// `None` when a read-only file holds no ledger table at all.
    layout: Option<Layout>,
}

impl Ledger {
    /// Open (creating if needed) the ledger at `path` and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| unreadable(path, e))?;
        }
        let conn = Connection::open(path).map_err(|e| unreadable(path, e))?;
        Self::init(conn).map_err(|e| match e {
            RadarError::Store(e) => unreadable(path, e),
            other => other,
        })
    }

    /// Open an existing ledger without ever writing to it.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| unreadable(path, e))?;
        // Touch the file header now so a corrupt file fails at open time.
        conn.query_row("SELECT COUNT(1) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .map_err(|e| unreadable(path, e))?;

        // No migration here, so a file left by an earlier release is read in place.
        let layout = if table_exists(&conn, CURRENT.table).map_err(|e| unreadable(path, e))? {
            Some(CURRENT)
        } else if table_exists(&conn, LEGACY.table).map_err(|e| unreadable(path, e))? {
            Some(LEGACY)
        } else {
            None
        };
        debug!("Read-only ledger layout: {layout:?}");

        Ok(Ledger {
            conn,
            access: Access::ReadOnly,
            layout,
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        migrate_legacy_table(&mut conn)?;
        drop_obsolete_columns(&mut conn)?;
        Ok(Ledger {
            conn,
            access: Access::ReadWrite,
            layout: Some(CURRENT),
        })
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.entry_count()? == 0)
    }

    pub fn entry_count(&self) -> Result<u64> {
        let Some(layout) = self.layout else {
            return Ok(0);
        };
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(1) FROM {}", layout.table), [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Record the first observation of every show. Existing entries are left alone.
    pub fn insert_baseline(&mut self, records: &[Record], as_of: &DateTime<FixedOffset>) -> Result<()> {
        self.ensure_writable()?;
        let day = as_of.date_naive();

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO items (name, first_seen, last_seen, last_category)
                 VALUES (?1, ?2, ?2, ?3)",
            )?;
            for record in records {
                stmt.execute(params![record.name, day, record.category])?;
            }
        }
        set_last_run_at(&tx, as_of)?;
        tx.commit()?;

        info!("Baseline written with {} entries", records.len());
        Ok(())
    }

    /// Records whose name has never been seen, in input order.
    pub fn find_new(&self, records: &[Record]) -> Result<Vec<Record>> {
        let Some(layout) = self.layout else {
            return Ok(records.to_vec());
        };

        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT 1 FROM {} WHERE name = ?1 LIMIT 1", layout.table))?;

        let mut fresh = Vec::new();
        for record in records {
            if !stmt.exists(params![record.name])? {
                fresh.push(record.clone());
            }
        }
        Ok(fresh)
    }

    /// Insert unseen shows and refresh `last_seen` for known ones, all or nothing.
    pub fn upsert(&mut self, records: &[Record], as_of: &DateTime<FixedOffset>) -> Result<()> {
        self.ensure_writable()?;
        let day = as_of.date_naive();

        let tx = self.conn.transaction()?;
        {
            // An empty category never replaces a known one.
            let mut stmt = tx.prepare(
                "INSERT INTO items (name, first_seen, last_seen, last_category)
                 VALUES (?1, ?2, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET
                   last_seen = excluded.last_seen,
                   last_category = CASE
                     WHEN excluded.last_category != '' THEN excluded.last_category
                     ELSE items.last_category
                   END",
            )?;
            for record in records {
                stmt.execute(params![record.name, day, record.category])?;
            }
        }
        set_last_run_at(&tx, as_of)?;
        tx.commit()?;

        debug!("Upserted {} entries", records.len());
        Ok(())
    }

    pub fn entry(&self, name: &str) -> Result<Option<LedgerEntry>> {
        let Some(layout) = self.layout else {
            return Ok(None);
        };
        let entry = self
            .conn
            .query_row(
                &format!(
                    "SELECT name, first_seen, last_seen, {} FROM {} WHERE name = ?1",
                    layout.category, layout.table
                ),
                params![name],
                |row| {
                    Ok(LedgerEntry {
                        name: row.get(0)?,
                        first_seen: row.get::<_, NaiveDate>(1)?,
                        last_seen: row.get::<_, NaiveDate>(2)?,
                        last_category: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    pub fn last_run_at(&self) -> Result<Option<String>> {
        if !table_exists(&self.conn, "meta")? {
            return Ok(None);
        }
        let value = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![LAST_RUN_AT],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn ensure_writable(&self) -> Result<()> {
        match self.access {
            Access::ReadWrite => Ok(()),
            Access::ReadOnly => Err(RadarError::ReadOnlyStore),
        }
    }
}

// A read-only ledger may predate the schema (an empty file, say).
fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    stmt.exists(params![table])
}

fn set_last_run_at(conn: &Connection, as_of: &DateTime<FixedOffset>) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
        params![LAST_RUN_AT, as_of.to_rfc3339()],
    )?;
    Ok(())
}

/// Move the rows of a legacy `dramas` table into `items` and drop it. Only the
/// columns still stored are copied, so a legacy `source` column is left behind.
/// Entries already in `items` win. No-op once `dramas` is gone.
fn migrate_legacy_table(conn: &mut Connection) -> Result<()> {
    if !table_exists(conn, LEGACY.table)? {
        return Ok(());
    }

    let tx = conn.transaction()?;
    let moved = tx.execute(
        "INSERT OR IGNORE INTO items (name, first_seen, last_seen, last_category)
             SELECT name, first_seen, last_seen, last_info FROM dramas",
        [],
    )?;
    tx.execute_batch("DROP TABLE dramas;")?;
    tx.commit()?;

    info!("Migrating ledger: moved {moved} entries from dramas into items");
    Ok(())
}

/// Rebuild `items` without columns that are no longer stored. No-op when the
/// table is already current.
fn drop_obsolete_columns(conn: &mut Connection) -> Result<()> {
    let columns: Vec<String> = {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('items')")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        names
    };

    if !columns.iter().any(|c| OBSOLETE_COLUMNS.contains(&c.as_str())) {
        return Ok(());
    }

    info!("Migrating ledger: dropping obsolete columns from items");
    let tx = conn.transaction()?;
    tx.execute_batch(
        "DROP TABLE IF EXISTS items_new;
         CREATE TABLE items_new (
             name          TEXT PRIMARY KEY,
             first_seen    TEXT NOT NULL,
             last_seen     TEXT NOT NULL,
             last_category TEXT NOT NULL
         );
         INSERT OR REPLACE INTO items_new (name, first_seen, last_seen, last_category)
             SELECT name, first_seen, last_seen, last_category FROM items;
         DROP TABLE items;
         ALTER TABLE items_new RENAME TO items;",
    )?;
    tx.commit()?;
    Ok(())
}

fn unreadable(path: &Path, err: impl std::fmt::Display) -> RadarError {
    RadarError::StoreCorruptOrUnreadable {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
