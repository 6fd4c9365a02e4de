//! Project manifest repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist the flat item snapshot produced by `ProjectTree::pack`.
//! - Load it back in the exact order it was saved.
//!
//! # Invariants
//! - A save replaces the whole snapshot atomically.
//! - Handle text is stored verbatim; validation happens in `unpack`, so a
//!   corrupt manifest still loads and gets repaired by the tree.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::item::{ItemClass, ItemLayout, ItemRecord, ItemType};
use log::{error, info};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Result type used by manifest repository operations.
pub type ManifestRepoResult<T> = Result<T, ManifestRepoError>;

/// Errors from manifest repository operations.
#[derive(Debug)]
pub enum ManifestRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a record.
    InvalidData(String),
}

impl Display for ManifestRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "manifest repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "manifest repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "manifest repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid manifest data: {message}"),
        }
    }
}

impl Error for ManifestRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for ManifestRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ManifestRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for the item snapshot.
pub trait ManifestRepository {
    /// Replaces the stored snapshot with `records`, preserving their order.
    fn save_records(&self, records: &[ItemRecord]) -> ManifestRepoResult<()>;
    /// Loads the stored snapshot in saved order.
    fn load_records(&self) -> ManifestRepoResult<Vec<ItemRecord>>;
    /// Number of stored records.
    fn record_count(&self) -> ManifestRepoResult<usize>;
}

const COLUMNS: [&str; 8] = [
    "position",
    "handle",
    "parent_handle",
    "item_type",
    "item_class",
    "item_layout",
    "name",
    "word_count",
];

/// SQLite-backed manifest repository.
pub struct SqliteManifestRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteManifestRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> ManifestRepoResult<Self> {
        ensure_manifest_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ManifestRepository for SqliteManifestRepository<'_> {
    fn save_records(&self, records: &[ItemRecord]) -> ManifestRepoResult<()> {
        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM project_items;", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO project_items (
                    position,
                    handle,
                    parent_handle,
                    item_type,
                    item_class,
                    item_layout,
                    name,
                    word_count
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            )?;
            for (position, record) in records.iter().enumerate() {
                let word_count = i64::try_from(record.word_count).map_err(|_| {
                    ManifestRepoError::InvalidData(format!(
                        "word count {} out of range for {}",
                        record.word_count, record.handle
                    ))
                })?;
                stmt.execute(params![
                    position as i64,
                    record.handle,
                    record.parent,
                    record.item_type.as_str(),
                    record.class.as_str(),
                    record.layout.as_str(),
                    record.name,
                    word_count,
                ])
                .map_err(|err| {
                    error!(
                        "event=manifest_save module=repo status=error handle={} error={}",
                        record.handle, err
                    );
                    err
                })?;
            }
        }
        tx.commit()?;

        info!(
            "event=manifest_save module=repo status=ok count={} duration_ms={}",
            records.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn load_records(&self) -> ManifestRepoResult<Vec<ItemRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                handle,
                parent_handle,
                item_type,
                item_class,
                item_layout,
                name,
                word_count
             FROM project_items
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }
        info!(
            "event=manifest_load module=repo status=ok count={}",
            records.len()
        );
        Ok(records)
    }

    fn record_count(&self) -> ManifestRepoResult<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM project_items;", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn parse_record_row(row: &Row<'_>) -> ManifestRepoResult<ItemRecord> {
    let handle: String = row.get("handle")?;

    let type_text: String = row.get("item_type")?;
    let item_type = ItemType::parse(&type_text).ok_or_else(|| {
        ManifestRepoError::InvalidData(format!(
            "invalid item type `{type_text}` in project_items.item_type"
        ))
    })?;
    let class_text: String = row.get("item_class")?;
    let class = ItemClass::parse(&class_text).ok_or_else(|| {
        ManifestRepoError::InvalidData(format!(
            "invalid item class `{class_text}` in project_items.item_class"
        ))
    })?;
    let layout_text: String = row.get("item_layout")?;
    let layout = ItemLayout::parse(&layout_text).ok_or_else(|| {
        ManifestRepoError::InvalidData(format!(
            "invalid item layout `{layout_text}` in project_items.item_layout"
        ))
    })?;

    let word_count: i64 = row.get("word_count")?;
    let word_count = u64::try_from(word_count).map_err(|_| {
        ManifestRepoError::InvalidData(format!(
            "invalid word count `{word_count}` in project_items.word_count"
        ))
    })?;

    Ok(ItemRecord {
        handle,
        parent: row.get("parent_handle")?,
        item_type,
        class,
        layout,
        name: row.get("name")?,
        word_count,
    })
}

fn ensure_manifest_connection_ready(conn: &Connection) -> ManifestRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(ManifestRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "project_items")? {
        return Err(ManifestRepoError::MissingRequiredTable("project_items"));
    }

    for column in COLUMNS {
        if !table_has_column(conn, "project_items", column)? {
            return Err(ManifestRepoError::MissingRequiredColumn {
                table: "project_items",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> ManifestRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> ManifestRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
