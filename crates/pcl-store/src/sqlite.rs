use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pcl_types::{Block, BlockField, BlockHash, ChainId, Payload, Undecodable};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::LedgerStore;

/// Default bound on how long a call waits for a locked database.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Block store backed by one SQLite table per chain.
///
/// Schema (fund chain shown; the project chain uses `project_chain` and
/// `project_data`):
///
/// ```text
/// fund_chain(
///     id          INTEGER PRIMARY KEY,   -- block index
///     timestamp   INTEGER NOT NULL,      -- epoch millis
///     fund_data   TEXT    NOT NULL,      -- payload JSON
///     prev_hash   TEXT,                  -- hex, NULL for genesis
///     block_hash  TEXT    NOT NULL,      -- hex
///     signature   TEXT    NOT NULL       -- hex
/// )
/// ```
///
/// Both chains may share one connection; they never share a table.
///
/// Rows are decoded leniently. A column edited into something that no
/// longer decodes (non-hex hash, non-object payload, wrong SQL type) is
/// returned verbatim in [`Block::undecodable`] so verification can report
/// it as a break at that position.
pub struct SqliteLedgerStore {
    chain: ChainId,
    conn: Arc<Mutex<Connection>>,
    select_all: String,
    select_last: String,
    insert: String,
}

impl SqliteLedgerStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path, chain: ChainId, busy_timeout: Duration) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(map_sqlite)?;
        conn.busy_timeout(busy_timeout).map_err(map_sqlite)?;
        debug!(chain = %chain, path = %path.display(), "opened sqlite ledger store");
        Self::with_connection(Arc::new(Mutex::new(conn)), chain)
    }

    /// Private in-memory database, for tests and throwaway runs.
    pub fn open_in_memory(chain: ChainId) -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(map_sqlite)?;
        Self::with_connection(Arc::new(Mutex::new(conn)), chain)
    }

    /// Use an existing connection, creating this chain's table if needed.
    pub fn with_connection(conn: Arc<Mutex<Connection>>, chain: ChainId) -> StoreResult<Self> {
        {
            let guard = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            Self::init_schema(&guard, chain).map_err(map_sqlite)?;
        }

        let table = chain.table_name();
        let data = chain.payload_column();
        let columns = format!("id, timestamp, {data}, prev_hash, block_hash, signature");
        Ok(Self {
            chain,
            conn,
            select_all: format!("SELECT {columns} FROM {table} ORDER BY id ASC"),
            select_last: format!("SELECT {columns} FROM {table} ORDER BY id DESC LIMIT 1"),
            insert: format!("INSERT INTO {table} ({columns}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        })
    }

    /// Initializes the table for `chain`.
    pub fn init_schema(conn: &Connection, chain: ChainId) -> rusqlite::Result<()> {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY,
                    timestamp INTEGER NOT NULL,
                    {data} TEXT NOT NULL,
                    prev_hash TEXT,
                    block_hash TEXT NOT NULL,
                    signature TEXT NOT NULL
                )",
                table = chain.table_name(),
                data = chain.payload_column(),
            ),
            [],
        )?;
        Ok(())
    }

    /// The shared connection, e.g. to open the other chain on it.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn decode(&self, row: RawRow) -> Block {
        let mut undecodable = Vec::new();
        let mut mark = |field: BlockField, raw: &SqlValue| {
            undecodable.push(Undecodable {
                field,
                raw: raw_text(raw),
            })
        };

        let index = match u64::try_from(row.id) {
            Ok(index) => index,
            Err(_) => {
                mark(BlockField::Index, &SqlValue::Integer(row.id));
                0
            }
        };
        let timestamp = match row.timestamp {
            SqlValue::Integer(t) => t,
            ref other => {
                mark(BlockField::Timestamp, other);
                0
            }
        };
        let payload = match &row.payload {
            SqlValue::Text(text) => serde_json::from_str::<Payload>(text).ok(),
            _ => None,
        }
        .unwrap_or_else(|| {
            mark(BlockField::Payload, &row.payload);
            Payload::new()
        });
        let prev_hash = match &row.prev_hash {
            SqlValue::Null => None,
            other => {
                let parsed = match other {
                    SqlValue::Text(text) => BlockHash::from_hex(text).ok(),
                    _ => None,
                };
                if parsed.is_none() {
                    mark(BlockField::PrevHash, other);
                }
                parsed
            }
        };
        let block_hash = match &row.block_hash {
            SqlValue::Text(text) => BlockHash::from_hex(text).ok(),
            _ => None,
        }
        .unwrap_or_else(|| {
            mark(BlockField::BlockHash, &row.block_hash);
            BlockHash::from_hash([0; 32])
        });
        let signature = match &row.signature {
            SqlValue::Text(text) => text.clone(),
            other => {
                mark(BlockField::Signature, other);
                String::new()
            }
        };

        if !undecodable.is_empty() {
            warn!(
                chain = %self.chain,
                row = row.id,
                fields = ?undecodable.iter().map(|u| u.field).collect::<Vec<_>>(),
                "stored row does not decode"
            );
        }
        Block {
            index,
            timestamp,
            payload,
            prev_hash,
            block_hash,
            signature,
            undecodable,
        }
    }
}

/// One row exactly as stored, before decoding.
///
/// `id` is the rowid alias and always an integer; every other column is
/// taken with whatever SQL type it currently holds.
struct RawRow {
    id: i64,
    timestamp: SqlValue,
    payload: SqlValue,
    prev_hash: SqlValue,
    block_hash: SqlValue,
    signature: SqlValue,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            payload: row.get(2)?,
            prev_hash: row.get(3)?,
            block_hash: row.get(4)?,
            signature: row.get(5)?,
        })
    }
}

fn raw_text(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Text(text) => text.clone(),
        SqlValue::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

impl LedgerStore for SqliteLedgerStore {
    fn chain(&self) -> ChainId {
        self.chain
    }

    fn append(&self, block: &Block) -> StoreResult<Block> {
        let id = i64::try_from(block.index)
            .map_err(|_| StoreError::Constraint(format!("index {} out of range", block.index)))?;
        let payload = serde_json::to_string(&block.payload)
            .map_err(|e| StoreError::Database(format!("payload serialization: {e}")))?;

        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        conn.execute(
            &self.insert,
            params![
                id,
                block.timestamp,
                payload,
                block.prev_hash.map(|h| h.to_hex()),
                block.block_hash.to_hex(),
                block.signature,
            ],
        )
        .map_err(|e| match e.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => StoreError::DuplicateIndex {
                chain: self.chain,
                index: block.index,
            },
            _ => map_sqlite(e),
        })?;

        debug!(chain = %self.chain, index = block.index, "inserted block row");
        Ok(block.clone())
    }

    fn read_all(&self) -> StoreResult<Vec<Block>> {
        let rows = {
            let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            let mut stmt = conn.prepare_cached(&self.select_all).map_err(map_sqlite)?;
            let rows = stmt
                .query_map([], RawRow::from_row)
                .map_err(map_sqlite)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sqlite)?;
            rows
        };
        Ok(rows.into_iter().map(|row| self.decode(row)).collect())
    }

    fn read_last(&self) -> StoreResult<Option<Block>> {
        let row = {
            let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            conn.query_row(&self.select_last, [], RawRow::from_row)
                .optional()
                .map_err(map_sqlite)?
        };
        Ok(row.map(|r| self.decode(r)))
    }

    fn len(&self) -> StoreResult<u64> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", self.chain.table_name()),
                [],
                |row| row.get(0),
            )
            .map_err(map_sqlite)?;
        Ok(count.max(0) as u64)
    }
}

impl std::fmt::Debug for SqliteLedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLedgerStore")
            .field("chain", &self.chain)
            .field("table", &self.chain.table_name())
            .finish()
    }
}

fn map_sqlite(err: rusqlite::Error) -> StoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen) => {
            StoreError::Unavailable(err.to_string())
        }
        Some(ErrorCode::ConstraintViolation) => StoreError::Constraint(err.to_string()),
        _ => StoreError::Database(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn block(index: u64) -> Block {
        Block {
            index,
            timestamp: 1_700_000_000_000 + index as i64,
            payload: json!({"title": format!("release-{index}"), "amount": index * 100})
                .as_object()
                .cloned()
                .unwrap(),
            prev_hash: index
                .checked_sub(1)
                .map(|p| BlockHash::from_hash([p as u8; 32])),
            block_hash: BlockHash::from_hash([index as u8; 32]),
            signature: "ab".repeat(32),
            undecodable: Vec::new(),
        }
    }

    #[test]
    fn empty_table_reads_empty() {
        let store = SqliteLedgerStore::open_in_memory(ChainId::Fund).unwrap();
        assert!(store.read_all().unwrap().is_empty());
        assert!(store.read_last().unwrap().is_none());
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn blocks_roundtrip_through_table() {
        let store = SqliteLedgerStore::open_in_memory(ChainId::Project).unwrap();
        for i in 0..4 {
            store.append(&block(i)).unwrap();
        }
        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 4);
        for (i, b) in all.iter().enumerate() {
            assert_eq!(b, &block(i as u64));
        }
        assert_eq!(all[0].prev_hash, None);
        assert_eq!(store.read_last().unwrap(), Some(block(3)));
        assert_eq!(store.len().unwrap(), 4);
    }

    #[test]
    fn duplicate_index_is_constraint_violation() {
        let store = SqliteLedgerStore::open_in_memory(ChainId::Fund).unwrap();
        store.append(&block(0)).unwrap();
        let err = store.append(&block(0)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DuplicateIndex {
                chain: ChainId::Fund,
                index: 0
            }
        ));
    }

    #[test]
    fn chains_share_a_file_but_not_a_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");
        let fund = SqliteLedgerStore::open(&path, ChainId::Fund, DEFAULT_BUSY_TIMEOUT).unwrap();
        let project =
            SqliteLedgerStore::with_connection(fund.connection(), ChainId::Project).unwrap();

        fund.append(&block(0)).unwrap();
        fund.append(&block(1)).unwrap();
        project.append(&block(0)).unwrap();

        assert_eq!(fund.len().unwrap(), 2);
        assert_eq!(project.len().unwrap(), 1);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ledger.db");
        {
            let store = SqliteLedgerStore::open(&path, ChainId::Fund, DEFAULT_BUSY_TIMEOUT).unwrap();
            store.append(&block(0)).unwrap();
            store.append(&block(1)).unwrap();
        }
        let reopened = SqliteLedgerStore::open(&path, ChainId::Fund, DEFAULT_BUSY_TIMEOUT).unwrap();
        assert_eq!(reopened.read_all().unwrap(), vec![block(0), block(1)]);
    }

    #[test]
    fn out_of_band_edit_is_read_back_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");
        let store = SqliteLedgerStore::open(&path, ChainId::Fund, DEFAULT_BUSY_TIMEOUT).unwrap();
        store.append(&block(0)).unwrap();

        let other = Connection::open(&path).unwrap();
        other
            .execute(
                "UPDATE fund_chain SET fund_data = ?1 WHERE id = 0",
                params![r#"{"title":"release-0","amount":999999}"#],
            )
            .unwrap();

        let read = store.read_last().unwrap().unwrap();
        assert_eq!(read.payload["amount"], json!(999999));
        assert_eq!(read.block_hash, block(0).block_hash);
    }

    #[test]
    fn undecodable_columns_are_returned_verbatim() {
        let store = SqliteLedgerStore::open_in_memory(ChainId::Fund).unwrap();
        for i in 0..3 {
            store.append(&block(i)).unwrap();
        }
        {
            let conn = store.connection();
            let conn = conn.lock().unwrap();
            conn.execute_batch(
                "UPDATE fund_chain SET fund_data = '[1, 2]', block_hash = 'deadbeef' WHERE id = 1;
                 UPDATE fund_chain SET prev_hash = 'zz', signature = x'6869', timestamp = 'noon' WHERE id = 2;",
            )
            .unwrap();
        }

        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], block(0));

        assert_eq!(all[1].index, 1);
        assert_eq!(
            all[1].undecodable,
            vec![
                Undecodable {
                    field: BlockField::Payload,
                    raw: "[1, 2]".into()
                },
                Undecodable {
                    field: BlockField::BlockHash,
                    raw: "deadbeef".into()
                },
            ]
        );
        assert!(all[1].payload.is_empty());

        let last = store.read_last().unwrap().unwrap();
        assert_eq!(last, all[2]);
        assert!(last.is_undecodable(BlockField::Timestamp));
        assert!(last.is_undecodable(BlockField::PrevHash));
        assert!(last.is_undecodable(BlockField::Signature));
        assert!(!last.is_undecodable(BlockField::Payload));
        assert_eq!(last.payload, block(2).payload);
        let signature = last
            .undecodable
            .iter()
            .find(|u| u.field == BlockField::Signature)
            .unwrap();
        assert_eq!(signature.raw, "hi");
    }

    #[test]
    fn float_payloads_roundtrip_bit_exact() {
        // Shortest repr that the default serde_json float parser misreads.
        let amount = 1.2642728434306497e-48_f64;
        let store = SqliteLedgerStore::open_in_memory(ChainId::Fund).unwrap();
        let mut b = block(0);
        b.payload.insert("amount".into(), json!(amount));
        store.append(&b).unwrap();

        let read = store.read_last().unwrap().unwrap();
        assert_eq!(read.payload["amount"].as_f64().unwrap().to_bits(), amount.to_bits());
        assert_eq!(read, b);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn any_finite_float_survives_the_table(
            amount in any::<f64>().prop_filter("finite", |f| f.is_finite()),
        ) {
            let store = SqliteLedgerStore::open_in_memory(ChainId::Project).unwrap();
            let mut b = block(0);
            b.payload.insert("budget".into(), json!(amount));
            store.append(&b).unwrap();

            let read = store.read_last().unwrap().unwrap();
            prop_assert_eq!(read.payload["budget"].as_f64().unwrap().to_bits(), amount.to_bits());
            prop_assert!(read.undecodable.is_empty());
        }
    }

    #[test]
    fn locked_database_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");
        let store =
            SqliteLedgerStore::open(&path, ChainId::Fund, Duration::from_millis(50)).unwrap();

        let holder = Connection::open(&path).unwrap();
        holder.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let err = store.append(&block(0)).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "got {err:?}");

        holder.execute_batch("ROLLBACK").unwrap();
        store.append(&block(0)).unwrap();
    }
}
