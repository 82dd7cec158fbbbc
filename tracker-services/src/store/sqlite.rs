//! SQLite-backed signal store
//!
//! Milestones and fired alerts live in JSON columns next to the signal row;
//! price observations go to a separate append-only table.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use tracker_core::{Chain, MilestoneRecord, PricePoint, Signal, SignalStatus};

use super::{SignalQuery, SignalStore, StoreError};

const SIGNAL_COLUMNS: &str = "contract_address, chain, symbol, name, market_cap_at_call, \
     admitted_at, scope, status, milestones, alerts_fired";

/// Default bound on waiting for the shared connection
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Signal store using SQLite
///
/// The connection is shared behind a mutex and every query runs on the
/// blocking pool so callers on the async runtime never block it.
///
/// Only the wait for the connection is bounded. An operation that does not
/// get the connection in time is abandoned before it touches the database and
/// reports [`StoreError::Timeout`]; once it holds the connection it runs to
/// completion and its real outcome is returned. A timed-out write therefore
/// never commits behind the caller's back.
#[derive(Clone)]
pub struct SqliteSignalStore {
    conn: Arc<parking_lot::Mutex<Connection>>,
    acquire_timeout: Duration,
}

/// Hand-off between a queued blocking operation and its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    Pending,
    Started,
    Abandoned,
}

/// Abandons a claim that never started when the caller goes away
struct AbandonOnDrop(Arc<parking_lot::Mutex<Claim>>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        let mut claim = self.0.lock();
        if *claim == Claim::Pending {
            *claim = Claim::Abandoned;
        }
    }
}

impl SqliteSignalStore {
    /// Open (or create) the database file and its tables
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Io(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(db_path.as_ref())?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store (useful for testing)
    pub fn new_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    /// How long an operation may wait for the connection
    pub fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(parking_lot::Mutex::new(conn)),
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        })
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let claim = Arc::new(parking_lot::Mutex::new(Claim::Pending));
        let task_claim = Arc::clone(&claim);
        let _abandon = AbandonOnDrop(Arc::clone(&claim));
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let timeout_ms = self.acquire_timeout.as_millis() as u64;

        let handle = tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            {
                let mut claim = task_claim.lock();
                if *claim == Claim::Abandoned {
                    return Err(StoreError::Timeout(timeout_ms));
                }
                *claim = Claim::Started;
            }
            let _ = started_tx.send(());
            f(&conn)
        });

        if tokio::time::timeout(self.acquire_timeout, started_rx).await.is_err() {
            let mut claim = claim.lock();
            if *claim == Claim::Pending {
                *claim = Claim::Abandoned;
                debug!("[SignalStore] Gave up waiting {}ms for the connection", timeout_ms);
                return Err(StoreError::Timeout(timeout_ms));
            }
        }

        handle.await.map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Hold the connection from another thread for `hold`, returning once it is held
    #[cfg(test)]
    pub(crate) fn hold_connection(&self, hold: Duration) -> std::thread::JoinHandle<()> {
        let conn = Arc::clone(&self.conn);
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let holder = std::thread::spawn(move || {
            let _conn = conn.lock();
            let _ = locked_tx.send(());
            std::thread::sleep(hold);
        });
        let _ = locked_rx.recv();
        holder
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS signals (
            contract_address TEXT PRIMARY KEY,
            chain TEXT NOT NULL,
            symbol TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL DEFAULT '',
            market_cap_at_call REAL NOT NULL,
            admitted_at INTEGER NOT NULL,
            scope TEXT,
            status TEXT NOT NULL DEFAULT 'monitoring',
            milestones JSON NOT NULL DEFAULT '{}',
            alerts_fired JSON NOT NULL DEFAULT '[]',
            updated_at INTEGER DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_signals_status
        ON signals(status, admitted_at);

        CREATE INDEX IF NOT EXISTS idx_signals_scope
        ON signals(scope, admitted_at);

        CREATE TABLE IF NOT EXISTS price_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            contract_address TEXT NOT NULL,
            price REAL NOT NULL,
            market_cap REAL NOT NULL,
            return_multiplier REAL NOT NULL,
            recorded_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_price_history_address
        ON price_history(contract_address, recorded_at);
        "#,
    )?;

    Ok(())
}

/// Raw column values of one `signals` row
struct SignalRow {
    contract_address: String,
    chain: String,
    symbol: String,
    name: String,
    market_cap_at_call: f64,
    admitted_at: i64,
    scope: Option<String>,
    status: String,
    milestones: String,
    alerts_fired: String,
}

impl SignalRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            contract_address: row.get(0)?,
            chain: row.get(1)?,
            symbol: row.get(2)?,
            name: row.get(3)?,
            market_cap_at_call: row.get(4)?,
            admitted_at: row.get(5)?,
            scope: row.get(6)?,
            status: row.get(7)?,
            milestones: row.get(8)?,
            alerts_fired: row.get(9)?,
        })
    }
}

impl TryFrom<SignalRow> for Signal {
    type Error = StoreError;

    fn try_from(row: SignalRow) -> Result<Self, Self::Error> {
        let chain: Chain = row.chain.parse().map_err(StoreError::Serialization)?;
        let status: SignalStatus = row.status.parse().map_err(StoreError::Serialization)?;
        let milestones: BTreeMap<String, MilestoneRecord> = serde_json::from_str(&row.milestones)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let alerts_fired: Vec<f64> = serde_json::from_str(&row.alerts_fired)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(Signal {
            contract_address: row.contract_address,
            chain,
            symbol: row.symbol,
            name: row.name,
            market_cap_at_call: row.market_cap_at_call,
            admitted_at: row.admitted_at,
            scope: row.scope,
            status,
            milestones,
            alerts_fired,
        })
    }
}

fn encode_state(signal: &Signal) -> Result<(String, String), StoreError> {
    let milestones = serde_json::to_string(&signal.milestones)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    let alerts = serde_json::to_string(&signal.alerts_fired)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok((milestones, alerts))
}

fn query_signals<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Signal>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, SignalRow::from_row)?;

    // One undecodable row must not hide every other signal
    let mut signals = Vec::new();
    for row in rows {
        let decoded = row
            .map_err(StoreError::from)
            .and_then(Signal::try_from);
        match decoded {
            Ok(signal) => signals.push(signal),
            Err(e) => warn!("[SignalStore] Skipping undecodable signal row: {}", e),
        }
    }

    Ok(signals)
}

#[async_trait]
impl SignalStore for SqliteSignalStore {
    async fn get(&self, address: &str) -> Result<Option<Signal>, StoreError> {
        let address = address.to_string();
        self.run(move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM signals WHERE contract_address = ?1",
                        SIGNAL_COLUMNS
                    ),
                    params![address],
                    SignalRow::from_row,
                )
                .optional()?;
            row.map(Signal::try_from).transpose()
        })
        .await
    }

    async fn insert_if_absent(&self, signal: &Signal) -> Result<bool, StoreError> {
        let signal = signal.clone();
        self.run(move |conn| {
            let (milestones, alerts) = encode_state(&signal)?;
            let inserted = conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO signals ({}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    SIGNAL_COLUMNS
                ),
                params![
                    signal.contract_address,
                    signal.chain.code(),
                    signal.symbol,
                    signal.name,
                    signal.market_cap_at_call,
                    signal.admitted_at,
                    signal.scope,
                    signal.status.as_str(),
                    milestones,
                    alerts,
                ],
            )?;
            debug!(
                "[SignalStore] insert {} -> {}",
                signal.contract_address,
                if inserted > 0 { "created" } else { "exists" }
            );
            Ok(inserted > 0)
        })
        .await
    }

    async fn upsert(&self, signal: &Signal) -> Result<(), StoreError> {
        let signal = signal.clone();
        self.run(move |conn| {
            let (milestones, alerts) = encode_state(&signal)?;
            conn.execute(
                &format!(
                    r#"
                    INSERT INTO signals ({})
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(contract_address) DO UPDATE SET
                        status = excluded.status,
                        milestones = excluded.milestones,
                        alerts_fired = excluded.alerts_fired,
                        updated_at = strftime('%s', 'now')
                    "#,
                    SIGNAL_COLUMNS
                ),
                params![
                    signal.contract_address,
                    signal.chain.code(),
                    signal.symbol,
                    signal.name,
                    signal.market_cap_at_call,
                    signal.admitted_at,
                    signal.scope,
                    signal.status.as_str(),
                    milestones,
                    alerts,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_by_status(&self, status: SignalStatus) -> Result<Vec<Signal>, StoreError> {
        self.run(move |conn| {
            query_signals(
                conn,
                &format!(
                    "SELECT {} FROM signals WHERE status = ?1 ORDER BY admitted_at ASC, rowid ASC",
                    SIGNAL_COLUMNS
                ),
                params![status.as_str()],
            )
        })
        .await
    }

    async fn list_by_scope(&self, scope: &str) -> Result<Vec<Signal>, StoreError> {
        let scope = scope.to_string();
        self.run(move |conn| {
            query_signals(
                conn,
                &format!(
                    "SELECT {} FROM signals WHERE scope = ?1 ORDER BY admitted_at ASC, rowid ASC",
                    SIGNAL_COLUMNS
                ),
                params![scope],
            )
        })
        .await
    }

    async fn list_all(&self) -> Result<Vec<Signal>, StoreError> {
        self.run(move |conn| {
            query_signals(
                conn,
                &format!(
                    "SELECT {} FROM signals ORDER BY admitted_at ASC, rowid ASC",
                    SIGNAL_COLUMNS
                ),
                [],
            )
        })
        .await
    }

    async fn list_recent(&self, query: SignalQuery) -> Result<Vec<Signal>, StoreError> {
        self.run(move |conn| {
            let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
            let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);
            match query.status {
                Some(status) => query_signals(
                    conn,
                    &format!(
                        "SELECT {} FROM signals WHERE status = ?1 \
                         ORDER BY admitted_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
                        SIGNAL_COLUMNS
                    ),
                    params![status.as_str(), limit, offset],
                ),
                None => query_signals(
                    conn,
                    &format!(
                        "SELECT {} FROM signals \
                         ORDER BY admitted_at DESC, rowid DESC LIMIT ?1 OFFSET ?2",
                        SIGNAL_COLUMNS
                    ),
                    params![limit, offset],
                ),
            }
        })
        .await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.run(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM signals", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    async fn append_price(&self, address: &str, point: &PricePoint) -> Result<(), StoreError> {
        let address = address.to_string();
        let point = *point;
        self.run(move |conn| {
            conn.execute(
                r#"
                INSERT INTO price_history (contract_address, price, market_cap, return_multiplier, recorded_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    address,
                    point.price,
                    point.market_cap,
                    point.return_multiplier,
                    point.recorded_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn price_history(&self, address: &str) -> Result<Vec<PricePoint>, StoreError> {
        let address = address.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT price, market_cap, return_multiplier, recorded_at
                FROM price_history
                WHERE contract_address = ?1
                ORDER BY recorded_at ASC, id ASC
                "#,
            )?;

            let points = stmt
                .query_map(params![address], |row| {
                    Ok(PricePoint {
                        price: row.get(0)?,
                        market_cap: row.get(1)?,
                        return_multiplier: row.get(2)?,
                        recorded_at: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(points)
        })
        .await
    }
}
