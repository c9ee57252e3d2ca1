// ABOUTME: The storage manager: opens the database file, owns every connection to it, and runs transactions.
// ABOUTME: One writer connection serialises mutations with a bounded wait; a read-only pool serves queries.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;

use crate::error::StoreError;
use crate::schema;

/// File name of the database inside the data directory.
pub const DATABASE_FILE: &str = "podshelf.db";

/// Settings needed to open a [`StorageManager`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    /// Upper bound on the total wait of one write: queueing for the writer plus SQLite's busy handler.
    pub write_timeout: Duration,
    pub read_pool_size: usize,
}

impl StoreConfig {
    pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_READ_POOL_SIZE: usize = 4;

    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            write_timeout: Self::DEFAULT_WRITE_TIMEOUT,
            read_pool_size: Self::DEFAULT_READ_POOL_SIZE,
        }
    }

    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

/// A connection slot. `None` once the manager has been shut down.
type Slot = Arc<Mutex<Option<Connection>>>;

/// Sole owner of the database file. Cheap to clone; clones share the same connections.
#[derive(Debug, Clone)]
pub struct StorageManager {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    write_timeout: Duration,
    writer: Slot,
    readers: Vec<Slot>,
    read_cursor: AtomicUsize,
}

impl StorageManager {
    /// Open (creating if needed) the database file under `config.data_dir`.
    ///
    /// Fails with [`StoreError::Unavailable`] when the directory or file is not
    /// writable, or the file is corrupt or not a SQLite database.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        fs::create_dir_all(&config.data_dir).map_err(|e| {
            StoreError::Unavailable(format!(
                "cannot create data directory {}: {e}",
                config.data_dir.display()
            ))
        })?;

        let path = config.database_path();
        let writer = open_writer(&path, config.write_timeout)?;

        let pool_size = config.read_pool_size.max(1);
        let mut readers = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let reader = open_reader(&path, config.write_timeout)?;
            readers.push(Arc::new(Mutex::new(Some(reader))));
        }

        tracing::info!(
            path = %path.display(),
            readers = pool_size,
            write_timeout_ms = config.write_timeout.as_millis() as u64,
            "storage opened"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                write_timeout: config.write_timeout,
                writer: Arc::new(Mutex::new(Some(writer))),
                readers,
                read_cursor: AtomicUsize::new(0),
            }),
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Run a trivial query on a reader connection.
    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.read("health_check", |tx| {
            tx.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }

    /// Close every connection after in-flight work has finished.
    ///
    /// Waits for the writer and each reader (bounded by the write timeout),
    /// checkpoints the WAL into the main file, then closes. Later operations
    /// fail with [`StoreError::Unavailable`]. Calling it twice is harmless.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        let mut writer = self.acquire(&self.inner.writer, "shutdown").await?;

        for slot in &self.inner.readers {
            let mut reader = self.acquire(slot, "shutdown").await?;
            if let Some(conn) = reader.take() {
                conn.close().map_err(|(_, e)| StoreError::from(e))?;
            }
        }

        let Some(conn) = writer.take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
            conn.close().map_err(|(_, e)| StoreError::from(e))?;
            Ok(())
        })
        .await??;

        tracing::info!(path = %self.inner.path.display(), "storage closed");
        Ok(())
    }

    /// Run `f` inside an IMMEDIATE transaction on the writer connection.
    ///
    /// At most one write transaction is open at a time. The write timeout bounds
    /// the whole wait: time spent queued for the writer is taken off SQLite's busy
    /// handler, and running out of it yields [`StoreError::Busy`]. The transaction
    /// runs on the blocking pool with the writer guard moved into it, so a
    /// dropped caller cannot interrupt it half-way: it commits or rolls back.
    pub(crate) async fn write<T, F>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Transaction<'_>) -> Result<T, StoreError> + Send + 'static,
    {
        let started = Instant::now();
        let guard = self.acquire(&self.inner.writer, op).await?;
        // SQLite's busy handler only gets what is left of the budget.
        let busy_budget = self.inner.write_timeout.saturating_sub(started.elapsed());
        tokio::task::spawn_blocking(move || {
            let mut guard = guard;
            let conn = guard.as_mut().ok_or_else(StoreError::closed)?;
            conn.busy_timeout(busy_budget)?;
            run_in_transaction(conn, TransactionBehavior::Immediate, op, f)
        })
        .await?
    }

    /// Run `f` inside a read transaction on one of the pooled reader connections.
    ///
    /// Readers run against a WAL snapshot, so they neither block each other nor wait on the writer.
    pub(crate) async fn read<T, F>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Transaction<'_>) -> Result<T, StoreError> + Send + 'static,
    {
        let guard = self.acquire_reader(op).await?;
        tokio::task::spawn_blocking(move || {
            let mut guard = guard;
            let conn = guard.as_mut().ok_or_else(StoreError::closed)?;
            run_in_transaction(conn, TransactionBehavior::Deferred, op, f)
        })
        .await?
    }

    /// Take the first idle reader, or wait on the next one in round-robin order.
    async fn acquire_reader(
        &self,
        op: &'static str,
    ) -> Result<OwnedMutexGuard<Option<Connection>>, StoreError> {
        let readers = &self.inner.readers;
        let start = self.inner.read_cursor.fetch_add(1, Ordering::Relaxed);
        for offset in 0..readers.len() {
            let slot = &readers[(start + offset) % readers.len()];
            if let Ok(guard) = Arc::clone(slot).try_lock_owned() {
                return Ok(guard);
            }
        }
        self.acquire(&readers[start % readers.len()], op).await
    }

    async fn acquire(
        &self,
        slot: &Slot,
        op: &'static str,
    ) -> Result<OwnedMutexGuard<Option<Connection>>, StoreError> {
        let wait = self.inner.write_timeout;
        match timeout(wait, Arc::clone(slot).lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                tracing::warn!(op, wait_ms = wait.as_millis() as u64, "timed out waiting for connection");
                Err(StoreError::Busy(format!(
                    "{op} waited {}ms for the database connection",
                    wait.as_millis()
                )))
            }
        }
    }
}

/// Idle → TransactionOpen → Committed | RolledBack → Idle.
fn run_in_transaction<T, F>(
    conn: &mut Connection,
    behavior: TransactionBehavior,
    op: &'static str,
    f: F,
) -> Result<T, StoreError>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
{
    let tx = conn.transaction_with_behavior(behavior)?;
    tracing::trace!(op, "transaction open");
    match f(&tx) {
        Ok(value) => {
            tx.commit()?;
            tracing::debug!(op, "transaction committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                tracing::warn!(op, error = %rollback_err, "rollback failed");
            }
            match &err {
                StoreError::Unavailable(detail) => {
                    tracing::error!(op, detail = %detail, "transaction rolled back: storage unavailable");
                }
                StoreError::Busy(detail) => {
                    tracing::warn!(op, detail = %detail, "transaction rolled back: storage busy");
                }
                other => tracing::debug!(op, error = %other, "transaction rolled back"),
            }
            Err(err)
        }
    }
}

fn open_writer(path: &Path, busy_timeout: Duration) -> Result<Connection, StoreError> {
    let mut conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=FULL;
         PRAGMA foreign_keys=ON;",
    )?;

    let check: String = conn.query_row("PRAGMA quick_check", [], |row| row.get(0))?;
    if check != "ok" {
        return Err(StoreError::Unavailable(format!(
            "integrity check failed for {}: {check}",
            path.display()
        )));
    }

    schema::initialize(&mut conn)?;
    Ok(conn)
}

fn open_reader(path: &Path, busy_timeout: Duration) -> Result<Connection, StoreError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(busy_timeout)?;
    Ok(conn)
}
