use crate::{KVStore, Result, StorageError, Transaction as KVTransaction};
use bytes::Bytes;
use redb::{Database, DatabaseError, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const VIGIL_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("vigil");

/// How long an operation waits for another holder of the file lock
const LOCK_WAIT: Duration = Duration::from_secs(5);
const LOCK_RETRY: Duration = Duration::from_millis(10);

/// redb-based storage backend.
///
/// redb locks its file for as long as a `Database` is open, so the file is
/// opened per operation and closed again afterwards. That lets a running
/// `serve` and one-shot CLI commands share one data file. An operation that
/// finds the file locked retries until `LOCK_WAIT` has passed.
pub struct RedbBackend {
    path: PathBuf,
}

impl RedbBackend {
    /// Open (or create) the database file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Opening redb database at: {}", path.as_ref().display());

        let backend = Self {
            path: path.as_ref().to_path_buf(),
        };

        let db = backend.open()?;
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(VIGIL_TABLE)?;
        }
        write_txn.commit()?;

        Ok(backend)
    }

    fn open(&self) -> Result<Database> {
        let deadline = Instant::now() + LOCK_WAIT;
        loop {
            match Database::create(&self.path) {
                Err(DatabaseError::DatabaseAlreadyOpen) if Instant::now() < deadline => {
                    std::thread::sleep(LOCK_RETRY);
                }
                result => return Ok(result?),
            }
        }
    }
}

impl KVStore for RedbBackend {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        debug!("Getting key: {:?}", String::from_utf8_lossy(key));

        let db = self.open()?;
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(VIGIL_TABLE)?;

        let value = table.get(key)?.map(|value| Bytes::copy_from_slice(value.value()));
        Ok(value)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        debug!("Putting key: {:?}", String::from_utf8_lossy(key));

        let db = self.open()?;
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(VIGIL_TABLE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;

        Ok(())
    }

    /// Entries whose key starts with `prefix`, in key order
    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Bytes, Bytes)>> {
        let db = self.open()?;
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(VIGIL_TABLE)?;

        let mut results = Vec::new();
        for entry in table.range(prefix..)? {
            let (key, value) = entry?;
            let key_bytes = key.value();
            if !key_bytes.starts_with(prefix) {
                break;
            }
            results.push((
                Bytes::copy_from_slice(key_bytes),
                Bytes::copy_from_slice(value.value()),
            ));
        }

        debug!(
            "Scan of {:?} found {} results",
            String::from_utf8_lossy(prefix),
            results.len()
        );
        Ok(results)
    }

    fn transaction(&self) -> Result<Box<dyn KVTransaction>> {
        let db = self.open()?;
        let write_txn = db.begin_write()?;
        Ok(Box::new(RedbTransaction {
            txn: Some(write_txn),
            _db: db,
        }))
    }
}

/// redb write transaction; dropped without commit means rolled back.
///
/// Owns the database handle so the file stays locked until the transaction
/// ends. Field order matters: the transaction drops before the handle.
struct RedbTransaction {
    txn: Option<redb::WriteTransaction>,
    _db: Database,
}

impl RedbTransaction {
    fn active(&self) -> Result<&redb::WriteTransaction> {
        self.txn.as_ref().ok_or_else(|| {
            StorageError::transaction_error("Transaction already committed or rolled back")
        })
    }
}

impl KVTransaction for RedbTransaction {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        let table = self.active()?.open_table(VIGIL_TABLE)?;
        let value = table.get(key)?.map(|value| Bytes::copy_from_slice(value.value()));
        Ok(value)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut table = self.active()?.open_table(VIGIL_TABLE)?;
        table.insert(key, value)?;
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        let txn = self.txn.take().ok_or_else(|| {
            StorageError::transaction_error("Transaction already committed or rolled back")
        })?;
        txn.commit()?;
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        let txn = self.txn.take().ok_or_else(|| {
            StorageError::transaction_error("Transaction already committed or rolled back")
        })?;
        txn.abort()?;
        Ok(())
    }
}

impl Drop for RedbTransaction {
    fn drop(&mut self) {
        if let Some(txn) = self.txn.take() {
            let _ = txn.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_redb_backend_basic_operations() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::new(dir.path().join("test.redb")).unwrap();

        backend.put(b"key1", b"value1").unwrap();
        assert_eq!(backend.get(b"key1").unwrap(), Some(Bytes::from("value1")));

        assert_eq!(backend.get(b"key2").unwrap(), None);

        backend.put(b"key1", b"value2").unwrap();
        assert_eq!(backend.get(b"key1").unwrap(), Some(Bytes::from("value2")));
    }

    #[test]
    fn test_redb_backend_scan_is_ordered_and_bounded() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::new(dir.path().join("test.redb")).unwrap();

        backend.put(b"probes/02", b"b").unwrap();
        backend.put(b"probes/01", b"a").unwrap();
        backend.put(b"probesx", b"not-a-probe").unwrap();
        backend.put(b"results/01", b"r").unwrap();

        let results = backend.scan(b"probes/").unwrap();
        let values: Vec<_> = results.iter().map(|(_, v)| v.clone()).collect();
        assert_eq!(values, vec![Bytes::from("a"), Bytes::from("b")]);

        let results = backend.scan(b"results/").unwrap();
        assert_eq!(results, vec![(Bytes::from("results/01"), Bytes::from("r"))]);
    }

    #[test]
    fn test_redb_backend_transaction() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::new(dir.path().join("test.redb")).unwrap();

        {
            let mut txn = backend.transaction().unwrap();
            txn.put(b"key1", b"value1").unwrap();
            assert_eq!(txn.get(b"key1").unwrap(), Some(Bytes::from("value1")));
            txn.commit().unwrap();
        }
        assert_eq!(backend.get(b"key1").unwrap(), Some(Bytes::from("value1")));

        {
            let mut txn = backend.transaction().unwrap();
            txn.put(b"key2", b"value2").unwrap();
            txn.rollback().unwrap();
        }
        assert_eq!(backend.get(b"key2").unwrap(), None);

        {
            let mut txn = backend.transaction().unwrap();
            txn.put(b"key1", b"overwritten").unwrap();
            // dropped without commit
        }
        assert_eq!(backend.get(b"key1").unwrap(), Some(Bytes::from("value1")));
    }

    #[test]
    fn test_two_backends_share_one_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared.redb");

        let server = RedbBackend::new(&path).unwrap();
        let cli = RedbBackend::new(&path).unwrap();

        cli.put(b"probes/01", b"written by cli").unwrap();
        assert_eq!(
            server.get(b"probes/01").unwrap(),
            Some(Bytes::from("written by cli"))
        );

        let mut txn = server.transaction().unwrap();
        txn.put(b"probes/02", b"written by server").unwrap();
        txn.commit().unwrap();
        assert_eq!(cli.scan(b"probes/").unwrap().len(), 2);
    }

    #[test]
    fn test_open_waits_for_a_held_lock() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(RedbBackend::new(dir.path().join("busy.redb")).unwrap());

        let mut txn = backend.transaction().unwrap();
        txn.put(b"key", b"first").unwrap();

        let writer = {
            let backend = Arc::clone(&backend);
            std::thread::spawn(move || backend.put(b"key", b"second"))
        };
        std::thread::sleep(Duration::from_millis(100));
        txn.commit().unwrap();

        writer.join().unwrap().unwrap();
        assert_eq!(backend.get(b"key").unwrap(), Some(Bytes::from("second")));
    }

    #[test]
    fn test_redb_backend_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.redb");

        {
            let backend = RedbBackend::new(&path).unwrap();
            backend.put(b"key", b"persisted").unwrap();
        }

        let backend = RedbBackend::new(&path).unwrap();
        assert_eq!(backend.get(b"key").unwrap(), Some(Bytes::from("persisted")));
    }
}
