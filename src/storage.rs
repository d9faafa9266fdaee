use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::Db;
use std::path::Path;
use std::sync::Mutex;

const SNAPSHOT_TREE: &str = "snapshot";
const TEXTS_TREE: &str = "texts";
const SNAPSHOT_KEY: &[u8] = b"main_snapshot";

fn text_key(index: usize) -> Vec<u8> {
    (index as u64).to_be_bytes().to_vec()
}

/// Storage failures callers are expected to handle.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    /// Another writer replaced the snapshot since it was loaded.
    #[error("snapshot was modified concurrently")]
    Conflict,
}

/// Where serialized snapshots live between invocations.
///
/// Both calls are atomic from the engine's point of view and are never
/// retried. Plain `save` is last-writer-wins: two invocations that load,
/// modify and save at the same time lose one side's update.
pub trait SnapshotStore {
    fn load(&self) -> Result<Option<Vec<u8>>>;
    fn save(&self, bytes: &[u8]) -> Result<()>;
}

/// Original text of an indexed document, kept for prompt context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredText {
    #[serde(default)]
    pub key: Option<String>,
    pub text: String,
}

/// Snapshot store for tests and one-shot tools.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        let guard = self
            .bytes
            .lock()
            .map_err(|_| anyhow::anyhow!("snapshot lock poisoned"))?;
        Ok(guard.clone())
    }

    fn save(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self
            .bytes
            .lock()
            .map_err(|_| anyhow::anyhow!("snapshot lock poisoned"))?;
        *guard = Some(bytes.to_vec());
        Ok(())
    }
}

/// sled-backed snapshot and text storage.
#[derive(Clone)]
pub struct SledStorage {
    db: Db,
}

impl SledStorage {
    /// Open or create a storage database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path).context("Failed to open database")?;
        Ok(Self { db })
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open().context("Failed to create in-memory database")?;
        Ok(Self { db })
    }

    // ========== Snapshot Operations ==========

    /// Swap in a new snapshot and write the texts it references, atomically.
    ///
    /// Nothing is written if the stored snapshot no longer equals `expected`
    /// ([`StorageError::Conflict`]) or if any write fails.
    pub fn commit_ingest(
        &self,
        expected: Option<&[u8]>,
        snapshot: &[u8],
        texts: &[(usize, StoredText)],
    ) -> Result<()> {
        let snapshot_tree = self.db.open_tree(SNAPSHOT_TREE)?;
        let texts_tree = self.db.open_tree(TEXTS_TREE)?;
        let encoded = texts
            .iter()
            .map(|(index, text)| -> Result<(Vec<u8>, Vec<u8>)> {
                Ok((text_key(*index), bincode::serialize(text)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let outcome = (&snapshot_tree, &texts_tree).transaction(|(snap, stored)| {
            let current = snap.get(SNAPSHOT_KEY)?;
            if current.as_deref() != expected {
                return Err(ConflictableTransactionError::Abort(StorageError::Conflict));
            }
            snap.insert(SNAPSHOT_KEY, snapshot)?;
            for (key, value) in &encoded {
                stored.insert(key.clone(), value.clone())?;
            }
            Ok(())
        });

        match outcome {
            Ok(()) => {
                self.db.flush()?;
                Ok(())
            }
            Err(TransactionError::Abort(err)) => Err(err.into()),
            Err(TransactionError::Storage(err)) => Err(err).context("ingest transaction failed"),
        }
    }

    // ========== Text Operations ==========

    /// Get the retained text of document `index`
    pub fn get_text(&self, index: usize) -> Result<Option<StoredText>> {
        let tree = self.db.open_tree(TEXTS_TREE)?;
        if let Some(data) = tree.get(text_key(index))? {
            let text: StoredText = bincode::deserialize(&data)?;
            Ok(Some(text))
        } else {
            Ok(None)
        }
    }

    /// Count retained texts
    pub fn count_texts(&self) -> Result<usize> {
        let tree = self.db.open_tree(TEXTS_TREE)?;
        Ok(tree.len())
    }

    /// Clear all data
    pub fn clear(&self) -> Result<()> {
        self.db.drop_tree(SNAPSHOT_TREE)?;
        self.db.drop_tree(TEXTS_TREE)?;
        Ok(())
    }
}

impl SnapshotStore for SledStorage {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        let tree = self.db.open_tree(SNAPSHOT_TREE)?;
        Ok(tree.get(SNAPSHOT_KEY)?.map(|data| data.to_vec()))
    }

    fn save(&self, bytes: &[u8]) -> Result<()> {
        let tree = self.db.open_tree(SNAPSHOT_TREE)?;
        tree.insert(SNAPSHOT_KEY, bytes)?;
        tree.flush()?;
        Ok(())
    }
}
