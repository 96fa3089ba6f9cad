use std::path::Path;
use std::time::{Duration, Instant};

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};

use crate::{KeyValueStore, ScanResult, StoreError};

const PARTITION_NAME: &str = "settings";
const SLOW_WRITE_THRESHOLD: Duration = Duration::from_millis(250);

/// Disk-backed settings store. Every write is synced so markers survive a
/// crash right after they are set.
pub struct FjallStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

#[derive(Clone, Debug, Default)]
pub struct FjallOptions {
    pub cache_bytes: Option<u64>,
    pub fsync_ms: Option<u16>,
}

impl FjallOptions {
    fn apply_config(&self, mut config: Config) -> Config {
        if let Some(bytes) = self.cache_bytes {
            config = config.cache_size(bytes);
        }
        if let Some(ms) = self.fsync_ms {
            config = config.fsync_ms(Some(ms));
        }
        config
    }
}

impl FjallStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_options(path, FjallOptions::default())
    }

    pub fn open_with_options(
        path: impl AsRef<Path>,
        options: FjallOptions,
    ) -> Result<Self, StoreError> {
        let keyspace = options
            .apply_config(Config::new(path))
            .open()
            .map_err(map_err)?;
        let partition = keyspace
            .open_partition(PARTITION_NAME, PartitionCreateOptions::default())
            .map_err(map_err)?;
        Ok(Self {
            keyspace,
            partition,
        })
    }

    fn persist(&self) -> Result<(), StoreError> {
        let started = Instant::now();
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(map_err)?;
        let elapsed = started.elapsed();
        if elapsed >= SLOW_WRITE_THRESHOLD {
            shade_log::log_warn!(
                "Warning: settings store sync took {}ms",
                elapsed.as_millis()
            );
        }
        Ok(())
    }
}

impl KeyValueStore for FjallStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self.partition.get(key).map_err(map_err)?;
        Ok(value.map(|bytes| bytes.to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.partition.insert(key, value).map_err(map_err)?;
        self.persist()
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.partition.remove(key).map_err(map_err)?;
        self.persist()
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<ScanResult, StoreError> {
        let mut results = Vec::new();
        for entry in self.partition.prefix(prefix) {
            let (key, value) = entry.map_err(map_err)?;
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }
}

fn map_err(err: fjall::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}
