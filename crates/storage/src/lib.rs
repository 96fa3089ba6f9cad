use std::fmt;
use std::sync::Arc;

pub mod memory;

#[cfg(feature = "fjall")]
pub mod fjall;

#[derive(Debug)]
pub enum StoreError {
    Backend(String),
    InvalidUtf8 { key: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Backend(message) => write!(f, "{message}"),
            StoreError::InvalidUtf8 { key } => {
                write!(f, "stored value for '{key}' is not valid utf-8")
            }
        }
    }
}

impl std::error::Error for StoreError {}

pub type ScanResult = Vec<(Vec<u8>, Vec<u8>)>;

/// Byte-level key/value backend.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;
    fn scan_prefix(&self, prefix: &[u8]) -> Result<ScanResult, StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.as_ref().get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.as_ref().put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.as_ref().delete(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<ScanResult, StoreError> {
        self.as_ref().scan_prefix(prefix)
    }
}

/// String-keyed, string-valued persistent settings used by the UI.
///
/// Reads and writes are independent operations; callers that read then write
/// the same key get no atomicity.
#[derive(Clone)]
pub struct StorageService {
    backend: Arc<dyn KeyValueStore>,
}

impl StorageService {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(memory::MemoryStore::new()))
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let Some(bytes) = self.backend.get(key.as_bytes())? else {
            return Ok(None);
        };
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| StoreError::InvalidUtf8 {
                key: key.to_string(),
            })
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        shade_log::log_trace!("storage set {key}");
        self.backend.put(key.as_bytes(), value.as_bytes())
    }

    pub fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.backend.delete(key.as_bytes())
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .backend
            .scan_prefix(prefix.as_bytes())?
            .into_iter()
            .filter_map(|(key, _)| String::from_utf8(key).ok())
            .collect())
    }
}
