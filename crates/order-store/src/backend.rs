use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::AtomicBatch;

/// Errors reported by a key-value backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// A set-if-absent guard found the key already present.
    #[error("Key already exists: {0}")]
    KeyExists(String),

    /// A set-if-present or delete guard found the key absent.
    #[error("Key does not exist: {0}")]
    KeyMissing(String),

    /// The key holds a different kind of value than the operation expects.
    #[error("Wrong kind of value at {0}")]
    WrongType(String),

    /// The batch was rejected before reaching the store.
    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    /// The store could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The store did not answer in time.
    #[error("Backend timed out")]
    Timeout,

    /// Any other failure reported by the store.
    #[error("{0}")]
    Other(String),
}

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Opaque serialized payload held under a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue(Vec<u8>);

impl StoredValue {
    /// Wraps raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the value, returning the payload bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for StoredValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for StoredValue {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

/// Resumption token of an incremental set scan.
///
/// `Cursor::START` begins a scan. A scan that hands back `Cursor::START`
/// has visited the whole set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Cursor(u64);

impl Cursor {
    /// Beginning (and end) of a scan.
    pub const START: Cursor = Cursor(0);

    /// Wraps a raw cursor value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw cursor value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns true for the start/end token.
    pub const fn is_start(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Cursor {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One step of an incremental set scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanPage {
    /// Members returned by this step, in scan order.
    pub members: Vec<String>,

    /// Where the next step resumes.
    pub next: Cursor,
}

/// A write queued in an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Write `value` only if `key` does not exist.
    SetIfAbsent { key: String, value: StoredValue },

    /// Overwrite `key` only if it exists.
    SetIfPresent { key: String, value: StoredValue },

    /// Remove `key`, which must exist.
    Delete { key: String },

    /// Add `member` to the set stored at `set`.
    AddToSet { set: String, member: String },

    /// Remove `member` from the set stored at `set`.
    RemoveFromSet { set: String, member: String },
}

impl BatchOp {
    /// The key this operation writes to.
    pub fn key(&self) -> &str {
        match self {
            BatchOp::SetIfAbsent { key, .. }
            | BatchOp::SetIfPresent { key, .. }
            | BatchOp::Delete { key } => key,
            BatchOp::AddToSet { set, .. } | BatchOp::RemoveFromSet { set, .. } => set,
        }
    }
}

/// Core trait for key-value backends.
///
/// A backend translates each operation to its store and reports absence and
/// collisions as `KeyMissing` / `KeyExists` so callers can tell them apart
/// from failures. Values are opaque. All implementations must be thread-safe.
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Writes `value` under `key` unless the key exists (`KeyExists`).
    async fn set_if_absent(&self, key: &str, value: StoredValue) -> BackendResult<()>;

    /// Overwrites `key` if it exists, otherwise fails with `KeyMissing`.
    async fn set_if_present(&self, key: &str, value: StoredValue) -> BackendResult<()>;

    /// Reads the value under `key`.
    async fn get(&self, key: &str) -> BackendResult<Option<StoredValue>>;

    /// Removes `key`, failing with `KeyMissing` if it does not exist.
    async fn delete(&self, key: &str) -> BackendResult<()>;

    /// Adds `member` to the set at `set`, creating the set if needed.
    async fn add_to_set(&self, set: &str, member: &str) -> BackendResult<()>;

    /// Removes `member` from the set at `set`.
    async fn remove_from_set(&self, set: &str, member: &str) -> BackendResult<()>;

    /// Performs one step of an incremental scan over the set at `set`.
    ///
    /// `count` is a hint for how many members to examine; `pattern` is a glob
    /// filter applied to the examined members. Scanning a missing set yields
    /// an empty page with `Cursor::START`.
    async fn scan_set(
        &self,
        set: &str,
        cursor: Cursor,
        pattern: &str,
        count: usize,
    ) -> BackendResult<ScanPage>;

    /// Reads several keys at once.
    ///
    /// The result has one entry per requested key, in request order; absent
    /// keys yield `None`.
    async fn multi_get(&self, keys: &[String]) -> BackendResult<Vec<Option<StoredValue>>>;

    /// Applies every operation or none of them.
    ///
    /// All guards are evaluated against the state before the batch; if any
    /// guard fails the store is left untouched and that guard's error is
    /// returned.
    async fn execute_atomic(&self, ops: Vec<BatchOp>) -> BackendResult<()>;
}

/// Extension trait providing convenience methods for backends.
pub trait KeyValueBackendExt: KeyValueBackend {
    /// Opens a scoped atomic batch against this backend.
    fn batch(&self) -> AtomicBatch<'_, Self> {
        AtomicBatch::new(self)
    }
}

// Blanket implementation for all KeyValueBackend implementations
impl<T: KeyValueBackend + ?Sized> KeyValueBackendExt for T {}

/// Validates a batch before executing it.
///
/// A batch must not be empty and may touch each key at most once, so that
/// checking every guard up front decides the outcome of the whole batch.
pub fn validate_batch(ops: &[BatchOp]) -> BackendResult<()> {
    if ops.is_empty() {
        return Err(BackendError::InvalidBatch(
            "Cannot execute an empty batch".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(ops.len());
    for op in ops {
        if !seen.insert(op.key()) {
            return Err(BackendError::InvalidBatch(format!(
                "Key {} is written more than once",
                op.key()
            )));
        }
    }

    Ok(())
}
