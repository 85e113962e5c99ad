use crate::{BackendResult, BatchOp, KeyValueBackend, StoredValue};

/// A scoped group of writes that commit together or not at all.
///
/// Writes are only queued until [`AtomicBatch::commit`] hands them to the
/// backend in one atomic execution. A batch dropped without a commit, for
/// instance on an early `?` return, discards its queue and leaves the store
/// untouched.
pub struct AtomicBatch<'a, B: KeyValueBackend + ?Sized> {
    backend: &'a B,
    ops: Vec<BatchOp>,
}

impl<'a, B: KeyValueBackend + ?Sized> AtomicBatch<'a, B> {
    /// Opens an empty batch against `backend`.
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            ops: Vec::new(),
        }
    }

    /// Queues a write that requires `key` to be absent.
    pub fn set_if_absent(&mut self, key: impl Into<String>, value: StoredValue) -> &mut Self {
        self.ops.push(BatchOp::SetIfAbsent {
            key: key.into(),
            value,
        });
        self
    }

    /// Queues an overwrite that requires `key` to exist.
    pub fn set_if_present(&mut self, key: impl Into<String>, value: StoredValue) -> &mut Self {
        self.ops.push(BatchOp::SetIfPresent {
            key: key.into(),
            value,
        });
        self
    }

    /// Queues the removal of `key`, which must exist.
    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(BatchOp::Delete { key: key.into() });
        self
    }

    /// Queues adding `member` to `set`.
    pub fn add_to_set(&mut self, set: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.ops.push(BatchOp::AddToSet {
            set: set.into(),
            member: member.into(),
        });
        self
    }

    /// Queues removing `member` from `set`.
    pub fn remove_from_set(
        &mut self,
        set: impl Into<String>,
        member: impl Into<String>,
    ) -> &mut Self {
        self.ops.push(BatchOp::RemoveFromSet {
            set: set.into(),
            member: member.into(),
        });
        self
    }

    /// Number of queued writes.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Drops every queued write without touching the store.
    pub fn discard(mut self) {
        self.ops.clear();
    }

    /// Applies every queued write atomically.
    ///
    /// Committing an empty batch is a no-op.
    pub async fn commit(mut self) -> BackendResult<()> {
        let ops = std::mem::take(&mut self.ops);
        if ops.is_empty() {
            return Ok(());
        }
        self.backend.execute_atomic(ops).await
    }
}

impl<B: KeyValueBackend + ?Sized> Drop for AtomicBatch<'_, B> {
    fn drop(&mut self) {
        if !self.ops.is_empty() {
            tracing::debug!(
                discarded = self.ops.len(),
                "atomic batch dropped without commit"
            );
        }
    }
}
