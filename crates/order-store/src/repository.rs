use std::future::Future;
use std::time::{Duration, Instant};

use domain::Order;

use crate::{
    BackendError, FindAllPage, FindResult, KeyValueBackend, KeyValueBackendExt, OrderId, Result,
    StoreError, StoredValue,
};

/// Deadline applied to every repository call unless configured otherwise.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Name of the set tracking the key of every live order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexSet(String);

impl IndexSet {
    /// Names an index set.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the set's key.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for IndexSet {
    fn default() -> Self {
        Self::new("orders")
    }
}

impl std::fmt::Display for IndexSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key under which an order's record is stored.
pub fn order_key(id: OrderId) -> String {
    format!("order:{id}")
}

fn encode(order: &Order) -> Result<StoredValue> {
    Ok(StoredValue::new(serde_json::to_vec(order)?))
}

fn decode(key: &str, value: &StoredValue) -> Result<Order> {
    serde_json::from_slice(value.as_bytes()).map_err(|source| {
        tracing::error!(%key, error = %source, "stored order could not be decoded");
        StoreError::Corrupt {
            key: key.to_string(),
            source,
        }
    })
}

/// Persistence for orders over a key-value backend.
///
/// Each order is stored under `order:<id>` and its key is kept in an index
/// set so orders can be listed without scanning the key space. Inserts and
/// deletes change the record and the index entry in one atomic batch, so
/// the two never diverge. Updates only overwrite an existing record and
/// leave the index alone.
///
/// Every call is bounded by the request timeout. Concurrent updates to the
/// same order are last-writer-wins.
pub struct OrderRepository<B> {
    backend: B,
    index: IndexSet,
    request_timeout: Duration,
}

impl<B: KeyValueBackend> OrderRepository<B> {
    /// Creates a repository writing its index to `index`.
    pub fn new(backend: B, index: IndexSet) -> Self {
        Self {
            backend,
            index,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets the deadline applied to every call.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the index set this repository maintains.
    pub fn index(&self) -> &IndexSet {
        &self.index
    }

    /// Stores a new order and indexes it.
    ///
    /// Fails with `AlreadyExists` if a record with the same id exists; the
    /// existing record is left unmodified.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id()))]
    pub async fn insert(&self, order: &Order) -> Result<()> {
        self.run("insert", async {
            let key = order_key(order.id());
            let value = encode(order)?;

            let mut batch = self.backend.batch();
            batch
                .set_if_absent(key.as_str(), value)
                .add_to_set(self.index.name(), key.as_str());
            batch.commit().await.map_err(|err| match err {
                BackendError::KeyExists(_) => StoreError::AlreadyExists(order.id()),
                other => other.into(),
            })
        })
        .await
    }

    /// Loads one order.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_id(&self, id: OrderId) -> Result<Order> {
        self.run("find_by_id", async {
            let key = order_key(id);
            let value = self
                .backend
                .get(&key)
                .await?
                .ok_or(StoreError::NotFound(id))?;
            decode(&key, &value)
        })
        .await
    }

    /// Overwrites an existing order.
    ///
    /// Fails with `NotFound` if no record exists, without creating one.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id()))]
    pub async fn update(&self, order: &Order) -> Result<()> {
        self.run("update", async {
            let key = order_key(order.id());
            let value = encode(order)?;

            self.backend
                .set_if_present(&key, value)
                .await
                .map_err(|err| match err {
                    BackendError::KeyMissing(_) => StoreError::NotFound(order.id()),
                    other => other.into(),
                })
        })
        .await
    }

    /// Removes an order and its index entry.
    #[tracing::instrument(skip(self))]
    pub async fn delete_by_id(&self, id: OrderId) -> Result<()> {
        self.run("delete_by_id", async {
            let key = order_key(id);

            let mut batch = self.backend.batch();
            batch
                .delete(key.as_str())
                .remove_from_set(self.index.name(), key.as_str());
            batch.commit().await.map_err(|err| match err {
                BackendError::KeyMissing(_) => StoreError::NotFound(id),
                other => other.into(),
            })
        })
        .await
    }

    /// Lists one page of orders.
    ///
    /// Scans up to `page.size` index entries from `page.offset` and fetches
    /// their records in one multi-get, preserving scan order. Feed the
    /// returned cursor into the next call; `Cursor::START` means the listing
    /// is finished. Orders inserted or deleted between calls may be missed
    /// or seen twice.
    #[tracing::instrument(skip(self))]
    pub async fn find_all(&self, page: FindAllPage) -> Result<FindResult> {
        self.run("find_all", async {
            let scan = self
                .backend
                .scan_set(self.index.name(), page.offset, "*", page.size.max(1))
                .await?;

            if scan.members.is_empty() {
                return Ok(FindResult {
                    orders: Vec::new(),
                    cursor: scan.next,
                });
            }

            let values = self.backend.multi_get(&scan.members).await?;
            if values.len() != scan.members.len() {
                return Err(StoreError::Invariant(format!(
                    "requested {} records, received {}",
                    scan.members.len(),
                    values.len()
                )));
            }

            let orders = scan
                .members
                .iter()
                .zip(values)
                .map(|(key, value)| {
                    let value = value.ok_or_else(|| {
                        tracing::error!(%key, index = %self.index, "indexed order has no record");
                        StoreError::Invariant(format!("index entry {key} has no record"))
                    })?;
                    decode(key, &value)
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(FindResult {
                orders,
                cursor: scan.next,
            })
        })
        .await
    }

    async fn run<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.request_timeout, "order store call timed out");
                Err(StoreError::Timeout)
            }
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        metrics::counter!(
            "order_store_operations_total",
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!("order_store_operation_duration_seconds", "operation" => operation)
            .record(started.elapsed().as_secs_f64());

        result
    }
}
