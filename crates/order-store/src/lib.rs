pub mod backend;
pub mod batch;
pub mod error;
pub mod memory;
pub mod page;
pub mod redis_backend;
pub mod repository;

pub use backend::{
    BackendError, BackendResult, BatchOp, Cursor, KeyValueBackend, KeyValueBackendExt, ScanPage,
    StoredValue,
};
pub use batch::AtomicBatch;
pub use common::OrderId;
pub use error::{Result, StoreError};
pub use memory::InMemoryBackend;
pub use page::{FindAllPage, FindResult};
pub use redis_backend::RedisBackend;
pub use repository::{DEFAULT_REQUEST_TIMEOUT, IndexSet, OrderRepository, order_key};
