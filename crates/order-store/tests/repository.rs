//! Integration tests for the order repository over the in-memory backend.
//!
//! These tests exercise the record/index write protocol end to end:
//! atomic inserts and deletes, conditional updates, and cursor pagination.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use domain::{CustomerId, LineItem, Order, OrderError, StatusTransition};
use order_store::{
    BackendError, BackendResult, BatchOp, Cursor, FindAllPage, InMemoryBackend, IndexSet,
    KeyValueBackend, OrderId, OrderRepository, ScanPage, StoreError, StoredValue, order_key,
};
use uuid::Uuid;

fn create_repository() -> OrderRepository<InMemoryBackend> {
    OrderRepository::new(InMemoryBackend::new(), IndexSet::default())
}

fn create_order(id: u64) -> Order {
    Order::new(
        OrderId::new(id),
        CustomerId::new(),
        vec![
            LineItem::new(Uuid::new_v4(), 2, 1999),
            LineItem::new(Uuid::new_v4(), 1, 500),
        ],
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
    )
}

async fn index_members(repo: &OrderRepository<InMemoryBackend>) -> Vec<String> {
    repo.backend().members(repo.index().name()).await.unwrap()
}

mod properties {
    use super::*;

    #[tokio::test]
    async fn inserted_order_reads_back_equal() {
        let repo = create_repository();
        let order = create_order(42);

        repo.insert(&order).await.unwrap();
        let found = repo.find_by_id(order.id()).await.unwrap();

        assert_eq!(found, order);
    }

    #[tokio::test]
    async fn second_insert_with_same_id_fails() {
        let repo = create_repository();
        let original = create_order(1);
        repo.insert(&original).await.unwrap();

        let duplicate = create_order(1);
        let result = repo.insert(&duplicate).await;

        assert!(matches!(result, Err(StoreError::AlreadyExists(id)) if id == OrderId::new(1)));
        assert_eq!(repo.find_by_id(OrderId::new(1)).await.unwrap(), original);
        assert_eq!(index_members(&repo).await, vec!["order:1"]);
    }

    #[tokio::test]
    async fn index_tracks_inserts_and_deletes() {
        let repo = create_repository();
        let order = create_order(7);

        repo.insert(&order).await.unwrap();
        assert!(index_members(&repo).await.contains(&order_key(order.id())));

        repo.delete_by_id(order.id()).await.unwrap();
        assert!(!index_members(&repo).await.contains(&order_key(order.id())));
        assert_eq!(repo.backend().key_count().await, 0);
    }

    #[tokio::test]
    async fn update_of_missing_order_creates_nothing() {
        let repo = create_repository();
        let order = create_order(99);

        let result = repo.update(&order).await;

        assert!(matches!(result, Err(StoreError::NotFound(id)) if id == OrderId::new(99)));
        assert!(matches!(
            repo.find_by_id(order.id()).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(index_members(&repo).await.is_empty());
    }

    #[tokio::test]
    async fn update_overwrites_without_touching_index() {
        let repo = create_repository();
        let mut order = create_order(3);
        repo.insert(&order).await.unwrap();

        order.ship(Utc::now()).unwrap();
        repo.update(&order).await.unwrap();

        assert_eq!(repo.find_by_id(order.id()).await.unwrap(), order);
        assert_eq!(index_members(&repo).await, vec!["order:3"]);
    }

    #[tokio::test]
    async fn last_update_wins() {
        let repo = create_repository();
        let order = create_order(4);
        repo.insert(&order).await.unwrap();

        let mut shipped_early = order.clone();
        shipped_early
            .ship(Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap())
            .unwrap();
        let mut shipped_late = order.clone();
        shipped_late
            .ship(Utc.with_ymd_and_hms(2024, 5, 3, 8, 0, 0).unwrap())
            .unwrap();

        repo.update(&shipped_early).await.unwrap();
        repo.update(&shipped_late).await.unwrap();

        assert_eq!(repo.find_by_id(order.id()).await.unwrap(), shipped_late);
    }

    #[tokio::test]
    async fn delete_of_missing_order_is_not_found() {
        let repo = create_repository();
        let result = repo.delete_by_id(OrderId::new(5)).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn failed_index_write_leaves_no_record() {
        let repo = create_repository();
        // Occupy the index key with a plain value so the set write fails.
        repo.backend()
            .set_if_absent("orders", StoredValue::from("not a set"))
            .await
            .unwrap();

        let result = repo.insert(&create_order(10)).await;

        assert!(matches!(
            result,
            Err(StoreError::Backend(BackendError::WrongType(_)))
        ));
        assert!(repo.backend().get("order:10").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_index_removal_keeps_record() {
        let backend = InMemoryBackend::new();
        let repo = OrderRepository::new(backend.clone(), IndexSet::new("orders"));
        let order = create_order(11);
        // Record present but the index key holds a plain value.
        let record = StoredValue::new(serde_json::to_vec(&order).unwrap());
        backend
            .set_if_absent(&order_key(order.id()), record)
            .await
            .unwrap();
        backend
            .set_if_absent("orders", StoredValue::from("not a set"))
            .await
            .unwrap();

        let result = repo.delete_by_id(order.id()).await;

        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert_eq!(repo.find_by_id(order.id()).await.unwrap(), order);
    }
}

mod pagination {
    use super::*;

    async fn collect_all(
        repo: &OrderRepository<InMemoryBackend>,
        size: usize,
    ) -> (Vec<OrderId>, usize) {
        let mut seen = Vec::new();
        let mut cursor = Cursor::START;
        let mut pages = 0;
        loop {
            let page = repo.find_all(FindAllPage::new(size, cursor)).await.unwrap();
            pages += 1;
            seen.extend(page.orders.iter().map(Order::id));
            if page.is_last() {
                break;
            }
            cursor = page.cursor;
        }
        (seen, pages)
    }

    #[tokio::test]
    async fn visits_every_order_exactly_once() {
        let repo = create_repository();
        for id in 1..=23 {
            repo.insert(&create_order(id)).await.unwrap();
        }

        let (seen, pages) = collect_all(&repo, 5).await;

        assert_eq!(pages, 5);
        assert_eq!(seen.len(), 23);
        let unique: HashSet<_> = seen.iter().copied().collect();
        assert_eq!(unique.len(), 23);
        assert!((1..=23).all(|id| unique.contains(&OrderId::new(id))));
    }

    #[tokio::test]
    async fn page_preserves_scan_order() {
        let repo = create_repository();
        for id in [30, 10, 20] {
            repo.insert(&create_order(id)).await.unwrap();
        }

        let page = repo.find_all(FindAllPage::first(10)).await.unwrap();
        let scan = repo
            .backend()
            .scan_set("orders", Cursor::START, "*", 10)
            .await
            .unwrap();

        let keys: Vec<String> = page.orders.iter().map(|o| order_key(o.id())).collect();
        assert_eq!(keys, scan.members);
        assert!(page.is_last());
    }

    #[tokio::test]
    async fn deleting_during_listing_keeps_untouched_orders() {
        let repo = create_repository();
        for id in 1..=6 {
            repo.insert(&create_order(id)).await.unwrap();
        }

        let first = repo.find_all(FindAllPage::first(2)).await.unwrap();
        assert_eq!(first.orders.len(), 2);
        let deleted = first.orders[0].id();
        repo.delete_by_id(deleted).await.unwrap();

        let mut seen: Vec<OrderId> = first.orders.iter().map(Order::id).collect();
        let mut cursor = first.cursor;
        while !cursor.is_start() {
            let page = repo.find_all(FindAllPage::new(2, cursor)).await.unwrap();
            seen.extend(page.orders.iter().map(Order::id));
            cursor = page.cursor;
        }

        for id in (1..=6).map(OrderId::new).filter(|id| *id != deleted) {
            assert_eq!(
                seen.iter().filter(|other| **other == id).count(),
                1,
                "order {id} was present for the whole listing"
            );
        }
    }

    #[tokio::test]
    async fn deleted_orders_drop_out_of_listing() {
        let repo = create_repository();
        for id in 1..=4 {
            repo.insert(&create_order(id)).await.unwrap();
        }
        repo.delete_by_id(OrderId::new(2)).await.unwrap();

        let (seen, _) = collect_all(&repo, 10).await;
        let seen: HashSet<_> = seen.into_iter().collect();
        assert_eq!(seen.len(), 3);
        assert!(!seen.contains(&OrderId::new(2)));
    }
}

mod scenario {
    use super::*;

    #[tokio::test]
    async fn order_lifecycle_through_the_repository() {
        let repo = create_repository();
        let order = create_order(1);

        // Insert
        repo.insert(&order).await.unwrap();
        let stored = repo.find_by_id(OrderId::new(1)).await.unwrap();
        assert_eq!(stored.line_items().len(), 2);

        // Duplicate insert
        assert!(matches!(
            repo.insert(&order).await,
            Err(StoreError::AlreadyExists(_))
        ));

        // Ship
        let mut current = repo.find_by_id(OrderId::new(1)).await.unwrap();
        let shipped_at = Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap();
        current.apply(StatusTransition::Ship, shipped_at).unwrap();
        repo.update(&current).await.unwrap();
        assert_eq!(
            repo.find_by_id(OrderId::new(1)).await.unwrap().shipped_at(),
            Some(shipped_at)
        );

        // Ship again
        let mut current = repo.find_by_id(OrderId::new(1)).await.unwrap();
        let again = current.apply(StatusTransition::Ship, Utc::now());
        assert_eq!(again, Err(OrderError::AlreadyShipped));
        assert_eq!(
            repo.find_by_id(OrderId::new(1)).await.unwrap().shipped_at(),
            Some(shipped_at)
        );

        // Complete
        let completed_at = Utc.with_ymd_and_hms(2024, 5, 3, 10, 0, 0).unwrap();
        current
            .apply(StatusTransition::Complete, completed_at)
            .unwrap();
        repo.update(&current).await.unwrap();
        assert_eq!(
            repo.find_by_id(OrderId::new(1)).await.unwrap().completed_at(),
            Some(completed_at)
        );

        // Delete
        repo.delete_by_id(OrderId::new(1)).await.unwrap();
        assert!(matches!(
            repo.find_by_id(OrderId::new(1)).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(!index_members(&repo).await.contains(&"order:1".to_string()));
    }
}

/// Backend that misbehaves in one configurable way.
struct FaultyBackend {
    inner: InMemoryBackend,
    fault: Fault,
}

enum Fault {
    /// Lookups and scans sleep before answering.
    SlowReads(Duration),
    /// Multi-gets drop their last value.
    ShortMultiGet,
}

impl FaultyBackend {
    async fn slow_reads(&self) {
        if let Fault::SlowReads(delay) = self.fault {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl KeyValueBackend for FaultyBackend {
    async fn set_if_absent(&self, key: &str, value: StoredValue) -> BackendResult<()> {
        self.inner.set_if_absent(key, value).await
    }

    async fn set_if_present(&self, key: &str, value: StoredValue) -> BackendResult<()> {
        self.inner.set_if_present(key, value).await
    }

    async fn get(&self, key: &str) -> BackendResult<Option<StoredValue>> {
        self.slow_reads().await;
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        self.inner.delete(key).await
    }

    async fn add_to_set(&self, set: &str, member: &str) -> BackendResult<()> {
        self.inner.add_to_set(set, member).await
    }

    async fn remove_from_set(&self, set: &str, member: &str) -> BackendResult<()> {
        self.inner.remove_from_set(set, member).await
    }

    async fn scan_set(
        &self,
        set: &str,
        cursor: Cursor,
        pattern: &str,
        count: usize,
    ) -> BackendResult<ScanPage> {
        self.slow_reads().await;
        self.inner.scan_set(set, cursor, pattern, count).await
    }

    async fn multi_get(&self, keys: &[String]) -> BackendResult<Vec<Option<StoredValue>>> {
        let mut values = self.inner.multi_get(keys).await?;
        if let Fault::ShortMultiGet = self.fault {
            values.pop();
        }
        Ok(values)
    }

    async fn execute_atomic(&self, ops: Vec<BatchOp>) -> BackendResult<()> {
        self.inner.execute_atomic(ops).await
    }
}

fn faulty_repository(fault: Fault) -> OrderRepository<FaultyBackend> {
    let backend = FaultyBackend {
        inner: InMemoryBackend::new(),
        fault,
    };
    OrderRepository::new(backend, IndexSet::default())
}

mod divergence {
    use super::*;

    #[tokio::test]
    async fn short_multi_get_is_an_invariant_failure() {
        let repo = faulty_repository(Fault::ShortMultiGet);
        for id in 1..=3 {
            repo.insert(&create_order(id)).await.unwrap();
        }

        let result = repo.find_all(FindAllPage::first(10)).await;

        assert!(matches!(result, Err(StoreError::Invariant(_))));
    }

    #[tokio::test]
    async fn undecodable_indexed_record_is_corrupt() {
        let repo = create_repository();
        repo.insert(&create_order(1)).await.unwrap();
        repo.insert(&create_order(2)).await.unwrap();
        repo.backend()
            .set_if_present("order:2", StoredValue::from("not json"))
            .await
            .unwrap();

        let result = repo.find_all(FindAllPage::first(10)).await;

        assert!(matches!(result, Err(StoreError::Corrupt { ref key, .. }) if key == "order:2"));
    }
}

mod deadlines {
    use super::*;

    fn stalled_repository() -> OrderRepository<FaultyBackend> {
        faulty_repository(Fault::SlowReads(Duration::from_millis(500)))
            .with_request_timeout(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn slow_lookup_times_out() {
        let repo = stalled_repository();
        repo.insert(&create_order(1)).await.unwrap();

        let result = repo.find_by_id(OrderId::new(1)).await;
        assert!(matches!(result, Err(StoreError::Timeout)));
    }

    #[tokio::test]
    async fn slow_listing_times_out() {
        let repo = stalled_repository();
        let result = repo.find_all(FindAllPage::first(10)).await;
        assert!(matches!(result, Err(StoreError::Timeout)));
    }

    #[tokio::test]
    async fn timeout_is_distinct_from_not_found() {
        let repo = stalled_repository();
        let result = repo.find_by_id(OrderId::new(404)).await;
        assert!(matches!(result, Err(StoreError::Timeout)));
        assert_eq!(result.unwrap_err().kind(), "timeout");
    }
}
