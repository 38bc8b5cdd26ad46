//! In-memory order store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use sellsync_core::types::{OrderId, UserId};
use sellsync_core::AppResult;
use sellsync_entity::action::Marketplace;
use sellsync_entity::order::{MarketplaceOrder, UpsertOrder};

use crate::store::{OrderStore, UpsertStrategy};

type NaturalKey = (UserId, Marketplace, String);

/// [`OrderStore`] backed by a hash map keyed on the natural key.
///
/// The store lock serializes writers, so both upsert strategies take the
/// same path here.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<NaturalKey, MarketplaceOrder>>,
}

impl MemoryOrderStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn upsert(
        &self,
        order: &UpsertOrder,
        _strategy: UpsertStrategy,
    ) -> AppResult<MarketplaceOrder> {
        let key = (
            order.user_id,
            order.marketplace,
            order.external_id.clone(),
        );
        let mut orders = self.orders.write().await;
        let now = Utc::now();

        let row = match orders.get_mut(&key) {
            Some(existing) => {
                existing.status = order.status.clone();
                existing.buyer_username = order.buyer_username.clone();
                existing.total_cents = order.total_cents;
                existing.currency = order.currency.clone();
                existing.raw_data = order.raw_data.clone();
                existing.placed_at = order.placed_at;
                existing.fetched_at = now;
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let row = MarketplaceOrder {
                    id: OrderId::new(),
                    user_id: order.user_id,
                    marketplace: order.marketplace,
                    external_id: order.external_id.clone(),
                    status: order.status.clone(),
                    buyer_username: order.buyer_username.clone(),
                    total_cents: order.total_cents,
                    currency: order.currency.clone(),
                    raw_data: order.raw_data.clone(),
                    placed_at: order.placed_at,
                    fetched_at: now,
                    created_at: now,
                    updated_at: now,
                };
                orders.insert(key, row.clone());
                row
            }
        };

        Ok(row)
    }

    async fn find_by_natural_key(
        &self,
        user_id: UserId,
        marketplace: Marketplace,
        external_id: &str,
    ) -> AppResult<Option<MarketplaceOrder>> {
        let key = (user_id, marketplace, external_id.to_string());
        Ok(self.orders.read().await.get(&key).cloned())
    }

    async fn count_for_user(&self, user_id: UserId) -> AppResult<i64> {
        let orders = self.orders.read().await;
        Ok(orders.values().filter(|o| o.user_id == user_id).count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn make_order(user_id: UserId, external_id: &str, status: &str) -> UpsertOrder {
        UpsertOrder {
            user_id,
            marketplace: Marketplace::Vinted,
            external_id: external_id.to_string(),
            status: status.to_string(),
            buyer_username: Some("coat_fan_99".to_string()),
            total_cents: 4250,
            currency: "EUR".to_string(),
            raw_data: serde_json::json!({"id": external_id, "status": status}),
            placed_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_then_refresh_keeps_one_row() {
        let store = MemoryOrderStore::new();
        let user_id = UserId::new();

        let inserted = store
            .upsert(&make_order(user_id, "V-1001", "paid"), UpsertStrategy::Optimistic)
            .await
            .unwrap();
        let refreshed = store
            .upsert(&make_order(user_id, "V-1001", "shipped"), UpsertStrategy::Optimistic)
            .await
            .unwrap();

        assert_eq!(refreshed.id, inserted.id);
        assert_eq!(refreshed.status, "shipped");
        assert_eq!(store.count_for_user(user_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_same_external_id_differs_per_user_and_marketplace() {
        let store = MemoryOrderStore::new();
        let alice = UserId::new();
        let bob = UserId::new();

        store
            .upsert(&make_order(alice, "V-1001", "paid"), UpsertStrategy::Optimistic)
            .await
            .unwrap();
        store
            .upsert(&make_order(bob, "V-1001", "paid"), UpsertStrategy::Optimistic)
            .await
            .unwrap();

        let mut depop = make_order(alice, "V-1001", "paid");
        depop.marketplace = Marketplace::Depop;
        store
            .upsert(&depop, UpsertStrategy::Pessimistic)
            .await
            .unwrap();

        assert_eq!(store.count_for_user(alice).await.unwrap(), 2);
        assert_eq!(store.count_for_user(bob).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_converge_to_one_row() {
        let store = Arc::new(MemoryOrderStore::new());
        let user_id = UserId::new();

        let tasks = (0..8).map(|i| {
            let store = Arc::clone(&store);
            let strategy = if i % 2 == 0 {
                UpsertStrategy::Optimistic
            } else {
                UpsertStrategy::Pessimistic
            };
            tokio::spawn(async move {
                let order = make_order(user_id, "V-2002", &format!("update-{i}"));
                store.upsert(&order, strategy).await
            })
        });

        for task in futures::future::join_all(tasks).await {
            task.unwrap().unwrap();
        }

        assert_eq!(store.count_for_user(user_id).await.unwrap(), 1);
        let row = store
            .find_by_natural_key(user_id, Marketplace::Vinted, "V-2002")
            .await
            .unwrap()
            .unwrap();
        assert!(row.status.starts_with("update-"));
    }
}
