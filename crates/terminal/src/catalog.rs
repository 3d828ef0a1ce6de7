//! Product reads and the locally cached stock view.
//!
//! Snapshots are cached for five minutes; a snapshot is immutable once
//! handed to a cart, so seeing fresher stock means fetching again (or a
//! checkout decrementing the cached count).

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use till_core::{Money, ProductId};
use tracing::{debug, instrument};

use crate::client::ApiClient;
use crate::error::ApiError;

const CACHE_CAPACITY: u64 = 1000;
const CACHE_TTL: Duration = Duration::from_secs(300); // 5 minutes

/// A product as known at fetch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Price per unit.
    pub unit_price: Money,
    /// Units sellable right now. Carts enforce this as a ceiling.
    pub available_stock: u32,
    /// Product category, if assigned.
    #[serde(default)]
    pub category: Option<String>,
}

/// Read path for products, shared by carts and screens.
#[derive(Clone)]
pub struct CatalogGateway {
    inner: Arc<CatalogGatewayInner>,
}

struct CatalogGatewayInner {
    api: ApiClient,
    cache: Cache<ProductId, ProductSnapshot>,
}

impl CatalogGateway {
    /// Create a new catalog gateway on top of `api`.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(CatalogGatewayInner { api, cache }),
        }
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the product does not exist; auth
    /// errors propagate unchanged from the client.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn fetch_product(&self, id: &ProductId) -> Result<ProductSnapshot, ApiError> {
        if let Some(snapshot) = self.inner.cache.get(id).await {
            debug!("cache hit for product");
            return Ok(snapshot);
        }

        let snapshot: ProductSnapshot = match self
            .inner
            .api
            .get_json(&format!("/products/{id}"))
            .await
        {
            Ok(snapshot) => snapshot,
            Err(ApiError::NotFound(_)) => {
                return Err(ApiError::NotFound(format!("Product not found: {id}")));
            }
            Err(e) => return Err(e),
        };

        self.inner.cache.insert(id.clone(), snapshot.clone()).await;
        Ok(snapshot)
    }

    /// Decrement the cached stock for `id` by `quantity`, never below zero.
    ///
    /// Called by checkout after a committed sale so the next add-to-cart
    /// sees the reduced count without a refetch. A product that is not
    /// cached has nothing to decrement.
    pub async fn decrement_stock(&self, id: &ProductId, quantity: u32) {
        if let Some(mut snapshot) = self.inner.cache.get(id).await {
            snapshot.available_stock = snapshot.available_stock.saturating_sub(quantity);
            self.inner.cache.insert(id.clone(), snapshot).await;
        }
    }

    /// Invalidate a cached product.
    pub async fn invalidate(&self, id: &ProductId) {
        self.inner.cache.invalidate(id).await;
    }

    /// Invalidate all cached products.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_snapshot_deserializes_wire_shape() {
        let snapshot: ProductSnapshot = serde_json::from_str(
            r#"{
                "id": "p-100",
                "name": "Espresso Beans 1kg",
                "unit_price": "18.50",
                "available_stock": 12,
                "category": "coffee"
            }"#,
        )
        .expect("deserialize");

        assert_eq!(snapshot.id, ProductId::new("p-100"));
        assert_eq!(snapshot.unit_price, "18.50".parse().expect("money"));
        assert_eq!(snapshot.available_stock, 12);
    }

    #[test]
    fn test_category_is_optional() {
        let snapshot: ProductSnapshot = serde_json::from_str(
            r#"{"id": "p-1", "name": "Widget", "unit_price": "1.00", "available_stock": 0}"#,
        )
        .expect("deserialize");
        assert!(snapshot.category.is_none());
    }
}
