//! Application state shared across handlers.

use std::sync::Arc;

use crate::services::OrderService;
use crate::store::OrderStore;

/// Application state shared across all handlers.
///
/// Cheaply cloneable; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn OrderStore>,
    orders: OrderService,
}

impl AppState {
    /// Build state over `store`, with `orders` using the same store.
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, orders: OrderService) -> Self {
        Self {
            inner: Arc::new(AppStateInner { store, orders }),
        }
    }

    /// The order service.
    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &dyn OrderStore {
        self.inner.store.as_ref()
    }
}
