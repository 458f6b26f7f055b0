//! Restaurant domain services over a shared [`RecordStore`].
//!
//! Every operation returns a [`Lookup`] instead of raising: store failures
//! are logged here and surface as `Lookup::Failed`.

pub mod cart;
pub mod dashboard;
pub mod model;
pub mod order;
mod outcome;
pub mod product;
pub mod user;

use std::sync::Arc;

use bistro_common::Lookup;
use bistro_db::RecordStore;

pub use cart::CartService;
pub use dashboard::{Dashboard, DashboardStats};
pub use model::{
    Cart, CartItem, NewProduct, Order, OrderStatus, Product, ProductFilters, ProductUpdate, User,
    UserType,
};
pub use order::OrderService;
pub use product::ProductService;
pub use user::{Login, UserService};

/// The four services wired to one store.
#[derive(Clone)]
pub struct Shop {
    pub products: ProductService,
    pub users: UserService,
    pub carts: CartService,
    pub orders: OrderService,
}

impl Shop {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let products = ProductService::new(store.clone());
        let users = UserService::new(store.clone());
        let carts = CartService::new(store.clone(), products.clone());
        let orders = OrderService::new(store, carts.clone(), users.clone());
        Self {
            products,
            users,
            carts,
            orders,
        }
    }

    pub async fn dashboard(&self) -> Lookup<Dashboard> {
        let orders = match self.orders.all().await.cast() {
            Ok(orders) => orders,
            Err(outcome) => return outcome,
        };
        let products = match self.products.list(&ProductFilters::default()).await.cast() {
            Ok(products) => products,
            Err(outcome) => return outcome,
        };
        Lookup::Found(dashboard::summarize(orders, &products))
    }
}

#[cfg(test)]
mod tests {
    use bistro_db::{MigrationRunner, Registry, SqliteStore};

    use super::*;

    #[tokio::test]
    async fn dashboard_over_seeded_catalog() {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let registry = Registry::builtin().unwrap();
        MigrationRunner::new(store.clone())
            .run_all(registry.units())
            .await
            .unwrap();

        let shop = Shop::new(store);
        let user = shop.users.login("Guest", "+1222").await.found().unwrap().user;
        let menu = shop
            .products
            .list(&ProductFilters::default())
            .await
            .found()
            .unwrap();
        assert!(!menu.is_empty());

        shop.carts.add(&user.id, &menu[0].id, 2).await.found().unwrap();
        let order = shop
            .orders
            .create_from_cart(&user.id, None)
            .await
            .found()
            .unwrap();
        shop.orders
            .update_status(&order.id, OrderStatus::Completed)
            .await
            .found()
            .unwrap();

        let dash = shop.dashboard().await.found().unwrap();
        assert_eq!(dash.stats.total_orders, 1);
        assert_eq!(dash.stats.completed_orders, 1);
        assert_eq!(dash.stats.total_products, menu.len());
        assert_eq!(dash.stats.total_revenue, order.total_amount);
        assert_eq!(dash.recent_orders[0].id, order.id);
    }
}
