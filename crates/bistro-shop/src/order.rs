use std::sync::Arc;

use bistro_common::Lookup;
use bistro_db::collections::ORDERS;
use bistro_db::{Collection, Filter, FindOptions, RecordStore, SortOrder};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::cart::CartService;
use crate::model::{Order, OrderStatus, now};
use crate::outcome::{check_id, settle, settle_option};
use crate::user::UserService;

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn RecordStore>,
    carts: CartService,
    users: UserService,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusChange {
    status: OrderStatus,
    #[serde(with = "bistro_common::timestamp")]
    updated_at: DateTime<Utc>,
}

impl OrderService {
    pub fn new(store: Arc<dyn RecordStore>, carts: CartService, users: UserService) -> Self {
        Self {
            store,
            carts,
            users,
        }
    }

    fn orders(&self) -> Collection<'_> {
        Collection::new(self.store.as_ref(), ORDERS)
    }

    /// Check out the user's cart into a new `pending` order, then empty the
    /// cart. Items and total are copied, so later catalog changes do not
    /// affect the order.
    pub async fn create_from_cart(&self, user_id: &str, notes: Option<&str>) -> Lookup<Order> {
        if let Err(invalid) = check_id(user_id) {
            return invalid;
        }
        let cart = match self.carts.get(user_id).await.cast() {
            Ok(cart) => cart,
            Err(outcome) => return outcome,
        };
        let user = match self.users.get(user_id).await.cast() {
            Ok(user) => user,
            Err(outcome) => return outcome,
        };
        if cart.items.is_empty() {
            return Lookup::invalid("cart is empty");
        }

        let stamp = now();
        let mut order = Order {
            id: String::new(),
            user_id: user.id,
            user_name: user.name,
            user_cellphone: user.cellphone,
            items: cart.items,
            total_amount: cart.total_amount,
            status: OrderStatus::Pending,
            notes: notes.unwrap_or_default().to_string(),
            created_at: stamp,
            updated_at: stamp,
        };
        order.id = match settle("create order", self.orders().insert_one(&order).await).cast() {
            Ok(id) => id,
            Err(outcome) => return outcome,
        };
        info!(
            "order {} placed by {} for {:.2}",
            order.id, order.user_id, order.total_amount
        );

        if !self.carts.clear(user_id).await.is_found() {
            warn!("order {} created but cart for {user_id} was not cleared", order.id);
        }
        Lookup::Found(order)
    }

    /// The user's orders, newest first.
    pub async fn for_user(&self, user_id: &str) -> Lookup<Vec<Order>> {
        if let Err(invalid) = check_id(user_id) {
            return invalid;
        }
        self.find("get user orders", Filter::eq("userId", user_id), None)
            .await
    }

    /// Every order, newest first.
    pub async fn all(&self) -> Lookup<Vec<Order>> {
        self.find("get all orders", Filter::All, None).await
    }

    /// The `limit` newest orders.
    pub async fn recent(&self, limit: usize) -> Lookup<Vec<Order>> {
        self.find("get recent orders", Filter::All, Some(limit))
            .await
    }

    pub async fn by_status(&self, status: OrderStatus) -> Lookup<Vec<Order>> {
        self.find(
            "get orders by status",
            Filter::eq("status", status.as_str()),
            None,
        )
        .await
    }

    pub async fn get(&self, order_id: &str) -> Lookup<Order> {
        if let Err(invalid) = check_id(order_id) {
            return invalid;
        }
        settle_option("get order", self.orders().find_one(&Filter::id(order_id)).await)
    }

    /// Set the order's status and return the updated order.
    pub async fn update_status(&self, order_id: &str, status: OrderStatus) -> Lookup<Order> {
        if let Err(invalid) = check_id(order_id) {
            return invalid;
        }
        let change = StatusChange {
            status,
            updated_at: now(),
        };
        let updated = settle_option(
            "update order status",
            self.orders()
                .find_one_and_update(&Filter::id(order_id), &change)
                .await,
        );
        if updated.is_found() {
            info!("order {order_id} is now {status}");
        }
        updated
    }

    async fn find(&self, op: &str, filter: Filter, limit: Option<usize>) -> Lookup<Vec<Order>> {
        let mut options = FindOptions::sort_by("createdAt", SortOrder::Desc);
        if let Some(limit) = limit {
            options = options.limit(limit);
        }
        settle(op, self.orders().find(&filter, &options).await)
    }
}

#[cfg(test)]
mod tests {
    use bistro_common::new_record_id;
    use bistro_db::SqliteStore;

    use super::*;
    use crate::model::{NewProduct, ProductUpdate};
    use crate::product::ProductService;

    struct Fixture {
        products: ProductService,
        users: UserService,
        carts: CartService,
        orders: OrderService,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let products = ProductService::new(store.clone());
        let users = UserService::new(store.clone());
        let carts = CartService::new(store.clone(), products.clone());
        let orders = OrderService::new(store, carts.clone(), users.clone());
        Fixture {
            products,
            users,
            carts,
            orders,
        }
    }

    async fn stocked(f: &Fixture, price: f64) -> (String, String) {
        let user = f.users.login("Jane", "+1555").await.found().unwrap().user;
        let product = f
            .products
            .create(NewProduct {
                name: "Lasagna".into(),
                description: "Layered".into(),
                price,
                category: "Pasta".into(),
                image_url: None,
                available: true,
            })
            .await
            .found()
            .unwrap();
        (user.id, product.id)
    }

    #[tokio::test]
    async fn checkout_creates_pending_order_and_clears_cart() {
        let f = fixture();
        let (user, product) = stocked(&f, 10.99).await;
        f.carts.add(&user, &product, 2).await.found().unwrap();

        let order = f
            .orders
            .create_from_cart(&user, Some("no onions"))
            .await
            .found()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, 21.98);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.user_name, "jane");
        assert_eq!(order.notes, "no onions");

        let cart = f.carts.get(&user).await.found().unwrap();
        assert!(cart.items.is_empty());
        assert_eq!(cart.total_amount, 0.0);

        assert_eq!(f.orders.get(&order.id).await.found().unwrap(), order);
    }

    #[tokio::test]
    async fn checkout_requires_items_and_known_user() {
        let f = fixture();
        let (user, product) = stocked(&f, 5.0).await;
        assert!(matches!(
            f.orders.create_from_cart(&user, None).await,
            Lookup::Invalid(_)
        ));

        let stranger = new_record_id();
        f.carts.add(&stranger, &product, 1).await.found().unwrap();
        assert_eq!(
            f.orders.create_from_cart(&stranger, None).await,
            Lookup::NotFound
        );
        assert!(matches!(
            f.orders.create_from_cart("bad", None).await,
            Lookup::Invalid(_)
        ));
    }

    #[tokio::test]
    async fn order_is_isolated_from_later_price_changes() {
        let f = fixture();
        let (user, product) = stocked(&f, 12.0).await;
        f.carts.add(&user, &product, 1).await.found().unwrap();
        let order = f.orders.create_from_cart(&user, None).await.found().unwrap();

        let update = ProductUpdate {
            price: Some(99.0),
            ..Default::default()
        };
        f.products.update(&product, &update).await.found().unwrap();

        let stored = f.orders.get(&order.id).await.found().unwrap();
        assert_eq!(stored.items[0].price, 12.0);
        assert_eq!(stored.total_amount, 12.0);
    }

    #[tokio::test]
    async fn listings_are_newest_first_and_filter_by_status() {
        let f = fixture();
        let (user, product) = stocked(&f, 3.0).await;
        let mut placed = Vec::new();
        for _ in 0..3 {
            f.carts.add(&user, &product, 1).await.found().unwrap();
            placed.push(f.orders.create_from_cart(&user, None).await.found().unwrap());
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let mine = f.orders.for_user(&user).await.found().unwrap();
        let ids: Vec<_> = mine.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                placed[2].id.as_str(),
                placed[1].id.as_str(),
                placed[0].id.as_str()
            ]
        );
        assert_eq!(f.orders.all().await.found().unwrap().len(), 3);
        assert_eq!(f.orders.recent(2).await.found().unwrap().len(), 2);

        let accepted = f
            .orders
            .update_status(&placed[0].id, OrderStatus::Accepted)
            .await
            .found()
            .unwrap();
        assert_eq!(accepted.status, OrderStatus::Accepted);

        let by_status = f.orders.by_status(OrderStatus::Accepted).await.found().unwrap();
        assert_eq!(by_status.len(), 1);
        assert_eq!(by_status[0].id, placed[0].id);
        let pending = f.orders.by_status(OrderStatus::Pending).await.found().unwrap();
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn update_status_of_missing_order_is_not_found() {
        let f = fixture();
        assert_eq!(
            f.orders
                .update_status(&new_record_id(), OrderStatus::Completed)
                .await,
            Lookup::NotFound
        );
    }
}
