use std::sync::Arc;

use bistro_common::Lookup;
use bistro_db::collections::CARTS;
use bistro_db::{Collection, Filter, RecordStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::model::{Cart, CartItem, line_total, now};
use crate::outcome::{check_id, settle, settle_option};
use crate::product::ProductService;

/// One cart per user, created lazily. `totalAmount` is recomputed from the
/// lines on every write.
#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn RecordStore>,
    products: ProductService,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CartContents<'a> {
    items: &'a [CartItem],
    total_amount: f64,
    #[serde(with = "bistro_common::timestamp")]
    updated_at: DateTime<Utc>,
}

impl<'a> CartContents<'a> {
    fn of(items: &'a [CartItem]) -> Self {
        Self {
            items,
            total_amount: line_total(items),
            updated_at: now(),
        }
    }
}

impl CartService {
    pub fn new(store: Arc<dyn RecordStore>, products: ProductService) -> Self {
        Self { store, products }
    }

    fn carts(&self) -> Collection<'_> {
        Collection::new(self.store.as_ref(), CARTS)
    }

    pub async fn get_or_create(&self, user_id: &str) -> Lookup<Cart> {
        if let Err(invalid) = check_id(user_id) {
            return invalid;
        }
        let existing = settle(
            "get cart",
            self.carts().find_one(&Filter::eq("userId", user_id)).await,
        );
        match existing.cast() {
            Ok(Some(cart)) => return Lookup::Found(cart),
            Ok(None) => {}
            Err(outcome) => return outcome,
        }

        let stamp = now();
        let mut cart = Cart {
            id: String::new(),
            user_id: user_id.to_string(),
            items: Vec::new(),
            total_amount: 0.0,
            created_at: stamp,
            updated_at: stamp,
        };
        settle("create cart", self.carts().insert_one(&cart).await).map(|id| {
            cart.id = id;
            cart
        })
    }

    pub async fn get(&self, user_id: &str) -> Lookup<Cart> {
        self.get_or_create(user_id).await
    }

    /// Add `quantity` of a product, merging into an existing line.
    ///
    /// The product must exist and be available. A new line snapshots the
    /// product's name and price.
    pub async fn add(&self, user_id: &str, product_id: &str, quantity: u32) -> Lookup<Cart> {
        if let Err(invalid) = check_id(user_id) {
            return invalid;
        }
        if quantity == 0 {
            return Lookup::invalid("quantity must be greater than zero");
        }
        let product = match self.products.get(product_id).await.cast() {
            Ok(product) => product,
            Err(outcome) => return outcome,
        };
        if !product.available {
            return Lookup::invalid(format!("product {} is not available", product.name));
        }
        let mut cart = match self.get_or_create(user_id).await.cast() {
            Ok(cart) => cart,
            Err(outcome) => return outcome,
        };

        match cart.items.iter_mut().find(|line| line.product_id == product.id) {
            Some(line) => match line.quantity.checked_add(quantity) {
                Some(merged) => line.quantity = merged,
                None => return Lookup::invalid("quantity too large"),
            },
            None => cart.items.push(CartItem {
                product_id: product.id.clone(),
                name: product.name.clone(),
                price: product.price,
                quantity,
            }),
        }
        self.save("add to cart", &cart).await
    }

    /// Drop every line for `product_id`. Removing an absent product leaves
    /// the cart unchanged apart from `updatedAt`.
    pub async fn remove(&self, user_id: &str, product_id: &str) -> Lookup<Cart> {
        if let Err(invalid) = check_id(product_id) {
            return invalid;
        }
        let mut cart = match self.get_or_create(user_id).await.cast() {
            Ok(cart) => cart,
            Err(outcome) => return outcome,
        };
        cart.items.retain(|line| line.product_id != product_id);
        self.save("remove from cart", &cart).await
    }

    /// Empty the user's cart. `NotFound` when the user has no cart.
    pub async fn clear(&self, user_id: &str) -> Lookup<()> {
        if let Err(invalid) = check_id(user_id) {
            return invalid;
        }
        let contents = CartContents::of(&[]);
        match settle(
            "clear cart",
            self.carts()
                .update_one(&Filter::eq("userId", user_id), &contents)
                .await,
        ) {
            Lookup::Found(result) if result.matched == 1 => Lookup::Found(()),
            Lookup::Found(_) => Lookup::NotFound,
            other => other.map(|_| ()),
        }
    }

    async fn save(&self, op: &str, cart: &Cart) -> Lookup<Cart> {
        let contents = CartContents::of(&cart.items);
        let saved = settle_option(
            op,
            self.carts()
                .find_one_and_update(&Filter::id(&cart.id), &contents)
                .await,
        );
        if saved == Lookup::NotFound {
            warn!("cart {} vanished during {op}", cart.id);
        }
        saved
    }
}
