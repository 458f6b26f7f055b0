use std::sync::Arc;

use bistro_common::Lookup;
use bistro_db::collections::PRODUCTS;
use bistro_db::{Collection, Filter, FindOptions, RecordStore};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{now, NewProduct, Product, ProductFilters, ProductUpdate};
use crate::outcome::{check_id, settle, settle_option};

/// Catalog reads for customers and writes for administrators.
#[derive(Clone)]
pub struct ProductService {
    store: Arc<dyn RecordStore>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductChanges<'a> {
    #[serde(flatten)]
    update: &'a ProductUpdate,
    #[serde(with = "bistro_common::timestamp")]
    updated_at: DateTime<Utc>,
}

impl ProductService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    fn products(&self) -> Collection<'_> {
        Collection::new(self.store.as_ref(), PRODUCTS)
    }

    pub async fn list(&self, filters: &ProductFilters) -> Lookup<Vec<Product>> {
        let filter = catalog_filter(filters);
        settle(
            "list products",
            self.products().find(&filter, &FindOptions::default()).await,
        )
    }

    pub async fn get(&self, product_id: &str) -> Lookup<Product> {
        if let Err(invalid) = check_id(product_id) {
            return invalid;
        }
        settle_option(
            "get product",
            self.products().find_one(&Filter::id(product_id)).await,
        )
    }

    pub async fn create(&self, input: NewProduct) -> Lookup<Product> {
        if let Err(reason) = validate_new(&input) {
            return Lookup::Invalid(reason);
        }
        let stamp = now();
        let mut product = Product {
            id: String::new(),
            name: input.name.trim().to_string(),
            description: input.description.trim().to_string(),
            price: input.price,
            category: input.category.trim().to_string(),
            image_url: input.image_url,
            available: input.available,
            created_at: stamp,
            updated_at: stamp,
        };
        settle("create product", self.products().insert_one(&product).await).map(|id| {
            product.id = id;
            product
        })
    }

    /// Apply a partial update and return the product as stored afterwards.
    pub async fn update(&self, product_id: &str, update: &ProductUpdate) -> Lookup<Product> {
        if let Err(invalid) = check_id(product_id) {
            return invalid;
        }
        if update.price.is_some_and(|price| !valid_price(price)) {
            return Lookup::invalid("price must be a non-negative number");
        }
        let changes = ProductChanges {
            update,
            updated_at: now(),
        };
        settle_option(
            "update product",
            self.products()
                .find_one_and_update(&Filter::id(product_id), &changes)
                .await,
        )
    }

    /// `Found(())` when exactly one product was removed.
    pub async fn delete(&self, product_id: &str) -> Lookup<()> {
        if let Err(invalid) = check_id(product_id) {
            return invalid;
        }
        match settle(
            "delete product",
            self.products().delete_one(&Filter::id(product_id)).await,
        ) {
            Lookup::Found(1) => Lookup::Found(()),
            Lookup::Found(_) => Lookup::NotFound,
            other => other.map(|_| ()),
        }
    }
}

fn catalog_filter(filters: &ProductFilters) -> Filter {
    let mut filter = Filter::All;
    if let Some(category) = filters.category.as_deref().filter(|c| !c.is_empty()) {
        filter = filter.and(Filter::contains("category", category));
    }
    if let Some(min) = filters.min_price {
        filter = filter.and(Filter::gte("price", min));
    }
    if let Some(max) = filters.max_price {
        filter = filter.and(Filter::lte("price", max));
    }
    if let Some(available) = filters.available {
        filter = filter.and(Filter::eq("available", available));
    }
    if let Some(search) = filters.search.as_deref().filter(|s| !s.is_empty()) {
        filter = filter.and(Filter::Or(vec![
            Filter::contains("name", search),
            Filter::contains("description", search),
        ]));
    }
    filter
}

fn valid_price(price: f64) -> bool {
    price.is_finite() && price >= 0.0
}

fn validate_new(input: &NewProduct) -> Result<(), String> {
    if input.name.trim().is_empty() {
        return Err("product name is required".into());
    }
    if input.category.trim().is_empty() {
        return Err("product category is required".into());
    }
    if !valid_price(input.price) {
        return Err("price must be a non-negative number".into());
    }
    Ok(())
}
