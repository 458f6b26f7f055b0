use async_trait::async_trait;
use bistro_common::{Result, timestamp};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;

use super::Migration;
use crate::collections::{CARTS, ORDERS, PRODUCTS, USERS};
use crate::store::{Collection, Document, Filter, IndexSpec, RecordStore, to_document};

/// The built-in migrations, in apply order.
pub fn migrations() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(CreateCollection {
            id: "001",
            name: "Create users collection with indexes",
            collection: USERS,
            indexes: users_indexes,
        }),
        Box::new(CreateCollection {
            id: "002",
            name: "Create products collection with indexes",
            collection: PRODUCTS,
            indexes: products_indexes,
        }),
        Box::new(CreateCollection {
            id: "003",
            name: "Create carts collection with indexes",
            collection: CARTS,
            indexes: carts_indexes,
        }),
        Box::new(CreateCollection {
            id: "004",
            name: "Create orders collection with indexes",
            collection: ORDERS,
            indexes: orders_indexes,
        }),
        Box::new(SeedInitialData),
    ]
}

/// Creates a collection's indexes on `up` and drops the collection on `down`.
/// Index creation is idempotent, so re-running `up` after a partial failure
/// is safe.
struct CreateCollection {
    id: &'static str,
    name: &'static str,
    collection: &'static str,
    indexes: fn() -> Vec<IndexSpec>,
}

#[async_trait]
impl Migration for CreateCollection {
    fn id(&self) -> &str {
        self.id
    }

    fn name(&self) -> &str {
        self.name
    }

    async fn up(&self, store: &dyn RecordStore) -> Result<()> {
        let collection = Collection::new(store, self.collection);
        let indexes = (self.indexes)();
        for index in &indexes {
            collection.create_index(index).await?;
        }
        info!(
            "created {} collection with {} indexes",
            self.collection,
            indexes.len()
        );
        Ok(())
    }

    async fn down(&self, store: &dyn RecordStore) -> Result<()> {
        Collection::new(store, self.collection).drop().await?;
        info!("dropped {} collection", self.collection);
        Ok(())
    }
}

fn users_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::new("unique_user_credentials")
            .asc("name")
            .asc("cellphone")
            .unique(),
        IndexSpec::new("unique_cellphone").asc("cellphone").unique(),
        IndexSpec::new("user_type_index").asc("type"),
        IndexSpec::new("created_at_index").asc("createdAt"),
    ]
}

fn products_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::new("product_name_index").asc("name"),
        IndexSpec::new("product_category_index").asc("category"),
        IndexSpec::new("product_price_index").asc("price"),
        IndexSpec::new("product_availability_index").asc("available"),
        IndexSpec::new("product_text_search_index")
            .text("name")
            .text("description"),
        IndexSpec::new("product_created_at_index").asc("createdAt"),
    ]
}

fn carts_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::new("unique_user_cart").asc("userId").unique(),
        IndexSpec::new("cart_items_product_index").asc("items.productId"),
        IndexSpec::new("cart_updated_at_index").asc("updatedAt"),
    ]
}

fn orders_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::new("order_user_index").asc("userId"),
        IndexSpec::new("order_status_index").asc("status"),
        IndexSpec::new("order_created_at_desc_index").desc("createdAt"),
        IndexSpec::new("order_total_amount_index").asc("totalAmount"),
        IndexSpec::new("order_user_cellphone_index").asc("userCellphone"),
    ]
}

pub const SEED_ADMIN: (&str, &str) = ("admin", "+1234567890");
pub const SEED_CUSTOMER: (&str, &str) = ("john doe", "+1987654321");

/// (name, description, price, category, image)
const SEED_PRODUCTS: &[(&str, &str, f64, &str, &str)] = &[
    (
        "Margherita Pizza",
        "Classic pizza with tomato sauce, mozzarella, and fresh basil",
        12.99,
        "Pizza",
        "photo-1604382354936-07c5b6e5d99a",
    ),
    (
        "Pepperoni Pizza",
        "Classic pepperoni pizza with mozzarella cheese",
        14.99,
        "Pizza",
        "photo-1628840042765-356cda07504e",
    ),
    (
        "Chicken Burger",
        "Grilled chicken breast with lettuce, tomato, and mayo on brioche bun",
        10.99,
        "Burgers",
        "photo-1553979459-d2229ba7433a",
    ),
    (
        "Beef Burger",
        "Juicy beef patty with cheese, lettuce, tomato, and special sauce",
        12.99,
        "Burgers",
        "photo-1568901346375-23c9450c58cd",
    ),
    (
        "Caesar Salad",
        "Fresh romaine lettuce with Caesar dressing, croutons, and parmesan",
        8.99,
        "Salads",
        "photo-1551248429-40975aa4de74",
    ),
    (
        "Greek Salad",
        "Mixed greens with tomatoes, cucumbers, olives, and feta cheese",
        9.99,
        "Salads",
        "photo-1540420773420-3366772f4999",
    ),
    (
        "Chocolate Cake",
        "Rich chocolate cake with chocolate frosting",
        6.99,
        "Desserts",
        "photo-1578985545062-69928b1d9587",
    ),
    (
        "Tiramisu",
        "Classic Italian dessert with coffee-soaked ladyfingers",
        7.99,
        "Desserts",
        "photo-1571877227200-a0d98ea607e9",
    ),
    (
        "Spaghetti Carbonara",
        "Spaghetti with eggs, cheese, pancetta, and black pepper",
        14.99,
        "Pasta",
        "photo-1551183053-bf91a1d81141",
    ),
    (
        "Penne Arrabbiata",
        "Penne pasta with spicy tomato sauce and garlic",
        12.99,
        "Pasta",
        "photo-1559847844-d721426d6edc",
    ),
    (
        "Fish Tacos",
        "Grilled fish with cabbage, pico de gallo, and lime crema",
        11.99,
        "Mexican",
        "photo-1565299624946-b28f40a0ca4b",
    ),
    (
        "Chicken Quesadilla",
        "Grilled chicken with cheese in crispy tortilla, served with salsa",
        9.99,
        "Mexican",
        "photo-1618040996337-56904b7850b9",
    ),
    (
        "Iced Coffee",
        "Cold brew coffee served over ice",
        3.99,
        "Beverages",
        "photo-1461023058943-07fcbe16d735",
    ),
    (
        "Fresh Orange Juice",
        "Freshly squeezed orange juice",
        4.99,
        "Beverages",
        "photo-1600271886742-f049cd451bba",
    ),
    (
        "Craft Beer",
        "Local craft beer selection",
        5.99,
        "Beverages",
        "photo-1608270586620-248524c67de9",
    ),
];

/// Inserts an admin, a sample customer and the starter menu.
///
/// Plain inserts are not idempotent: if this fails halfway, the documents
/// written so far remain and a re-run will insert them again (or trip the
/// unique cellphone index).
struct SeedInitialData;

impl SeedInitialData {
    fn user(name: &str, cellphone: &str, kind: &str, now: &str) -> Result<Document> {
        to_document(&json!({
            "name": name,
            "cellphone": cellphone,
            "type": kind,
            "createdAt": now,
            "updatedAt": now,
        }))
    }

    fn products(now: &str) -> Result<Vec<Document>> {
        SEED_PRODUCTS
            .iter()
            .map(|(name, description, price, category, image)| {
                to_document(&json!({
                    "name": name,
                    "description": description,
                    "price": price,
                    "category": category,
                    "imageUrl": format!("https://images.unsplash.com/{image}?w=400"),
                    "available": true,
                    "createdAt": now,
                    "updatedAt": now,
                }))
            })
            .collect()
    }
}

#[async_trait]
impl Migration for SeedInitialData {
    fn id(&self) -> &str {
        "005"
    }

    fn name(&self) -> &str {
        "Seed initial restaurant data"
    }

    async fn up(&self, store: &dyn RecordStore) -> Result<()> {
        let now = timestamp::format(&Utc::now());

        let (admin_name, admin_phone) = SEED_ADMIN;
        store
            .insert_one(USERS, Self::user(admin_name, admin_phone, "admin", &now)?)
            .await?;
        info!("created admin user");

        let (name, phone) = SEED_CUSTOMER;
        store
            .insert_one(USERS, Self::user(name, phone, "default", &now)?)
            .await?;
        info!("created test user");

        let products = Self::products(&now)?;
        let count = products.len();
        store.insert_many(PRODUCTS, products).await?;
        info!("seeded {count} products");
        Ok(())
    }

    async fn down(&self, store: &dyn RecordStore) -> Result<()> {
        store
            .delete_many(
                USERS,
                &Filter::is_in("cellphone", [SEED_ADMIN.1, SEED_CUSTOMER.1]),
            )
            .await?;

        let names: Vec<Value> = SEED_PRODUCTS
            .iter()
            .map(|(name, ..)| Value::from(*name))
            .collect();
        store
            .delete_many(PRODUCTS, &Filter::In("name".to_string(), names))
            .await?;

        info!("removed seeded data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::migrations::MigrationRunner;
    use crate::migrations::registry::Registry;
    use crate::sqlite_store::SqliteStore;
    use crate::store::FindOptions;

    async fn count(store: &dyn RecordStore, collection: &str) -> usize {
        store
            .find(collection, &Filter::All, &FindOptions::default())
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn builtin_migrations_seed_the_store() {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let runner = MigrationRunner::new(Arc::clone(&store));
        let registry = Registry::builtin().unwrap();

        let report = runner.run_all(registry.units()).await.unwrap();
        assert_eq!(report.applied.len(), 5);

        assert_eq!(count(store.as_ref(), USERS).await, 2);
        assert_eq!(count(store.as_ref(), PRODUCTS).await, SEED_PRODUCTS.len());

        let admin = store
            .find_one(USERS, &Filter::eq("cellphone", SEED_ADMIN.1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin["type"], json!("admin"));
    }

    #[tokio::test]
    async fn unique_cellphone_index_is_enforced_after_migration() {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let runner = MigrationRunner::new(Arc::clone(&store));
        runner
            .run_all(Registry::builtin().unwrap().units())
            .await
            .unwrap();

        let dup = SeedInitialData::user("someone", SEED_CUSTOMER.1, "default", "x").unwrap();
        assert!(store.insert_one(USERS, dup).await.is_err());
    }

    #[tokio::test]
    async fn seed_down_removes_only_seeded_documents() {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let runner = MigrationRunner::new(Arc::clone(&store));
        let registry = Registry::builtin().unwrap();
        runner.run_all(registry.units()).await.unwrap();

        store
            .insert_one(
                PRODUCTS,
                to_document(&json!({"name": "House Special", "price": 20.0})).unwrap(),
            )
            .await
            .unwrap();

        let seed = registry.get("005").unwrap();
        runner.rollback(seed).await.unwrap();

        assert_eq!(count(store.as_ref(), USERS).await, 0);
        assert_eq!(count(store.as_ref(), PRODUCTS).await, 1);
        let status = runner.status(registry.units()).await.unwrap();
        assert_eq!(status.pending, ["005"]);
    }

    #[tokio::test]
    async fn collection_down_drops_the_collection() {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let runner = MigrationRunner::new(Arc::clone(&store));
        let registry = Registry::builtin().unwrap();
        runner.run_all(registry.units()).await.unwrap();

        runner.rollback(registry.get("001").unwrap()).await.unwrap();

        assert_eq!(count(store.as_ref(), USERS).await, 0);
        // the unique index went with the collection
        let doc = SeedInitialData::user("a", "+1", "default", "x").unwrap();
        store.insert_one(USERS, doc.clone()).await.unwrap();
        store.insert_one(USERS, doc).await.unwrap();
    }
}
