//! Names of the collections the platform stores its records in.

pub const USERS: &str = "users";
pub const PRODUCTS: &str = "products";
pub const CARTS: &str = "carts";
pub const ORDERS: &str = "orders";
