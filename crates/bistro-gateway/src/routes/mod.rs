pub(crate) mod admin;
pub(crate) mod auth;
pub(crate) mod cart;
pub(crate) mod meta;
pub(crate) mod orders;
pub(crate) mod products;
