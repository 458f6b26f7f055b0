pub mod loader;
pub mod model;

pub use loader::{ConfigLoader, apply_env_overrides, mask_url};
pub use model::{AppConfig, AuthConfig, DatabaseConfig, LogConfig, ServerConfig};
