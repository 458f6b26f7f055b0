use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use bistro_common::{Error, Result};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::model::AppConfig;

/// Config files probed, in order, when no explicit path is given.
const DEFAULT_CONFIG_FILES: &[&str] = &["config.yml", "config.yaml", "config.toml"];

static URL_CREDENTIALS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<scheme>[a-zA-Z][a-zA-Z0-9+.-]*://)[^:/@]+:[^@]+@")
        .expect("credential pattern is valid")
});

/// Loads `AppConfig` from a YAML/TOML file, `.env`, and the process
/// environment (in increasing priority).
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration. With `path = None`, the first existing default
    /// file in the working directory is used; if there is none the built-in
    /// defaults apply.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        match dotenvy::dotenv() {
            Ok(env_path) => debug!("loaded environment from {}", env_path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("ignoring unreadable .env file: {e}"),
        }

        let mut config = match Self::resolve_path(path)? {
            Some(p) => {
                info!("loading config from {}", p.display());
                Self::from_file(&p)?
            }
            None => {
                info!("no config file found, using defaults");
                AppConfig::default()
            }
        };

        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn resolve_path(path: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            return Ok(Some(p.to_path_buf()));
        }

        Ok(DEFAULT_CONFIG_FILES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists()))
    }

    /// Parse a config file, choosing the format from its extension.
    pub fn from_file(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
            "toml" => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("TOML parse error: {e}"))),
            other => Err(Error::Config(format!(
                "unsupported config extension: {other}"
            ))),
        }
    }
}

/// Apply `DATABASE_URL`, `HOST`, `PORT` and `ADMIN_SECRET` on top of a loaded
/// config. `lookup` abstracts the environment so tests can feed fixed values.
pub fn apply_env_overrides(
    config: &mut AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = non_empty("DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(host) = non_empty("HOST") {
        config.server.host = host;
    }
    if let Some(port) = non_empty("PORT") {
        config.server.port = port
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("PORT is not a valid port number: {port}")))?;
    }
    if let Some(secret) = non_empty("ADMIN_SECRET") {
        config.auth.admin_secret = secret;
    }
    Ok(())
}

/// Hide credentials embedded in a connection string before it is logged.
pub fn mask_url(url: &str) -> String {
    URL_CREDENTIALS
        .replace(url, "${scheme}***:***@")
        .into_owned()
}
