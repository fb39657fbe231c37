use crate::domain::PersistentSessionConfig;
use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub persistent_session: PersistentSessionSettings,
    /// Default backend for TTL key-value stores; used when
    /// `persistent_session.store` is not set.
    #[serde(default)]
    pub cache_store_backend: Option<String>,
    /// Connection details for the redis backend; unused when the
    /// memory backend is selected.
    pub redis: Option<RedisSettings>,
    pub log: Log,
}

impl Settings {
    /// Backend selector: the session-specific choice, then the shared
    /// cache backend, then memory.
    pub fn store_backend(&self) -> &str {
        self.persistent_session
            .store
            .as_deref()
            .or(self.cache_store_backend.as_deref())
            .unwrap_or("memory")
    }
}

#[derive(Debug, Deserialize)]
pub struct PersistentSessionSettings {
    #[serde(default)]
    pub store: Option<String>, // "memory" or "redis"
    pub ttl_ms: u64,
    #[serde(default)]
    pub cookie_key: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    /// DEPRECATED: seconds override for the cookie max-age. Prefer
    /// letting `ttl_ms` drive it.
    #[serde(default)]
    pub cookie_max_age_secs: Option<i64>,
}

impl PersistentSessionSettings {
    pub fn to_config(&self) -> PersistentSessionConfig {
        let mut config = PersistentSessionConfig::new(Duration::from_millis(self.ttl_ms));
        if let Some(cookie_key) = &self.cookie_key {
            config.cookie_name = cookie_key.clone();
        }
        config.namespace = self.namespace.clone();
        if let Some(secs) = self.cookie_max_age_secs {
            warn!(
                "persistent_session.cookie_max_age_secs is deprecated; \
                 derive the cookie max-age from ttl_ms instead"
            );
            config.cookie_max_age_override_secs = Some(secs);
        }
        config
    }
}

#[derive(Debug, Deserialize)]
pub struct RedisSettings {
    pub url: String,
    pub key_prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
