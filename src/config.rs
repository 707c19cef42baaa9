use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use log::{debug, info};

use crate::generator::GenerationMode;
use crate::remote::DEFAULT_MODEL_URL;
use crate::usage::Plan;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub plan: Plan,
    pub ai_mode: GenerationMode,
    pub ai_url: String,
    pub ai_key: Option<String>,
    pub ai_timeout: Duration,
    pub cache_ttl: Duration,
    pub sync_url: Option<String>,
    pub sync_interval: Duration,
    pub sync_max_attempts: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, applying defaults for
    /// unset variables.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            database_url: var("BRAINYPAL_DATABASE_URL").unwrap_or_else(|| "sqlite://brainypal.db?mode=rwc".to_string()),
            bind_addr: var("BRAINYPAL_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3000".to_string()),
            plan: Plan::parse(&var("BRAINYPAL_PLAN").unwrap_or_else(|| "free".to_string())),
            ai_mode: try_load(&var, "BRAINYPAL_AI_MODE", "remote")?,
            ai_url: var("BRAINYPAL_AI_URL").unwrap_or_else(|| DEFAULT_MODEL_URL.to_string()),
            ai_key: var("BRAINYPAL_AI_KEY"),
            ai_timeout: Duration::from_secs(try_load(&var, "BRAINYPAL_AI_TIMEOUT_SECS", "30")?),
            cache_ttl: Duration::from_secs(try_load(&var, "BRAINYPAL_CACHE_TTL_SECS", "300")?),
            sync_url: var("BRAINYPAL_SYNC_URL"),
            sync_interval: Duration::from_secs(try_load(&var, "BRAINYPAL_SYNC_INTERVAL_SECS", "60")?),
            sync_max_attempts: try_load(&var, "BRAINYPAL_SYNC_MAX_ATTEMPTS", "3")?,
        })
    }

    pub fn log_summary(&self) {
        info!(
            "config: db={} bind={} plan={} ai_mode={:?} ai_key={} sync={}",
            self.database_url,
            self.bind_addr,
            self.plan,
            self.ai_mode,
            if self.ai_key.is_some() { "set" } else { "unset" },
            self.sync_url.as_deref().unwrap_or("disabled")
        );
    }
}

fn try_load<T, V>(var: &V, key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
    V: Fn(&str) -> Option<String>,
{
    let raw = var(key).unwrap_or_else(|| {
        debug!("{} not set, using default: {}", key, default);
        default.to_string()
    });

    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("invalid value '{}' for {}", raw, key))
}
