//! Configuration ingestion (spec.md §6, SPEC_FULL.md §3.2): a key/value file
//! plus environment overrides, grounded on `libs/rust/core/src/lib.rs::
//! load_config`'s `config`-crate builder and
//! `original_source/src/config.py`/`original_source/src/autoscaler.py::
//! update_config_with_env`.

use anyhow::{bail, Result};
use serde::Deserialize;

/// Config file searched for by default, matching
/// `original_source/src/config.py::Config.DEFAULT_CONFIG`.
const DEFAULT_CONFIG_FILE: &str = "autoscaler.conf";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub marathon_url: String,
    #[serde(default)]
    pub marathon_user: String,
    #[serde(default)]
    pub marathon_pass: String,
    #[serde(default)]
    pub mesos_url: String,
    #[serde(default)]
    pub mesos_user: String,
    #[serde(default)]
    pub mesos_pass: String,
    #[serde(default = "default_port0")]
    pub port0: u16,
    /// Spec.md §9 open question: the original disables TLS verification
    /// unconditionally. Default here preserves that behavior; an operator
    /// who terminates TLS properly can flip it.
    #[serde(default)]
    pub marathon_tls_verify: bool,
    #[serde(default)]
    pub mesos_tls_verify: bool,
}

fn default_port0() -> u16 {
    5000
}

impl AppConfig {
    pub fn marathon_user_opt(&self) -> Option<String> {
        non_empty(&self.marathon_user)
    }

    pub fn marathon_pass_opt(&self) -> Option<String> {
        non_empty(&self.marathon_pass)
    }

    pub fn mesos_user_opt(&self) -> Option<String> {
        non_empty(&self.mesos_user)
    }

    pub fn mesos_pass_opt(&self) -> Option<String> {
        non_empty(&self.mesos_pass)
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Loads config from `AUTOSCALER_CONFIG_FILE` (or `autoscaler.conf` if
/// unset, both optional — every key can also come purely from the
/// environment), then applies `MARATHON_URL`/`MARATHON_USER`/
/// `MARATHON_PASS`/`MESOS_URL`/`MESOS_USER`/`MESOS_PASS`/`PORT0` overrides
/// when set and non-empty, one field at a time, the same way
/// `update_config_with_env` does in `original_source/src/autoscaler.py`.
pub fn load_config() -> Result<AppConfig> {
    let config_file = std::env::var("AUTOSCALER_CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

    let builder = config::Config::builder()
        .set_default("debug", false)?
        .set_default("marathon_url", "")?
        .set_default("marathon_user", "")?
        .set_default("marathon_pass", "")?
        .set_default("mesos_url", "")?
        .set_default("mesos_user", "")?
        .set_default("mesos_pass", "")?
        .set_default("port0", i64::from(default_port0()))?
        .set_default("marathon_tls_verify", false)?
        .set_default("mesos_tls_verify", false)?
        .add_source(config::File::with_name(&config_file).required(false));

    let cfg = builder.build()?;
    let mut app_config: AppConfig = cfg.try_deserialize()?;

    apply_env_overrides(&mut app_config);

    if app_config.marathon_url.is_empty() {
        bail!("marathon_url is not configured (set it in {config_file} or via MARATHON_URL)");
    }
    if app_config.mesos_url.is_empty() {
        bail!("mesos_url is not configured (set it in {config_file} or via MESOS_URL)");
    }

    Ok(app_config)
}

fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Some(v) = env_non_empty("MARATHON_URL") {
        cfg.marathon_url = v;
    }
    if let Some(v) = env_non_empty("MARATHON_USER") {
        cfg.marathon_user = v;
    }
    if let Some(v) = env_non_empty("MARATHON_PASS") {
        cfg.marathon_pass = v;
    }
    if let Some(v) = env_non_empty("MESOS_URL") {
        cfg.mesos_url = v;
    }
    if let Some(v) = env_non_empty("MESOS_USER") {
        cfg.mesos_user = v;
    }
    if let Some(v) = env_non_empty("MESOS_PASS") {
        cfg.mesos_pass = v;
    }
    if let Some(v) = env_non_empty("PORT0").and_then(|v| v.parse().ok()) {
        cfg.port0 = v;
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_helper_distinguishes_blank_from_set() {
        assert_eq!(non_empty(""), None);
        assert_eq!(non_empty("user"), Some("user".to_string()));
    }
}
