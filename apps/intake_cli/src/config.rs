use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use shared::acquisition::{AcquisitionSourceMapping, WireAcquisitionSource};
use wizard_core::{DebounceConfig, WizardConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub workflow_url: Option<String>,
    pub request_timeout_secs: u64,
    pub search_delay_ms: u64,
    pub search_min_length: usize,
    /// Sends unmapped acquisition sources as `OTHER` instead of failing.
    pub lossy_acquisition_fallback: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let search = DebounceConfig::default();
        Self {
            workflow_url: None,
            request_timeout_secs: 15,
            search_delay_ms: search.delay.as_millis() as u64,
            search_min_length: search.min_length,
            lossy_acquisition_fallback: false,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn wizard_config(&self) -> WizardConfig {
        let mut acquisition = AcquisitionSourceMapping::default();
        if self.lossy_acquisition_fallback {
            acquisition = acquisition.with_fallback(WireAcquisitionSource::Other);
        }
        WizardConfig {
            search: DebounceConfig {
                delay: Duration::from_millis(self.search_delay_ms),
                min_length: self.search_min_length,
            },
            acquisition,
        }
    }

    fn apply_file(&mut self, raw: &str) -> anyhow::Result<()> {
        let table: toml::Table = toml::from_str(raw).context("intake config is not valid toml")?;

        if let Some(v) = table.get("workflow_url").and_then(toml::Value::as_str) {
            self.workflow_url = Some(v.to_string());
        }
        if let Some(v) = integer(&table, "request_timeout_secs") {
            self.request_timeout_secs = v;
        }
        if let Some(v) = integer(&table, "search_delay_ms") {
            self.search_delay_ms = v;
        }
        if let Some(v) = integer(&table, "search_min_length") {
            self.search_min_length = v as usize;
        }
        if let Some(v) = table
            .get("lossy_acquisition_fallback")
            .and_then(toml::Value::as_bool)
        {
            self.lossy_acquisition_fallback = v;
        }
        Ok(())
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("INTAKE_WORKFLOW_URL") {
            self.workflow_url = Some(v);
        }
        if let Some(v) = env("APP__WORKFLOW_URL") {
            self.workflow_url = Some(v);
        }

        if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = v;
        }
        if let Some(v) = env("APP__SEARCH_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.search_delay_ms = v;
        }
        if let Some(v) = env("APP__SEARCH_MIN_LENGTH").and_then(|v| v.parse().ok()) {
            self.search_min_length = v;
        }
        if let Some(v) = env("APP__LOSSY_ACQUISITION_FALLBACK").and_then(|v| v.parse().ok()) {
            self.lossy_acquisition_fallback = v;
        }
    }
}

fn integer(table: &toml::Table, key: &str) -> Option<u64> {
    match table.get(key)? {
        toml::Value::Integer(v) => u64::try_from(*v).ok(),
        toml::Value::String(v) => v.parse().ok(),
        _ => None,
    }
}

/// Defaults, then the optional config file, then the environment.
pub fn load_settings(config_path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if config_path.exists() {
        let raw = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        settings.apply_file(&raw)?;
    }
    settings.apply_env(|key| std::env::var(key).ok());

    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
