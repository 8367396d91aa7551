use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use tracing::warn;

use crate::error::CollectionError;

pub const DEFAULT_SETTINGS_FILE: &str = "fleet.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub request_timeout_secs: u64,
    pub debounce_ms: u64,
    pub autocomplete_min_chars: usize,
    pub autocomplete_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".into(),
            username: None,
            password: None,
            request_timeout_secs: 30,
            debounce_ms: 300,
            autocomplete_min_chars: 2,
            autocomplete_limit: 7,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        let username = self.username.as_deref()?;
        Some((username, self.password.as_deref().unwrap_or_default()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    base_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    request_timeout_secs: Option<u64>,
    debounce_ms: Option<u64>,
    autocomplete_min_chars: Option<usize>,
    autocomplete_limit: Option<usize>,
}

/// Defaults, then `fleet.toml` in the working directory when present, then
/// the environment.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(DEFAULT_SETTINGS_FILE) {
        match parse_settings_file(&raw) {
            Ok(file_cfg) => apply_file_settings(&mut settings, file_cfg),
            Err(err) => warn!(file = DEFAULT_SETTINGS_FILE, %err, "ignoring unreadable settings file"),
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// Like [`load_settings`], but an explicitly named file must exist and parse.
pub fn load_settings_from(path: &Path) -> Result<Settings, CollectionError> {
    let raw = fs::read_to_string(path).map_err(|err| {
        CollectionError::Config(format!(
            "failed to read settings file '{}': {err}",
            path.display()
        ))
    })?;
    let file_cfg = parse_settings_file(&raw).map_err(|err| {
        CollectionError::Config(format!("invalid settings file '{}': {err}", path.display()))
    })?;

    let mut settings = Settings::default();
    apply_file_settings(&mut settings, file_cfg);
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn parse_settings_file(raw: &str) -> Result<FileSettings, toml::de::Error> {
    toml::from_str::<FileSettings>(raw)
}

fn apply_file_settings(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.base_url {
        settings.base_url = v;
    }
    if file_cfg.username.is_some() {
        settings.username = file_cfg.username;
    }
    if file_cfg.password.is_some() {
        settings.password = file_cfg.password;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.debounce_ms {
        settings.debounce_ms = v;
    }
    if let Some(v) = file_cfg.autocomplete_min_chars {
        settings.autocomplete_min_chars = v;
    }
    if let Some(v) = file_cfg.autocomplete_limit {
        settings.autocomplete_limit = v;
    }
}

pub(crate) fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("FLEET_BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = lookup("APP__BASE_URL") {
        settings.base_url = v;
    }

    if let Some(v) = lookup("FLEET_USERNAME") {
        settings.username = Some(v);
    }
    if let Some(v) = lookup("FLEET_PASSWORD") {
        settings.password = Some(v);
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
    if let Some(v) = lookup("APP__DEBOUNCE_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.debounce_ms = parsed;
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
