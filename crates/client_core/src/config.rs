use std::{collections::HashMap, fs, path::Path, time::Duration};

pub const DEFAULT_SETTINGS_FILE: &str = "creator.toml";

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base_url: String,
    pub session_database_url: String,
    /// Pause between a successful stage save and the automatic advance.
    pub advance_delay: Duration,
    pub request_timeout: Duration,
    pub page_size: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8002".into(),
            session_database_url: "sqlite://./data/session.db".into(),
            advance_delay: Duration::from_millis(1500),
            request_timeout: Duration::from_secs(30),
            page_size: 12,
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE), |name| std::env::var(name).ok())
}

/// Defaults, then the optional TOML file, then `APP__*` environment overrides.
pub fn load_settings_from(
    file: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(file) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => apply_file_values(&mut settings, &file_cfg),
            Err(err) => tracing::warn!(
                path = %file.display(),
                "ignoring unreadable settings file: {err}"
            ),
        }
    }

    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__SESSION_DATABASE_URL") {
        settings.session_database_url = v;
    }
    if let Some(ms) = env("APP__ADVANCE_DELAY_MS").and_then(|v| v.parse::<u64>().ok()) {
        settings.advance_delay = Duration::from_millis(ms);
    }
    if let Some(secs) = env("APP__REQUEST_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
        settings.request_timeout = Duration::from_secs(secs);
    }
    if let Some(size) = env("APP__PAGE_SIZE").and_then(|v| v.parse::<u64>().ok()) {
        if size > 0 {
            settings.page_size = size;
        }
    }

    settings.session_database_url = normalize_database_url(&settings.session_database_url);
    settings
}

fn apply_file_values(settings: &mut Settings, file_cfg: &HashMap<String, toml::Value>) {
    if let Some(v) = file_cfg.get("api_base_url").and_then(|v| v.as_str()) {
        settings.api_base_url = v.to_string();
    }
    if let Some(v) = file_cfg.get("session_database_url").and_then(|v| v.as_str()) {
        settings.session_database_url = v.to_string();
    }
    if let Some(v) = file_cfg.get("advance_delay_ms").and_then(|v| v.as_integer()) {
        settings.advance_delay = Duration::from_millis(v.max(0) as u64);
    }
    if let Some(v) = file_cfg
        .get("request_timeout_secs")
        .and_then(|v| v.as_integer())
    {
        settings.request_timeout = Duration::from_secs(v.max(1) as u64);
    }
    if let Some(v) = file_cfg.get("page_size").and_then(|v| v.as_integer()) {
        if v > 0 {
            settings.page_size = v as u64;
        }
    }
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().session_database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
