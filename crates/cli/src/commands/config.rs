use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use leaveflow_core::config::AppConfig;
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{load_config, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value, env_keys) in entries(&config) {
        let source =
            field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key_path, &value, source));
    }

    CommandResult::success("config", lines.join("\n"))
}

fn entries(config: &AppConfig) -> Vec<(&'static str, String, &'static [&'static str])> {
    let cache_url = match &config.cache.url {
        Some(url) => redact_url(url.expose_secret()),
        None => "<unset>".to_string(),
    };

    vec![
        ("database.url", config.database.url.clone(), &["LEAVEFLOW_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["LEAVEFLOW_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["LEAVEFLOW_DATABASE_TIMEOUT_SECS"],
        ),
        ("cache.backend", config.cache.backend.as_str().to_string(), &["LEAVEFLOW_CACHE_BACKEND"]),
        ("cache.url", cache_url, &["LEAVEFLOW_CACHE_URL"]),
        ("cache.key_prefix", config.cache.key_prefix.clone(), &["LEAVEFLOW_CACHE_KEY_PREFIX"]),
        ("cache.ttl_secs", config.cache.ttl_secs.to_string(), &["LEAVEFLOW_CACHE_TTL_SECS"]),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            &["LEAVEFLOW_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), &["LEAVEFLOW_SERVER_PORT"]),
        (
            "server.request_timeout_secs",
            config.server.request_timeout_secs.to_string(),
            &["LEAVEFLOW_SERVER_REQUEST_TIMEOUT_SECS"],
        ),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["LEAVEFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["LEAVEFLOW_LOGGING_LEVEL", "LEAVEFLOW_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["LEAVEFLOW_LOGGING_FORMAT", "LEAVEFLOW_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("leaveflow.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/leaveflow.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps scheme and host, hides credentials and everything after the host.
fn redact_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let Some((scheme, rest)) = trimmed.split_once("://") else {
        return "<redacted>".to_string();
    };
    let authority = rest.split('/').next().unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    if authority.contains('@') {
        format!("{scheme}://***@{host}/<redacted>")
    } else {
        format!("{scheme}://{host}/<redacted>")
    }
}
