use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_SECRET_KEY: &str = "change-me-in-production";
const MAX_UPLOAD_CEILING: usize = 50 * 1024 * 1024;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs on file storage only.
    pub database_url: Option<String>,
    pub database_name: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub debug: bool,
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub retention_hours: u64,
    pub sweep_interval_secs: u64,
    /// Idle timeout in seconds.
    pub session_timeout: u64,
    pub password_min_length: usize,
    pub max_file_size: usize,
    pub min_text_length: usize,
    pub max_text_length: usize,
    pub admin_username: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            database_url: None,
            database_name: "text2dataset".to_string(),
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            debug: false,
            output_dir: PathBuf::from("outputs"),
            data_dir,
            retention_hours: 24,
            sweep_interval_secs: 3600,
            session_timeout: 3600,
            password_min_length: 8,
            max_file_size: 10 * 1024 * 1024,
            min_text_length: 10,
            max_text_length: 1_000_000,
            admin_username: "admin".to_string(),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(name, value = %raw, "Ignoring unparseable environment value");
            default
        }),
        Err(_) => default,
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let data_dir: PathBuf = env_or("DATA_DIR", defaults.data_dir);
        let database_name = env_or("DATABASE_NAME", defaults.database_name);

        // Unset: a database file in the data dir. Empty or "none": files only.
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) if url.trim().is_empty() || url.eq_ignore_ascii_case("none") => None,
            Ok(url) => Some(url),
            Err(_) => Some(format!(
                "sqlite:{}?mode=rwc",
                data_dir.join(format!("{database_name}.db")).display()
            )),
        };

        Self {
            host: env_or("HOST", defaults.host),
            port: env_or("PORT", defaults.port),
            database_url,
            database_name,
            secret_key: env_or("SECRET_KEY", defaults.secret_key),
            debug: env_flag("DEBUG"),
            output_dir: env_or("OUTPUT_DIR", defaults.output_dir),
            data_dir,
            retention_hours: env_or("RETENTION_HOURS", defaults.retention_hours),
            sweep_interval_secs: env_or("SWEEP_INTERVAL", defaults.sweep_interval_secs),
            session_timeout: env_or("SESSION_TIMEOUT", defaults.session_timeout),
            password_min_length: env_or("PASSWORD_MIN_LENGTH", defaults.password_min_length),
            max_file_size: env_or("MAX_FILE_SIZE", defaults.max_file_size),
            min_text_length: env_or("MIN_TEXT_LENGTH", defaults.min_text_length),
            max_text_length: env_or("MAX_TEXT_LENGTH", defaults.max_text_length),
            admin_username: env_or("ADMIN_USERNAME", defaults.admin_username),
        }
    }

    /// Problems worth a warning at startup. None of them stop the server.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.secret_key == DEFAULT_SECRET_KEY || self.secret_key.len() < 16 {
            warnings.push("SECRET_KEY should be set to a long random value".to_string());
        }
        if self.password_min_length < 6 {
            warnings.push("PASSWORD_MIN_LENGTH should be at least 6".to_string());
        }
        if self.max_file_size > MAX_UPLOAD_CEILING {
            warnings.push("MAX_FILE_SIZE should not exceed 50MB".to_string());
        }
        if self.min_text_length > self.max_text_length {
            warnings.push("MIN_TEXT_LENGTH is greater than MAX_TEXT_LENGTH".to_string());
        }
        warnings
    }

    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours * 3600)
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    #[must_use]
    pub const fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout)
    }
}
