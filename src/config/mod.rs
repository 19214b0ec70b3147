use std::collections::HashSet;
use std::env;
use std::time::Duration;
use anyhow::{Result, Context};
use once_cell::sync::Lazy;
use tracing::{info, warn};

use crate::services::GeminiConfig;

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub max_file_size_mb: usize,
    pub max_concurrent_requests: usize,
    pub request_timeout_seconds: u64,
    pub worker_threads: usize,
    pub extraction_timeout_seconds: u64,
    pub max_inline_mb: usize,
    pub max_sessions: usize,
    pub session_idle_timeout_seconds: u64,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
}

// Keys accepted on the Authorization header
pub static VALID_API_KEYS: Lazy<HashSet<String>> = Lazy::new(|| {
    env::var("VALID_API_KEYS")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
});

impl Config {
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let config = Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| {
                info!("SERVER_HOST not set, using default: 0.0.0.0");
                "0.0.0.0".to_string()
            }),
            server_port: Self::parse_env_var("SERVER_PORT", 8080)
                .context("Failed to parse SERVER_PORT")?,
            max_file_size_mb: Self::parse_env_var("MAX_FILE_SIZE_MB", 10)
                .context("Failed to parse MAX_FILE_SIZE_MB")?,
            max_concurrent_requests: Self::parse_env_var("MAX_CONCURRENT_REQUESTS", 100)
                .context("Failed to parse MAX_CONCURRENT_REQUESTS")?,
            request_timeout_seconds: Self::parse_env_var("REQUEST_TIMEOUT_SECONDS", 120)
                .context("Failed to parse REQUEST_TIMEOUT_SECONDS")?,
            worker_threads: Self::parse_env_var("WORKER_THREADS", 4)
                .context("Failed to parse WORKER_THREADS")?,
            extraction_timeout_seconds: Self::parse_env_var("EXTRACTION_TIMEOUT_SECONDS", 20)
                .context("Failed to parse EXTRACTION_TIMEOUT_SECONDS")?,
            max_inline_mb: Self::parse_env_var("MAX_INLINE_MB", 18)
                .context("Failed to parse MAX_INLINE_MB")?,
            max_sessions: Self::parse_env_var("MAX_SESSIONS", 1000)
                .context("Failed to parse MAX_SESSIONS")?,
            session_idle_timeout_seconds: Self::parse_env_var("SESSION_IDLE_TIMEOUT_SECONDS", 1800)
                .context("Failed to parse SESSION_IDLE_TIMEOUT_SECONDS")?,
            gemini_api_key: env::var("GEMINI_API_KEY")
                .ok()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            gemini_model: Self::string_env_var("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            gemini_base_url: Self::string_env_var("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
        };

        config.validate()?;

        if VALID_API_KEYS.is_empty() {
            warn!("No valid API keys configured. Set VALID_API_KEYS environment variable.");
        } else {
            info!("Loaded {} valid API keys", VALID_API_KEYS.len());
        }

        if config.gemini_api_key.is_none() {
            warn!("GEMINI_API_KEY not set, analysis requests will be rejected");
        }

        info!("Configuration loaded successfully: {:?}", config);
        Ok(config)
    }

    fn parse_env_var<T>(var_name: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr + Copy + std::fmt::Debug,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(val) => match val.parse() {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    warn!("Failed to parse {}: {} (using default: {:?})", var_name, e, default);
                    Ok(default)
                }
            },
            Err(_) => {
                info!("{} not set, using default: {:?}", var_name, default);
                Ok(default)
            }
        }
    }

    fn string_env_var(var_name: &str, default: &str) -> String {
        env::var(var_name)
            .ok()
            .map(|val| val.trim().to_string())
            .filter(|val| !val.is_empty())
            .unwrap_or_else(|| {
                info!("{} not set, using default: {}", var_name, default);
                default.to_string()
            })
    }

    fn validate(&self) -> Result<()> {
        if self.server_port == 0 {
            return Err(anyhow::anyhow!("SERVER_PORT must be greater than 0"));
        }
        if self.max_file_size_mb == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(anyhow::anyhow!("MAX_CONCURRENT_REQUESTS must be greater than 0"));
        }
        if self.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("REQUEST_TIMEOUT_SECONDS must be greater than 0"));
        }
        if self.worker_threads == 0 {
            return Err(anyhow::anyhow!("WORKER_THREADS must be greater than 0"));
        }
        if self.extraction_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("EXTRACTION_TIMEOUT_SECONDS must be greater than 0"));
        }
        if self.max_inline_mb == 0 {
            return Err(anyhow::anyhow!("MAX_INLINE_MB must be greater than 0"));
        }
        if self.max_sessions == 0 {
            return Err(anyhow::anyhow!("MAX_SESSIONS must be greater than 0"));
        }
        if self.session_idle_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("SESSION_IDLE_TIMEOUT_SECONDS must be greater than 0"));
        }
        Ok(())
    }

    pub fn validate_api_key(key: &str) -> bool {
        VALID_API_KEYS.contains(key)
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    pub fn max_inline_bytes(&self) -> usize {
        self.max_inline_mb * 1024 * 1024
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_seconds)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_seconds)
    }

    pub fn gemini(&self) -> GeminiConfig {
        GeminiConfig {
            api_key: self.gemini_api_key.clone(),
            model: self.gemini_model.clone(),
            base_url: self.gemini_base_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
        }
    }
}

// The Gemini key stays out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("max_file_size_mb", &self.max_file_size_mb)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("worker_threads", &self.worker_threads)
            .field("extraction_timeout_seconds", &self.extraction_timeout_seconds)
            .field("max_inline_mb", &self.max_inline_mb)
            .field("max_sessions", &self.max_sessions)
            .field("session_idle_timeout_seconds", &self.session_idle_timeout_seconds)
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<redacted>"))
            .field("gemini_model", &self.gemini_model)
            .field("gemini_base_url", &self.gemini_base_url)
            .finish()
    }
}
