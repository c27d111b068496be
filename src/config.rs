use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::HeaderValue;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_AUDIO_DIR: &str = "generated_audio";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5001";
pub const DEFAULT_MODEL_PATH: &str = "voices/en_US-lessac-medium.onnx";
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://localhost:5000",
    "http://127.0.0.1:5000",
    "http://127.0.0.1:5173",
];

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("PORT must be a number, got {0:?}")]
    InvalidPort(String),

    #[error("Invalid bind address {0:?}")]
    InvalidAddress(String),

    #[error("Invalid CORS origin {0:?}")]
    InvalidOrigin(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub audio_dir: PathBuf,
    pub base_url: String,
    pub model_path: PathBuf,
    pub cors_origins: Vec<HeaderValue>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };
        let addr_str = format!("{}:{}", host, port);
        let addr = addr_str
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(addr_str))?;

        let base_url = lookup("BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(raw) => parse_origins(raw.split(','))?,
            None => parse_origins(DEFAULT_CORS_ORIGINS.iter().copied())?,
        };

        Ok(Self {
            addr,
            audio_dir: lookup("AUDIO_DIR")
                .unwrap_or_else(|| DEFAULT_AUDIO_DIR.to_string())
                .into(),
            base_url,
            model_path: lookup("MODEL_PATH")
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string())
                .into(),
            cors_origins,
        })
    }
}

fn parse_origins<'a>(
    origins: impl Iterator<Item = &'a str>,
) -> Result<Vec<HeaderValue>, ConfigError> {
    origins
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|o| {
            if !(o.starts_with("http://") || o.starts_with("https://")) {
                return Err(ConfigError::InvalidOrigin(o.to_string()));
            }
            HeaderValue::from_str(o).map_err(|_| ConfigError::InvalidOrigin(o.to_string()))
        })
        .collect()
}
