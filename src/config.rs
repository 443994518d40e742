use crate::transport::{HttpTransport, MockedTransport, Transport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for field '{field}': {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Http,
    /// Canned responses, no backend needed.
    Mocked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the service handling upload, segmentation and listing
    pub main_service_url: String,
    /// Base URL of the colour correction service
    pub correction_service_url: String,
    pub transport: TransportKind,
    /// Artificial latency of the mocked transport
    pub mock_delay_ms: u64,
    /// Per-request timeout. None waits forever.
    pub request_timeout_secs: Option<u64>,
    /// Control API bind address
    pub host: String,
    pub port: u16,
    /// Largest image body the control API accepts, in bytes
    pub max_upload_bytes: usize,
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            main_service_url: "http://localhost:8000".to_string(),
            correction_service_url: "http://localhost:8080".to_string(),
            transport: TransportKind::Http,
            mock_delay_ms: 1000,
            request_timeout_secs: None,
            host: "127.0.0.1".to_string(),
            port: 5173,
            max_upload_bytes: 64 * 1024 * 1024,
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Checks the config and trims trailing slashes off the base URLs.
    pub fn validated(mut self) -> ConfigResult<Self> {
        self.main_service_url = validate_base_url("main_service_url", &self.main_service_url)?;
        self.correction_service_url =
            validate_base_url("correction_service_url", &self.correction_service_url)?;
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "port".to_string(),
                value: "0".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_upload_bytes".to_string(),
                value: "0".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs".to_string(),
                value: "0".to_string(),
                reason: "omit the timeout instead of setting it to 0".to_string(),
            });
        }
        self.log_level_filter()?;
        Ok(self)
    }

    pub fn log_level_filter(&self) -> ConfigResult<log::LevelFilter> {
        self.log_level
            .parse::<log::LevelFilter>()
            .map_err(|_| ConfigError::InvalidValue {
                field: "log_level".to_string(),
                value: self.log_level.clone(),
                reason: "expected one of off, error, warn, info, debug, trace".to_string(),
            })
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            main: self.main_service_url.clone(),
            correction: self.correction_service_url.clone(),
        }
    }

    pub fn build_transport(&self) -> anyhow::Result<Arc<dyn Transport>> {
        let transport: Arc<dyn Transport> = match self.transport {
            TransportKind::Http => Arc::new(HttpTransport::new(
                self.request_timeout_secs.map(Duration::from_secs),
            )?),
            TransportKind::Mocked => {
                Arc::new(MockedTransport::new(Duration::from_millis(self.mock_delay_ms)))
            }
        };
        Ok(transport)
    }
}

fn validate_base_url(field: &str, url: &str) -> ConfigResult<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ConfigError::MissingRequired {
            field: field.to_string(),
        });
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: url.to_string(),
            reason: "must start with http:// or https://".to_string(),
        });
    }
    Ok(url.trim_end_matches('/').to_string())
}

/// Backend URLs, one method per remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub main: String,
    pub correction: String,
}

impl Endpoints {
    pub fn load_image(&self) -> String {
        format!("{}/load_image", self.main)
    }

    pub fn correct(&self) -> String {
        format!("{}/correct", self.correction)
    }

    pub fn segment_clouds(&self) -> String {
        format!("{}/segment-clouds", self.main)
    }

    pub fn last_image(&self) -> String {
        format!("{}/last-image", self.correction)
    }

    pub fn server_images(&self) -> String {
        format!("{}/server_images", self.main)
    }
}
