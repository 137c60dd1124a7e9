use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;
pub const DEFAULT_LIFETIME_HOURS: u64 = 24;
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub max_file_size_bytes: u64,
    pub allowed_extensions: Vec<String>,
    pub lifetime_hours: u64,
    /// Period of the background sweep; `0` leaves sweeping to uploads only.
    pub sweep_interval_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout_seconds: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            lifetime_hours: DEFAULT_LIFETIME_HOURS,
            sweep_interval_seconds: 0,
        }
    }
}

impl StorageConfig {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_hours * 60 * 60)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        if self.sweep_interval_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.sweep_interval_seconds))
        }
    }
}

impl AppConfig {
    /// Defaults, then `config.toml` from the working directory if present,
    /// then `APP_*` environment variables (`APP_STORAGE__LIFETIME_HOURS=12`).
    pub fn load() -> Result<Self, ConfigError> {
        let path = Path::new("config.toml");
        Self::load_from(path.exists().then_some(path))
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("storage.allowed_extensions")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        if self.server.request_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.storage.max_file_size_bytes == 0 {
            return Err(ConfigError::Message(
                "Max file size must be greater than 0".to_string(),
            ));
        }

        if self.storage.lifetime_hours == 0 {
            return Err(ConfigError::Message(
                "File lifetime must be greater than 0 hours".to_string(),
            ));
        }

        if self.storage.allowed_extensions.is_empty() {
            return Err(ConfigError::Message(
                "At least one file extension must be allowed".to_string(),
            ));
        }

        for ext in &self.storage.allowed_extensions {
            let well_formed = !ext.is_empty()
                && ext
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
            if !well_formed {
                return Err(ConfigError::Message(format!(
                    "Invalid allowed extension '{}': use lowercase letters and digits without a dot",
                    ext
                )));
            }
        }

        Ok(())
    }

    pub fn create_directories(&self) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(&self.storage.upload_dir)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
