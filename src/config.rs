use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
    /// Run the orphan sweep once before serving requests.
    pub sweep_on_startup: bool,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    /// Directory holding the catalog document
    pub data_dir: String,
    /// Static front-end assets served at `/`, if any
    pub public_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory for the local blob store
    pub uploads_dir: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            data_dir: "./data".to_string(),
            public_dir: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: "./uploads".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            storage: StorageConfig::default(),
            max_upload_size: 50 * 1024 * 1024, // 50MB
            sweep_on_startup: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let bind_address = lookup("BIND_ADDRESS").unwrap_or(defaults.node.bind_address);
        let data_dir = lookup("DATA_DIR").unwrap_or(defaults.node.data_dir);
        let public_dir = lookup("PUBLIC_DIR").filter(|s| !s.trim().is_empty());
        let uploads_dir = lookup("UPLOADS_DIR").unwrap_or(defaults.storage.uploads_dir);

        let max_upload_size = match lookup("MAX_UPLOAD_SIZE") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "MAX_UPLOAD_SIZE must be a number of bytes, got {raw:?}"
                ))
            })?,
            None => defaults.max_upload_size,
        };

        let sweep_on_startup = lookup("SWEEP_ON_STARTUP")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let config = Config {
            node: NodeConfig {
                bind_address,
                data_dir,
                public_dir,
            },
            storage: StorageConfig { uploads_dir },
            max_upload_size,
            sweep_on_startup,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.node.data_dir.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "DATA_DIR cannot be empty".to_string(),
            ));
        }

        if self.storage.uploads_dir.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "UPLOADS_DIR cannot be empty".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        // The sweep would treat the catalog document as an orphaned blob
        if std::path::Path::new(&self.node.data_dir)
            == std::path::Path::new(&self.storage.uploads_dir)
        {
            return Err(ConfigError::ValidationError(
                "DATA_DIR and UPLOADS_DIR must be different directories".to_string(),
            ));
        }

        Ok(())
    }
}
