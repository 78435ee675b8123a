use std::path::Path;

use serde::Deserialize;

use crate::storage::client::CloudinaryConfig;

/// Secret used when none is configured. Sessions signed with it are forgeable.
pub const DEFAULT_SECRET_KEY: &str = "default-secret-key-change-this";

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_secret_key() -> String {
    DEFAULT_SECRET_KEY.to_string()
}

fn default_mongo_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_mongo_database() -> String {
    "community_platform".to_string()
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    "admin123".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

/// Prefix for environment variables that override the unprefixed ones.
pub const ENV_PREFIX: &str = "CAMPUS_HUB";

/// Server configuration.
///
/// Priority: `CAMPUS_HUB_*` variables > unprefixed environment variables >
/// TOML file > built-in defaults. Unprefixed keys are the upper-case field
/// names, e.g. `MONGO_URI`. They are read without a prefix, so generic
/// variables such as `HOST` or `PORT` set by a shell or platform are picked
/// up too; use `CAMPUS_HUB_HOST` / `CAMPUS_HUB_PORT` to pin a value.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    #[serde(default = "default_mongo_uri")]
    pub mongo_uri: String,
    #[serde(default = "default_mongo_database")]
    pub mongo_database: String,
    #[serde(default)]
    pub cloudinary_cloud_name: Option<String>,
    #[serde(default)]
    pub cloudinary_api_key: Option<String>,
    #[serde(default)]
    pub cloudinary_api_secret: Option<String>,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    /// Run on in-memory repositories seeded with sample content.
    #[serde(default)]
    pub demo_mode: bool,
    #[serde(default = "default_true")]
    pub rate_limit_enabled: bool,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_true")]
    pub cors_permissive: bool,
    /// Key rate limits on `X-Forwarded-For` / `X-Real-IP` / `Forwarded`
    /// instead of the peer address. Only safe behind a reverse proxy that
    /// overwrites these headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            secret_key: default_secret_key(),
            mongo_uri: default_mongo_uri(),
            mongo_database: default_mongo_database(),
            cloudinary_cloud_name: None,
            cloudinary_api_key: None,
            cloudinary_api_secret: None,
            admin_username: default_admin_username(),
            admin_password: default_admin_password(),
            demo_mode: false,
            rate_limit_enabled: true,
            max_upload_bytes: default_max_upload_bytes(),
            cors_permissive: true,
            trust_proxy_headers: false,
        }
    }
}

impl AppConfig {
    /// Load from an optional TOML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        use config::{Config, Environment, File};

        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder
            .add_source(Environment::default().try_parsing(true))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> Result<(), String> {
        if self.secret_key.trim().is_empty() {
            return Err("secret_key must not be empty".to_string());
        }
        if self.port == 0 {
            return Err("port must be greater than 0".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }

    /// Image host credentials, when all three are present and non-empty.
    pub fn cloudinary(&self) -> Option<CloudinaryConfig> {
        let present = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        Some(CloudinaryConfig {
            cloud_name: present(&self.cloudinary_cloud_name)?,
            api_key: present(&self.cloudinary_api_key)?,
            api_secret: present(&self.cloudinary_api_secret)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
