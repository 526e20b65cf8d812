use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::env;
use std::time::Duration;

pub const DEFAULT_BUCKET: &str = "documents";
pub const DEFAULT_SIZE_LIMIT_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_FILES: usize = 10;
pub const DEFAULT_ACCEPTED_EXTENSIONS: &str = ".pdf,.doc,.docx,.txt,.jpg,.jpeg,.png";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub upload: UploadSettings,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Supabase,
    Memory,
}

impl std::str::FromStr for StorageProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "supabase" => Ok(StorageProvider::Supabase),
            "memory" => Ok(StorageProvider::Memory),
            other => Err(anyhow::anyhow!("Unsupported storage provider: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub supabase_url: String,
    pub supabase_service_key: Option<String>,
}

/// Upload policy shared by the gateway and the coordinator.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadSettings {
    pub max_files: usize,
    pub bucket_name: String,
    pub size_limit_bytes: u64,
    /// Lowercase extensions including the leading dot, e.g. `.pdf`.
    pub accepted_extensions: BTreeSet<String>,
    pub progress_tick: Duration,
    pub completion_display_delay: Duration,
    /// How long a failed task stays listed before it is dropped.
    pub failed_retention: Duration,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            bucket_name: DEFAULT_BUCKET.to_string(),
            size_limit_bytes: DEFAULT_SIZE_LIMIT_BYTES,
            accepted_extensions: parse_extensions(DEFAULT_ACCEPTED_EXTENSIONS),
            progress_tick: Duration::from_millis(300),
            completion_display_delay: Duration::from_millis(1500),
            failed_retention: Duration::from_secs(60),
        }
    }
}

impl UploadSettings {
    /// Value for an HTML `accept` attribute. Only the file picker applies it;
    /// the coordinator does not reject other types.
    pub fn accept_attribute(&self) -> String {
        self.accepted_extensions
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn accepts(&self, file_name: &str) -> bool {
        match file_name.rsplit_once('.') {
            Some((_, ext)) => self
                .accepted_extensions
                .contains(&format!(".{}", ext.to_lowercase())),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Jwt,
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub secret: String,
    pub mode: AuthMode,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let auth_mode = match env::var("AUTH_MODE")
            .unwrap_or_else(|_| "jwt".to_string())
            .to_lowercase()
            .as_str()
        {
            "none" => AuthMode::None,
            "jwt" => AuthMode::Jwt,
            other => anyhow::bail!("Unsupported AUTH_MODE: {}", other),
        };

        let secret = env::var("AUTH_SECRET").unwrap_or_default();
        if auth_mode == AuthMode::Jwt && secret.is_empty() {
            anyhow::bail!("AUTH_SECRET must be set when AUTH_MODE=jwt");
        }

        let defaults = UploadSettings::default();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .context("PORT must be a port number")?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            storage: StorageConfig {
                provider: env::var("STORAGE_PROVIDER")
                    .unwrap_or_else(|_| "supabase".to_string())
                    .parse()?,
                supabase_url: env::var("SUPABASE_URL").unwrap_or_default(),
                supabase_service_key: env::var("SUPABASE_SERVICE_KEY").ok(),
            },
            upload: UploadSettings {
                max_files: env::var("UPLOAD_MAX_FILES")
                    .unwrap_or_else(|_| defaults.max_files.to_string())
                    .parse()
                    .context("UPLOAD_MAX_FILES must be an integer")?,
                bucket_name: env::var("STORAGE_BUCKET").unwrap_or(defaults.bucket_name),
                size_limit_bytes: env::var("UPLOAD_SIZE_LIMIT_BYTES")
                    .unwrap_or_else(|_| defaults.size_limit_bytes.to_string())
                    .parse()
                    .context("UPLOAD_SIZE_LIMIT_BYTES must be an integer")?,
                accepted_extensions: env::var("UPLOAD_ACCEPTED_EXTENSIONS")
                    .map(|raw| parse_extensions(&raw))
                    .unwrap_or(defaults.accepted_extensions),
                progress_tick: Duration::from_millis(
                    env::var("UPLOAD_PROGRESS_TICK_MS")
                        .unwrap_or_else(|_| "300".to_string())
                        .parse()
                        .context("UPLOAD_PROGRESS_TICK_MS must be an integer")?,
                ),
                completion_display_delay: Duration::from_millis(
                    env::var("UPLOAD_COMPLETION_DELAY_MS")
                        .unwrap_or_else(|_| "1500".to_string())
                        .parse()
                        .context("UPLOAD_COMPLETION_DELAY_MS must be an integer")?,
                ),
                failed_retention: Duration::from_millis(
                    env::var("UPLOAD_FAILED_RETENTION_MS")
                        .unwrap_or_else(|_| "60000".to_string())
                        .parse()
                        .context("UPLOAD_FAILED_RETENTION_MS must be an integer")?,
                ),
            },
            auth: AuthConfig {
                secret,
                mode: auth_mode,
            },
        })
    }
}

/// Parses a comma separated list such as `.pdf, DOCX` into `{".pdf", ".docx"}`.
pub fn parse_extensions(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .map(|s| format!(".{}", s))
        .collect()
}
