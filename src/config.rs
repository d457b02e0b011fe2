use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt};
use thiserror::Error;

pub const R2_ACCOUNT_ID: &str = "R2_ACCOUNT_ID";
pub const R2_ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
pub const R2_SECRET_ACCESS_KEY: &str = "R2_SECRET_ACCESS_KEY";
pub const R2_BUCKET_NAME: &str = "R2_BUCKET_NAME";
pub const R2_PUBLIC_URL: &str = "R2_PUBLIC_URL";
pub const R2_ENDPOINT: &str = "R2_ENDPOINT";
pub const FIREBASE_API_KEY: &str = "FIREBASE_API_KEY";
pub const FIREBASE_PROJECT_ID: &str = "FIREBASE_PROJECT_ID";
pub const FIRESTORE_ENDPOINT: &str = "FIRESTORE_ENDPOINT";

const DEFAULT_FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com/v1";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
///
/// Backend settings are validated once here. When they are incomplete the
/// error is kept so the server can still answer health probes while the
/// photo endpoints report a configuration failure.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub services: Result<ServiceConfig, ConfigError>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Event photo upload/download relay")]
pub struct Args {
    /// Host to bind to (overrides PHOTO_RELAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PHOTO_RELAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
}

/// Settings for the S3-compatible object store (Cloudflare R2).
#[derive(Clone)]
pub struct StorageConfig {
    pub account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    /// Base of the public URLs handed back to clients, without trailing `/`.
    pub public_base_url: String,
    pub endpoint: Option<String>,
}

impl StorageConfig {
    /// S3 API endpoint; derived from the account id unless overridden.
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.r2.cloudflarestorage.com", self.account_id))
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("account_id", &self.account_id)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("public_base_url", &self.public_base_url)
            .field("endpoint", &self.endpoint_url())
            .finish()
    }
}

/// Settings for the Firestore document store.
#[derive(Clone)]
pub struct MetadataConfig {
    pub project_id: String,
    pub api_key: String,
    pub endpoint: String,
}

impl fmt::Debug for MetadataConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataConfig")
            .field("project_id", &self.project_id)
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as missing and
    /// every missing key is reported at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut missing = Vec::new();
        let mut required = |key: &'static str| match value(key) {
            Some(v) => v,
            None => {
                missing.push(key);
                String::new()
            }
        };

        let account_id = required(R2_ACCOUNT_ID);
        let access_key_id = required(R2_ACCESS_KEY_ID);
        let secret_access_key = required(R2_SECRET_ACCESS_KEY);
        let bucket = required(R2_BUCKET_NAME);
        let public_base_url = required(R2_PUBLIC_URL);
        let api_key = required(FIREBASE_API_KEY);
        let project_id = required(FIREBASE_PROJECT_ID);

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        Ok(Self {
            storage: StorageConfig {
                account_id,
                access_key_id,
                secret_access_key,
                bucket,
                public_base_url: public_base_url.trim_end_matches('/').to_string(),
                endpoint: value(R2_ENDPOINT),
            },
            metadata: MetadataConfig {
                project_id,
                api_key,
                endpoint: value(FIRESTORE_ENDPOINT)
                    .unwrap_or_else(|| DEFAULT_FIRESTORE_ENDPOINT.into())
                    .trim_end_matches('/')
                    .to_string(),
            },
        })
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("PHOTO_RELAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("PHOTO_RELAY_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing PHOTO_RELAY_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading PHOTO_RELAY_PORT"),
        };

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            services: ServiceConfig::from_env(),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
