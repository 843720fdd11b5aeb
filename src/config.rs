use crate::services::resource_service::DEFAULT_TRANSACTION_TIMEOUT;
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub song_service_url: String,
    pub registry_timeout_secs: u64,
    pub transaction_timeout_secs: u64,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Audio resource service")]
pub struct Args {
    /// Host to bind to (overrides RESOURCE_SERVICE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides RESOURCE_SERVICE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides RESOURCE_SERVICE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Base URL of the song metadata service (overrides RESOURCE_SERVICE_SONG_SERVICE_URL)
    #[arg(long)]
    pub song_service_url: Option<String>,

    /// Per-request timeout for song service calls, in seconds
    #[arg(long)]
    pub registry_timeout_secs: Option<u64>,

    /// Upper bound for a create/delete transaction, in seconds
    #[arg(long)]
    pub transaction_timeout_secs: Option<u64>,

    /// Maximum accepted upload size in bytes
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<(Self, bool)> {
        // --- Environment fallback ---
        let env_host = env::var("RESOURCE_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_or("RESOURCE_SERVICE_PORT", 8080u16)?;
        let env_db = env::var("RESOURCE_SERVICE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/resource_service.db".into());
        let env_song = env::var("RESOURCE_SERVICE_SONG_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:8081".into());
        let env_registry_timeout = env_or("RESOURCE_SERVICE_REGISTRY_TIMEOUT_SECS", 5u64)?;
        let env_tx_timeout = env_or(
            "RESOURCE_SERVICE_TRANSACTION_TIMEOUT_SECS",
            DEFAULT_TRANSACTION_TIMEOUT.as_secs(),
        )?;
        let env_max_upload = env_or("RESOURCE_SERVICE_MAX_UPLOAD_BYTES", 50 * 1024 * 1024usize)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            song_service_url: args.song_service_url.unwrap_or(env_song),
            registry_timeout_secs: args.registry_timeout_secs.unwrap_or(env_registry_timeout),
            transaction_timeout_secs: args
                .transaction_timeout_secs
                .unwrap_or(env_tx_timeout),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.transaction_timeout_secs)
    }
}

/// Read and parse an environment variable, falling back to `default` when unset.
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
