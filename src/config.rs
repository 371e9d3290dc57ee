use crate::{models::variant::Variant, services::auth::BearerGate};
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub variant: Variant,
    pub api_token: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Blob store API for images and JSON documents")]
pub struct Args {
    /// Host to bind to (overrides BLOB_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BLOB_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides BLOB_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Which store to serve (overrides BLOB_STORE_VARIANT)
    #[arg(long, value_enum)]
    pub variant: Option<Variant>,

    /// Shared bearer secret for the json variant (overrides BLOB_STORE_API_TOKEN)
    #[arg(long)]
    pub api_token: Option<String>,

    /// Connection pool size (overrides BLOB_STORE_MAX_CONNECTIONS)
    #[arg(long)]
    pub max_connections: Option<u32>,

    /// Seconds to wait for a pooled connection (overrides BLOB_STORE_ACQUIRE_TIMEOUT_SECS)
    #[arg(long)]
    pub acquire_timeout_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |key| env::var(key).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over values from `lookup` over defaults.
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_host = lookup("BLOB_STORE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parse_env(&lookup, "BLOB_STORE_PORT")?.unwrap_or(8000);
        let env_db = lookup("BLOB_STORE_DATABASE_URL")
            .unwrap_or_else(|| "sqlite://./data/blob_store.db".into());
        let env_variant = match lookup("BLOB_STORE_VARIANT") {
            Some(value) => Variant::from_str(value.trim(), true)
                .map_err(|err| anyhow::anyhow!(err))
                .with_context(|| format!("parsing BLOB_STORE_VARIANT value `{}`", value))?,
            None => Variant::Images,
        };
        let env_token = lookup("BLOB_STORE_API_TOKEN");
        let env_max_connections = parse_env(&lookup, "BLOB_STORE_MAX_CONNECTIONS")?.unwrap_or(5);
        let env_acquire_timeout =
            parse_env(&lookup, "BLOB_STORE_ACQUIRE_TIMEOUT_SECS")?.unwrap_or(5);

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            variant: args.variant.unwrap_or(env_variant),
            api_token: args.api_token.or(env_token).filter(|t| !t.is_empty()),
            max_connections: args.max_connections.unwrap_or(env_max_connections),
            acquire_timeout: Duration::from_secs(
                args.acquire_timeout_secs.unwrap_or(env_acquire_timeout),
            ),
        };

        if cfg.max_connections == 0 {
            bail!("max connections must be at least 1");
        }
        if cfg.variant.requires_auth() && cfg.api_token.is_none() {
            bail!(
                "the {} variant requires an API token (--api-token or BLOB_STORE_API_TOKEN)",
                cfg.variant
            );
        }

        Ok(cfg)
    }

    /// The authorization gate for this variant, if it needs one.
    pub fn bearer_gate(&self) -> Option<BearerGate> {
        if !self.variant.requires_auth() {
            return None;
        }
        self.api_token.as_deref().map(BearerGate::new)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Hand-written so the token never reaches the startup log.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("variant", &self.variant)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

fn parse_env<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .with_context(|| format!("parsing {} value `{}`", key, value))
        })
        .transpose()
}
