use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration loading error: {0}")]
    ConfigLoad(#[from] ConfigError),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

/// Plain environment variable that overrides `solana.rpc_url`
pub const RPC_URL_ENV: &str = "SOLANA_RPC_URL";

/// Largest page the ledger node serves for getSignaturesForAddress
pub const MAX_PAGE_LIMIT: usize = 1000;

/// Orca Whirlpool, Raydium AMM v4, Jupiter v4
pub const DEFAULT_DEX_PROGRAM_IDS: [&str; 3] = [
    "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc",
    "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8",
    "JUP4Fb2cqiRUcaTHdrPC8h2gNsA2ETXiPDD33WcGuJB",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Ledger node connection settings
    pub solana: SolanaConfig,

    /// History scanning behaviour
    pub scanner: ScannerConfig,

    /// Exchange program table used for swap detection
    pub dex: DexConfig,

    /// Trade record retention and export
    pub export: ExportConfig,

    /// API server configuration
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolanaConfig {
    /// JSON-RPC endpoint of the ledger node
    pub rpc_url: String,

    /// Request timeout in seconds
    pub rpc_timeout_seconds: u64,

    /// Max in-flight RPC requests across all scanners
    pub max_concurrent_requests: usize,

    /// Retries after the initial attempt for retryable failures
    pub max_retries: u32,

    /// First backoff delay in milliseconds, doubled per attempt
    pub retry_base_delay_ms: u64,

    /// Upper bound for a single backoff delay in milliseconds
    pub retry_max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Signatures requested per history page
    pub page_limit: usize,

    /// Pause between pages in milliseconds
    pub throttle_ms: u64,

    /// Transaction details fetched concurrently within one page (1 = sequential)
    pub detail_concurrency: usize,

    /// Token entries scanned concurrently (1 = sequential)
    pub token_concurrency: usize,

    /// Abort the whole run after this many seconds
    pub deadline_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexConfig {
    /// Program identifiers whose presence marks a transaction as a swap
    pub program_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Keep per-trade records in addition to the overlap wallet list
    pub include_trades: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API server host
    pub host: String,

    /// API server port
    pub port: u16,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            solana: SolanaConfig::default(),
            scanner: ScannerConfig::default(),
            dex: DexConfig::default(),
            export: ExportConfig {
                include_trades: false,
            },
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
        }
    }
}

impl Default for SolanaConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            rpc_timeout_seconds: 30,
            max_concurrent_requests: 5,
            max_retries: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 8000,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            page_limit: MAX_PAGE_LIMIT,
            throttle_ms: 50,
            detail_concurrency: 1,
            token_concurrency: 1,
            deadline_seconds: None,
        }
    }
}

impl Default for DexConfig {
    fn default() -> Self {
        Self {
            program_ids: DEFAULT_DEX_PROGRAM_IDS
                .iter()
                .map(|id| id.to_string())
                .collect(),
        }
    }
}

impl SolanaConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "Solana RPC URL is required".to_string(),
            ));
        }

        if self.rpc_timeout_seconds == 0 {
            return Err(ConfigurationError::InvalidValue(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent_requests == 0 {
            return Err(ConfigurationError::InvalidValue(
                "max_concurrent_requests must be greater than 0".to_string(),
            ));
        }

        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(ConfigurationError::InvalidValue(format!(
                "retry_base_delay_ms ({}) exceeds retry_max_delay_ms ({})",
                self.retry_base_delay_ms, self.retry_max_delay_ms
            )));
        }

        Ok(())
    }
}

impl ScannerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.page_limit == 0 || self.page_limit > MAX_PAGE_LIMIT {
            return Err(ConfigurationError::InvalidValue(format!(
                "page_limit must be within 1..={}, got {}",
                MAX_PAGE_LIMIT, self.page_limit
            )));
        }

        if self.detail_concurrency == 0 || self.token_concurrency == 0 {
            return Err(ConfigurationError::InvalidValue(
                "Scanner concurrency settings must be greater than 0".to_string(),
            ));
        }

        if self.deadline_seconds == Some(0) {
            return Err(ConfigurationError::InvalidValue(
                "deadline_seconds must be greater than 0 when set".to_string(),
            ));
        }

        Ok(())
    }
}

impl SystemConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config_builder = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&SystemConfig::default())?);

        if config_path.as_ref().exists() {
            info!(
                "Loading configuration from: {}",
                config_path.as_ref().display()
            );
            config_builder = config_builder.add_source(File::from(config_path.as_ref()));
        } else {
            debug!("Config file not found, using defaults and environment variables");
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix("OVERLAP")
                .try_parsing(true)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("dex.program_ids"),
        );

        let mut system_config: SystemConfig = config_builder.build()?.try_deserialize()?;

        if let Ok(rpc_url) = std::env::var(RPC_URL_ENV) {
            if !rpc_url.trim().is_empty() {
                debug!("Using RPC URL from {}", RPC_URL_ENV);
                system_config.solana.rpc_url = rpc_url.trim().to_string();
            }
        }

        system_config.normalize();
        system_config.validate()?;

        Ok(system_config)
    }

    /// Trim program ids and drop blanks and duplicates, keeping first occurrence order
    pub fn normalize(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.dex.program_ids = self
            .dex
            .program_ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect();
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.solana.validate()?;
        self.scanner.validate()?;

        if self.dex.program_ids.is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "At least one DEX program id is required".to_string(),
            ));
        }

        if self.api.port == 0 {
            return Err(ConfigurationError::InvalidValue(
                "API port cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}
