//! Configuration loader for the voucher minter pool

use core_logic::{ConfigError, env_override, load_dotenv, load_toml};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Environment variable that overrides `client.private_key_hex`.
pub const PRIVATE_KEY_ENV: &str = "FLOW_PRIVATE_KEY";

/// Settings of one minter client.
///
/// A pool holds one base config; every pooled client gets a copy that only
/// differs in [`key_index`](Self::key_index), see [`with_key_index`](Self::with_key_index).
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct VoucherClientConfig {
    /// Access node host, with or without an `http(s)://` scheme
    pub host: String,
    /// Access node REST port
    pub port: u16,
    /// Hex-encoded private key of the admin account
    #[serde(default)]
    pub private_key_hex: String,
    /// Account key index this client signs with
    #[serde(default)]
    pub key_index: u32,
    pub voucher_address: String,
    pub non_fungible_token_address: String,
    #[serde(default)]
    pub fungible_token_address: String,
    #[serde(default)]
    pub fusd_address: String,
    #[serde(default)]
    pub flow_token_address: String,
    /// Account that proposes, pays for and authorizes mint transactions
    pub admin_account_address: String,
    /// How many times a transaction result is polled before giving up
    #[serde(default = "default_wait_for_seal_tries")]
    pub wait_for_seal_tries: u32,
    /// Delay between two seal polls
    #[serde(default = "default_seal_poll_interval_ms")]
    pub seal_poll_interval_ms: u64,
}

fn default_wait_for_seal_tries() -> u32 {
    20
}

fn default_seal_poll_interval_ms() -> u64 {
    1000
}

impl fmt::Debug for VoucherClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoucherClientConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("private_key_hex", &"***REDACTED***")
            .field("key_index", &self.key_index)
            .field("voucher_address", &self.voucher_address)
            .field("non_fungible_token_address", &self.non_fungible_token_address)
            .field("fungible_token_address", &self.fungible_token_address)
            .field("fusd_address", &self.fusd_address)
            .field("flow_token_address", &self.flow_token_address)
            .field("admin_account_address", &self.admin_account_address)
            .field("wait_for_seal_tries", &self.wait_for_seal_tries)
            .field("seal_poll_interval_ms", &self.seal_poll_interval_ms)
            .finish()
    }
}

impl VoucherClientConfig {
    /// Copy of this config bound to another account key.
    pub fn with_key_index(&self, key_index: u32) -> Self {
        let mut config = self.clone();
        config.key_index = key_index;
        config
    }

    /// Base URL of the access node REST API.
    pub fn access_endpoint(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{}", host, self.port)
        } else {
            format!("http://{}:{}", host, self.port)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::missing("client.host"));
        }
        if self.port == 0 {
            return Err(ConfigError::invalid("client.port", "must not be 0"));
        }
        for (field, value) in [
            ("client.voucher_address", &self.voucher_address),
            (
                "client.non_fungible_token_address",
                &self.non_fungible_token_address,
            ),
            ("client.admin_account_address", &self.admin_account_address),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::missing(field));
            }
        }
        if !self.private_key_hex.is_empty() && hex::decode(&self.private_key_hex).is_err() {
            return Err(ConfigError::invalid(
                "client.private_key_hex",
                "expected a hex string",
            ));
        }
        if self.wait_for_seal_tries == 0 {
            return Err(ConfigError::invalid(
                "client.wait_for_seal_tries",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Settings of the bounded client pool.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
    /// First account key index handed to the pool
    #[serde(default)]
    pub key_start_index: u32,
    /// Number of consecutive key indices (and maximum number of clients)
    pub key_capacity: u32,
    /// Idle clients kept for reuse; defaults to `key_capacity`
    #[serde(default)]
    pub max_idle: Option<usize>,
    /// How long `borrow` waits for a client when all are in use
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    /// Wait for a client instead of failing immediately when saturated
    #[serde(default = "default_true")]
    pub block_when_exhausted: bool,
    #[serde(default = "default_true")]
    pub test_on_create: bool,
    #[serde(default = "default_true")]
    pub test_on_borrow: bool,
    #[serde(default)]
    pub test_on_return: bool,
    /// Upper bound of one liveness probe
    #[serde(default = "default_validation_timeout_ms")]
    pub validation_timeout_ms: u64,
}

fn default_acquire_timeout_ms() -> u64 {
    120_000
}

fn default_validation_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl PoolConfig {
    /// Defaults for a pool over `[key_start_index, key_start_index + key_capacity)`.
    pub fn new(key_start_index: u32, key_capacity: u32) -> Self {
        Self {
            key_start_index,
            key_capacity,
            max_idle: None,
            acquire_timeout_ms: default_acquire_timeout_ms(),
            block_when_exhausted: true,
            test_on_create: true,
            test_on_borrow: true,
            test_on_return: false,
            validation_timeout_ms: default_validation_timeout_ms(),
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = Some(max_idle);
        self
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_timeout_ms)
    }

    pub fn max_idle(&self) -> usize {
        self.max_idle.unwrap_or(self.key_capacity as usize)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_capacity == 0 {
            return Err(ConfigError::invalid(
                "pool.key_capacity",
                "must be greater than zero",
            ));
        }
        if self.key_start_index.checked_add(self.key_capacity).is_none() {
            return Err(ConfigError::invalid(
                "pool.key_capacity",
                "key range overflows u32",
            ));
        }
        if self.max_idle == Some(0) {
            return Err(ConfigError::invalid(
                "pool.max_idle",
                "must be greater than zero",
            ));
        }
        if self.acquire_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "pool.acquire_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.validation_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "pool.validation_timeout_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Complete configuration file of the `voucher-pool` binary.
#[derive(Debug, Clone, Deserialize)]
pub struct MinterConfig {
    pub client: VoucherClientConfig,
    pub pool: PoolConfig,
}

impl MinterConfig {
    /// Load configuration from a TOML file
    ///
    /// A `.env` file is honoured and [`PRIVATE_KEY_ENV`] replaces the private
    /// key from the file.
    ///
    /// # Example
    /// ```ignore
    /// let config = MinterConfig::from_path("config/voucher-pool.toml")?;
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_dotenv();
        let mut config: MinterConfig = load_toml(path)?;
        if let Some(key) = env_override(PRIVATE_KEY_ENV) {
            config.client.private_key_hex = key;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.client.validate()?;
        self.pool.validate()
    }
}
