//! Pool configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use tide_pool::state::validate_params;
use tide_types::params::{DEFAULT_APR_CEILING, DEFAULT_PROCESS_PERIOD_SECS, DEFAULT_UNDERLYING_DECIMALS};
use tide_types::{AccountId, PoolParams};
use tide_utils::LogFormat;

use crate::ServiceError;

/// Configuration for one pool and its wrapper.
///
/// Can be loaded from a TOML file via [`PoolConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Rates are integers over
/// `FEE_COEFFICIENT` (1e8 = 100%).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Decimals of the underlying token (at most 18).
    #[serde(default = "default_underlying_decimals")]
    pub underlying_decimals: u8,

    /// Highest APR the APR manager may set.
    #[serde(default = "default_apr_ceiling")]
    pub apr_ceiling: u64,

    #[serde(default)]
    pub target_apr: u64,

    #[serde(default)]
    pub mint_fee_rate: u64,

    #[serde(default)]
    pub redeem_fee_rate: u64,

    #[serde(default)]
    pub protocol_fee_rate: u64,

    #[serde(default)]
    pub interest_cost_fee_rate: u64,

    /// Share of accrued income owed to the manager.
    #[serde(default)]
    pub management_fee_rate: u64,

    /// Minimum underlying a redeem must leave in the pool, in base units.
    #[serde(default)]
    pub capital_lower_bound: u64,

    /// Delay between a redeem and the maturity of its withdrawal order.
    #[serde(default = "default_process_period_secs")]
    pub process_period_secs: u64,

    /// Maximum peg deviation before mint and redeem halt; unset disables the guard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depeg_tolerance: Option<u64>,

    /// Holder of every role at genesis.
    #[serde(default = "default_admin")]
    pub admin: String,

    /// Collectors default to the admin when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_collector: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_fee_collector: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_fee_collector: Option<String>,

    /// Pool account holding the claim tokens behind wrapper shares.
    #[serde(default = "default_wrapper_account")]
    pub wrapper_account: String,

    /// Directory for pool and wrapper snapshots.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// How often the daemon checkpoints accrual and writes a snapshot.
    #[serde(default = "default_checkpoint_interval_secs")]
    pub checkpoint_interval_secs: u64,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_underlying_decimals() -> u8 {
    DEFAULT_UNDERLYING_DECIMALS
}

fn default_apr_ceiling() -> u64 {
    DEFAULT_APR_CEILING
}

fn default_process_period_secs() -> u64 {
    DEFAULT_PROCESS_PERIOD_SECS
}

fn default_admin() -> String {
    "admin".to_string()
}

fn default_wrapper_account() -> String {
    "wrapper".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./tide_data")
}

fn default_checkpoint_interval_secs() -> u64 {
    3_600
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl PoolConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, ServiceError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ServiceError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ServiceError> {
        toml::from_str(s).map_err(|e| ServiceError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("PoolConfig is always serializable to TOML")
    }

    /// Reject configurations the pool would refuse to start with.
    pub fn validate(&self) -> Result<(), ServiceError> {
        validate_params(&self.pool_params())?;
        if !self.wrapper_account().is_valid() {
            return Err(ServiceError::Config("wrapper_account must not be empty".into()));
        }
        if self.wrapper_account() == self.admin() {
            return Err(ServiceError::Config(
                "wrapper_account must differ from admin".into(),
            ));
        }
        let params = self.pool_params();
        for (name, collector) in [
            ("fee_collector", &params.fee_collector),
            ("protocol_fee_collector", &params.protocol_fee_collector),
            ("management_fee_collector", &params.management_fee_collector),
        ] {
            if *collector == self.wrapper_account() {
                return Err(ServiceError::Config(format!(
                    "{name} must differ from wrapper_account"
                )));
            }
        }
        if self.checkpoint_interval_secs == 0 {
            return Err(ServiceError::Config(
                "checkpoint_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn admin(&self) -> AccountId {
        AccountId::new(self.admin.clone())
    }

    pub fn wrapper_account(&self) -> AccountId {
        AccountId::new(self.wrapper_account.clone())
    }

    /// The pool parameters this configuration describes.
    pub fn pool_params(&self) -> PoolParams {
        let admin = self.admin();
        let collector = |c: &Option<String>| c.clone().map(AccountId::new).unwrap_or_else(|| admin.clone());
        PoolParams {
            underlying_decimals: self.underlying_decimals,
            apr_ceiling: self.apr_ceiling,
            target_apr: self.target_apr,
            mint_fee_rate: self.mint_fee_rate,
            redeem_fee_rate: self.redeem_fee_rate,
            protocol_fee_rate: self.protocol_fee_rate,
            interest_cost_fee_rate: self.interest_cost_fee_rate,
            management_fee_rate: self.management_fee_rate,
            capital_lower_bound: u128::from(self.capital_lower_bound),
            process_period_secs: self.process_period_secs,
            depeg_tolerance: self.depeg_tolerance,
            fee_collector: collector(&self.fee_collector),
            protocol_fee_collector: collector(&self.protocol_fee_collector),
            management_fee_collector: collector(&self.management_fee_collector),
            admin,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            underlying_decimals: default_underlying_decimals(),
            apr_ceiling: default_apr_ceiling(),
            target_apr: 0,
            mint_fee_rate: 0,
            redeem_fee_rate: 0,
            protocol_fee_rate: 0,
            interest_cost_fee_rate: 0,
            management_fee_rate: 0,
            capital_lower_bound: 0,
            process_period_secs: default_process_period_secs(),
            depeg_tolerance: None,
            admin: default_admin(),
            fee_collector: None,
            protocol_fee_collector: None,
            management_fee_collector: None,
            wrapper_account: default_wrapper_account(),
            data_dir: default_data_dir(),
            checkpoint_interval_secs: default_checkpoint_interval_secs(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = PoolConfig {
            depeg_tolerance: Some(500_000),
            fee_collector: Some("treasury".into()),
            ..PoolConfig::default()
        };
        let toml_str = config.to_toml_string();
        let parsed = PoolConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = PoolConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.underlying_decimals, 6);
        assert_eq!(config.process_period_secs, 7 * 86_400);
        assert_eq!(config.log_format, LogFormat::Human);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            target_apr = 8000000
            mint_fee_rate = 1000000
            log_format = "json"
            fee_collector = "treasury"
        "#;
        let config = PoolConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.target_apr, 8_000_000);
        assert_eq!(config.log_format, LogFormat::Json);
        let params = config.pool_params();
        assert_eq!(params.mint_fee_rate, 1_000_000);
        assert_eq!(params.fee_collector, AccountId::new("treasury"));
        assert_eq!(params.protocol_fee_collector, AccountId::new("admin"));
    }

    #[test]
    fn validate_rejects_excessive_fee() {
        let config = PoolConfig {
            redeem_fee_rate: 2_000_000,
            ..PoolConfig::default()
        };
        assert!(matches!(config.validate(), Err(ServiceError::Pool(_))));
    }

    #[test]
    fn validate_rejects_wrapper_owned_by_admin() {
        let config = PoolConfig {
            wrapper_account: "admin".into(),
            ..PoolConfig::default()
        };
        assert!(matches!(config.validate(), Err(ServiceError::Config(_))));
    }

    #[test]
    fn validate_rejects_wrapper_as_collector() {
        for config in [
            PoolConfig {
                fee_collector: Some("wrapper".into()),
                ..PoolConfig::default()
            },
            PoolConfig {
                protocol_fee_collector: Some("wrapper".into()),
                ..PoolConfig::default()
            },
            PoolConfig {
                management_fee_collector: Some("wrapper".into()),
                ..PoolConfig::default()
            },
        ] {
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("wrapper_account"), "{err}");
        }
        let config = PoolConfig {
            fee_collector: Some("treasury".into()),
            ..PoolConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = PoolConfig::from_toml_file("/nonexistent/tide.toml");
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }
}
