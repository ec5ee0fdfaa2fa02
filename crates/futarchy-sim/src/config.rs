//! Simulator configuration file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use futarchy_oracle::TwapConfig;
use futarchy_types::MAX_BPS;

use crate::{Result, SimError};

/// Environment variable naming the config file when no path is given.
pub const CONFIG_ENV_VAR: &str = "FUTARCHY_SIM_CONFIG";

/// Complete simulator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Oracle parameters shared by every pool.
    #[serde(default)]
    pub oracle: TwapConfig,
    /// Initial spot pool.
    #[serde(default)]
    pub spot: SpotConfig,
    /// Proposal schedule.
    #[serde(default)]
    pub proposal: ProposalConfig,
    /// Random order flow.
    #[serde(default)]
    pub flow: FlowConfig,
    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Initial spot pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotConfig {
    /// Asset reserve.
    #[serde(default = "default_reserve")]
    pub asset_reserve: u64,
    /// Stable reserve.
    #[serde(default = "default_reserve")]
    pub stable_reserve: u64,
    /// Swap fee in bps.
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u16,
}

/// Proposal schedule, in batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalConfig {
    /// Number of outcomes.
    #[serde(default = "default_outcomes")]
    pub outcomes: usize,
    /// Share of spot liquidity moved into the conditional markets.
    #[serde(default = "default_ratio_bps")]
    pub conditional_liquidity_ratio_bps: u16,
    /// Conditional pool fee in bps.
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u16,
    /// Batch at which the proposal opens.
    #[serde(default = "default_start_batch")]
    pub start_batch: u64,
    /// Batches the proposal stays open.
    #[serde(default = "default_duration_batches")]
    pub duration_batches: u64,
    /// Outcome that wins at resolution.
    #[serde(default)]
    pub winner: usize,
}

/// Random order flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowConfig {
    /// RNG seed. The same seed replays the same scenario.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Number of batches.
    #[serde(default = "default_batches")]
    pub batches: u64,
    /// Swaps attempted per batch.
    #[serde(default = "default_swaps_per_batch")]
    pub swaps_per_batch: u32,
    /// Simulated time between batches.
    #[serde(default = "default_batch_interval_ms")]
    pub batch_interval_ms: u64,
    /// Largest swap, as bps of the input reserve.
    #[serde(default = "default_max_swap_bps")]
    pub max_swap_bps: u16,
    /// Probability that a swap on the winning outcome buys asset, in bps.
    #[serde(default = "default_winner_buy_bps")]
    pub winner_buy_bps: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace" | "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions

fn default_reserve() -> u64 {
    1_000_000_000_000
}

fn default_fee_bps() -> u16 {
    30
}

fn default_outcomes() -> usize {
    2
}

fn default_ratio_bps() -> u16 {
    5_000
}

fn default_start_batch() -> u64 {
    10
}

fn default_duration_batches() -> u64 {
    30
}

fn default_seed() -> u64 {
    42
}

fn default_batches() -> u64 {
    60
}

fn default_swaps_per_batch() -> u32 {
    4
}

fn default_batch_interval_ms() -> u64 {
    futarchy_types::MS_PER_MINUTE
}

fn default_max_swap_bps() -> u16 {
    50
}

fn default_winner_buy_bps() -> u16 {
    7_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SpotConfig {
    fn default() -> Self {
        Self {
            asset_reserve: default_reserve(),
            stable_reserve: default_reserve(),
            fee_bps: default_fee_bps(),
        }
    }
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            outcomes: default_outcomes(),
            conditional_liquidity_ratio_bps: default_ratio_bps(),
            fee_bps: default_fee_bps(),
            start_batch: default_start_batch(),
            duration_batches: default_duration_batches(),
            winner: 0,
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            batches: default_batches(),
            swaps_per_batch: default_swaps_per_batch(),
            batch_interval_ms: default_batch_interval_ms(),
            max_swap_bps: default_max_swap_bps(),
            winner_buy_bps: default_winner_buy_bps(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl SimConfig {
    /// Load configuration from `path`, else from [`CONFIG_ENV_VAR`].
    ///
    /// Falls back to defaults if neither names a file.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = path.or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));
        let config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reject parameter combinations the market would refuse.
    pub fn validate(&self) -> Result<()> {
        self.oracle.validate()?;
        if u64::from(self.spot.fee_bps) >= MAX_BPS || u64::from(self.proposal.fee_bps) >= MAX_BPS
        {
            return Err(SimError::InvalidConfig("fees must be below 10000 bps".into()));
        }
        if u64::from(self.proposal.conditional_liquidity_ratio_bps) > MAX_BPS {
            return Err(SimError::InvalidConfig(
                "conditional_liquidity_ratio_bps exceeds 10000".into(),
            ));
        }
        if self.proposal.outcomes < 2 {
            return Err(SimError::InvalidConfig("a proposal needs 2 or more outcomes".into()));
        }
        if self.proposal.winner >= self.proposal.outcomes {
            return Err(SimError::InvalidConfig(format!(
                "winner {} out of range for {} outcomes",
                self.proposal.winner, self.proposal.outcomes
            )));
        }
        if self.flow.batch_interval_ms == 0 {
            return Err(SimError::InvalidConfig("batch_interval_ms must be positive".into()));
        }
        if self.flow.max_swap_bps == 0 || u64::from(self.flow.max_swap_bps) > MAX_BPS {
            return Err(SimError::InvalidConfig("max_swap_bps must be in 1..=10000".into()));
        }
        if u64::from(self.flow.winner_buy_bps) > MAX_BPS {
            return Err(SimError::InvalidConfig("winner_buy_bps exceeds 10000".into()));
        }
        Ok(())
    }
}
