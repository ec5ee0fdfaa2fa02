//! # futarchy-sim
//!
//! Off-chain simulator for a futarchy market.
//!
//! Replays a seeded random order flow against one [`FutarchyMarket`]: spot
//! trading, a proposal opening part way through, conditional trading in
//! batched sessions, and resolution. Every batch is recorded in a
//! [`ScenarioReport`](scenario::ScenarioReport) and lifecycle changes are
//! broadcast on an [`EventBus`](events::EventBus).
//!
//! ## Modules
//!
//! - [`config`] — TOML configuration with per-field defaults
//! - [`events`] — Broadcast of market lifecycle events
//! - [`scenario`] — Scenario runner and report
//! - [`shared`] — Single-writer shared market handle
//!
//! [`FutarchyMarket`]: futarchy_market::FutarchyMarket

pub mod config;
pub mod events;
pub mod scenario;
pub mod shared;

pub use config::SimConfig;
pub use events::{EventBus, MarketEvent};
pub use scenario::{run_scenario, BatchReport, ScenarioReport};
pub use shared::SharedMarket;

use futarchy_market::MarketError;
use futarchy_oracle::OracleError;

/// Error types for the simulator.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Config file could not be read.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for [`SimConfig`].
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config values the market would reject.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Invalid oracle parameters.
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// Market failure outside a swap session.
    #[error(transparent)]
    Market(#[from] MarketError),
}

/// Convenience result type for the simulator.
pub type Result<T> = std::result::Result<T, SimError>;
