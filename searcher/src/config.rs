//! Configuration for the searcher binary
//!
//! Configuration is loaded from config.toml with environment variable overrides.
//! CLI arguments take highest priority, followed by env vars, then config.toml.

use anyhow::{anyhow, Result};
use apv_mcts::MctsConfig;
use clap::{ArgAction, Parser, ValueEnum};
use engine_config::{load_config, CentralConfig};
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::level_filters::LevelFilter;

// Load central config once at startup
static CENTRAL_CONFIG: Lazy<CentralConfig> = Lazy::new(load_config);

fn default_log_level() -> String {
    CENTRAL_CONFIG.common.log_level.clone()
}
fn default_seed() -> u64 {
    CENTRAL_CONFIG.common.seed
}
fn default_games() -> u32 {
    CENTRAL_CONFIG.selfplay.games
}
fn default_iterations() -> u32 {
    CENTRAL_CONFIG.search.iterations
}
fn default_max_concurrency() -> usize {
    CENTRAL_CONFIG.search.max_concurrency
}
fn default_virtual_loss() -> u32 {
    CENTRAL_CONFIG.search.virtual_loss
}
fn default_board_size() -> usize {
    CENTRAL_CONFIG.board.size
}
fn default_komi() -> f64 {
    CENTRAL_CONFIG.board.komi
}
fn default_max_moves() -> u32 {
    CENTRAL_CONFIG.selfplay.max_moves
}
fn default_temp_threshold() -> u32 {
    CENTRAL_CONFIG.selfplay.temp_threshold
}
fn default_reuse_tree() -> bool {
    CENTRAL_CONFIG.selfplay.reuse_tree
}

/// Which evaluator scores leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum EvaluatorKind {
    /// Centre-weighted priors and stone-balance value
    Heuristic,
    /// Uniform priors, value 0
    Uniform,
}

#[derive(Parser, Debug, Clone, Serialize)]
#[command(name = "searcher")]
#[command(about = "Self-play driver for the batched Go tree search")]
#[command(
    long_about = "Plays self-play games of small-board Go, running an asynchronous
batched tree search with virtual loss for every move.

Configuration is loaded from config.toml with environment variable overrides.
CLI arguments take highest priority."
)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value_t = default_log_level())]
    pub log_level: String,

    /// Seed for noise, symmetry and move sampling
    #[arg(long, default_value_t = default_seed())]
    pub seed: u64,

    /// Number of games to play
    #[arg(long, default_value_t = default_games())]
    pub games: u32,

    /// Descents per move
    #[arg(long, default_value_t = default_iterations())]
    pub iterations: u32,

    /// Descents allowed in flight at once
    #[arg(long, default_value_t = default_max_concurrency())]
    pub max_concurrency: usize,

    /// Virtual loss applied along in-flight paths
    #[arg(long, default_value_t = default_virtual_loss())]
    pub virtual_loss: u32,

    /// Board side length
    #[arg(long, default_value_t = default_board_size())]
    pub board_size: usize,

    /// Komi added to White's area score
    #[arg(long, default_value_t = default_komi())]
    pub komi: f64,

    /// Stop a game after this many moves
    #[arg(long, default_value_t = default_max_moves())]
    pub max_moves: u32,

    /// Sample moves from the visit distribution before this ply, play the
    /// most visited move after it
    #[arg(long, default_value_t = default_temp_threshold())]
    pub temp_threshold: u32,

    /// Keep the chosen child's subtree between moves
    #[arg(long, action = ArgAction::Set, default_value_t = default_reuse_tree())]
    pub reuse_tree: bool,

    /// Leaf evaluator
    #[arg(long, value_enum, default_value_t = EvaluatorKind::Heuristic)]
    pub evaluator: EvaluatorKind,

    /// Print Prometheus metrics to stdout on exit
    #[arg(long)]
    pub print_metrics: bool,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !(2..=19).contains(&self.board_size) {
            return Err(anyhow!(
                "board_size must be between 2 and 19, got {}",
                self.board_size
            ));
        }

        if self.iterations == 0 {
            return Err(anyhow!("iterations must be greater than 0"));
        }

        if self.max_moves == 0 {
            return Err(anyhow!("max_moves must be greater than 0"));
        }

        if !self.komi.is_finite() {
            return Err(anyhow!("komi must be finite, got {}", self.komi));
        }

        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.log_level
            ));
        }

        self.mcts_config()
            .validate()
            .map_err(|e| anyhow!("invalid search settings: {}", e))
    }

    /// Search settings: the central `[search]` section with CLI overrides.
    pub fn mcts_config(&self) -> MctsConfig {
        CENTRAL_CONFIG
            .search
            .to_mcts_config()
            .with_virtual_loss(self.virtual_loss)
            .with_max_concurrency(self.max_concurrency)
    }
}
