//! Configuration struct definitions.
//!
//! All config structs with serde deserialization support and default values.

use crate::defaults;
use apv_mcts::MctsConfig;
use serde::Deserialize;
use std::time::Duration;

// ============================================================================
// Serde default functions (required for #[serde(default = "...")])
// These call the accessor functions from defaults module
// ============================================================================

fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_seed() -> u64 {
    defaults::seed()
}
fn d_iterations() -> u32 {
    defaults::iterations()
}
fn d_c_puct() -> f64 {
    defaults::c_puct()
}
fn d_virtual_loss() -> u32 {
    defaults::virtual_loss()
}
fn d_dirichlet_alpha() -> f64 {
    defaults::dirichlet_alpha()
}
fn d_dirichlet_epsilon() -> f64 {
    defaults::dirichlet_epsilon()
}
fn d_root_noise() -> bool {
    defaults::root_noise()
}
fn d_leaf_noise() -> bool {
    defaults::leaf_noise()
}
fn d_max_concurrency() -> usize {
    defaults::max_concurrency()
}
fn d_queue_capacity() -> usize {
    defaults::queue_capacity()
}
fn d_batcher_margin() -> u32 {
    defaults::batcher_margin()
}
fn d_batcher_poll_us() -> u64 {
    defaults::batcher_poll_us()
}
fn d_guard_poll_us() -> u64 {
    defaults::guard_poll_us()
}
fn d_random_symmetry() -> bool {
    defaults::random_symmetry()
}
fn d_board_size() -> usize {
    defaults::board_size()
}
fn d_komi() -> f64 {
    defaults::komi()
}
fn d_games() -> u32 {
    defaults::games()
}
fn d_max_moves() -> u32 {
    defaults::max_moves()
}
fn d_temp_threshold() -> u32 {
    defaults::temp_threshold()
}
fn d_reuse_tree() -> bool {
    defaults::reuse_tree()
}

// ============================================================================
// Config structs
// ============================================================================

/// Root configuration, one field per TOML section.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub selfplay: SelfplayConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommonConfig {
    #[serde(default = "d_log_level")]
    pub log_level: String,
    #[serde(default = "d_seed")]
    pub seed: u64,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            log_level: d_log_level(),
            seed: d_seed(),
        }
    }
}

/// Search parameters as written in config.toml.
///
/// Durations are stored in microseconds so they stay plain integers in TOML
/// and env vars; [`SearchConfig::to_mcts_config`] converts them.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    #[serde(default = "d_iterations")]
    pub iterations: u32,
    #[serde(default = "d_c_puct")]
    pub c_puct: f64,
    #[serde(default = "d_virtual_loss")]
    pub virtual_loss: u32,
    #[serde(default = "d_dirichlet_alpha")]
    pub dirichlet_alpha: f64,
    #[serde(default = "d_dirichlet_epsilon")]
    pub dirichlet_epsilon: f64,
    #[serde(default = "d_root_noise")]
    pub root_noise: bool,
    #[serde(default = "d_leaf_noise")]
    pub leaf_noise: bool,
    #[serde(default = "d_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "d_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "d_batcher_margin")]
    pub batcher_margin: u32,
    #[serde(default = "d_batcher_poll_us")]
    pub batcher_poll_us: u64,
    #[serde(default = "d_guard_poll_us")]
    pub guard_poll_us: u64,
    #[serde(default = "d_random_symmetry")]
    pub random_symmetry: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            iterations: d_iterations(),
            c_puct: d_c_puct(),
            virtual_loss: d_virtual_loss(),
            dirichlet_alpha: d_dirichlet_alpha(),
            dirichlet_epsilon: d_dirichlet_epsilon(),
            root_noise: d_root_noise(),
            leaf_noise: d_leaf_noise(),
            max_concurrency: d_max_concurrency(),
            queue_capacity: d_queue_capacity(),
            batcher_margin: d_batcher_margin(),
            batcher_poll_us: d_batcher_poll_us(),
            guard_poll_us: d_guard_poll_us(),
            random_symmetry: d_random_symmetry(),
        }
    }
}

impl SearchConfig {
    /// Build the engine-level search config. Validation happens when the
    /// search is constructed.
    pub fn to_mcts_config(&self) -> MctsConfig {
        MctsConfig {
            c_puct: self.c_puct as f32,
            virtual_loss: self.virtual_loss,
            dirichlet_alpha: self.dirichlet_alpha as f32,
            dirichlet_epsilon: self.dirichlet_epsilon as f32,
            root_noise: self.root_noise,
            leaf_noise: self.leaf_noise,
            max_concurrency: self.max_concurrency,
            queue_capacity: self.queue_capacity,
            batcher_margin: self.batcher_margin,
            batcher_poll: Duration::from_micros(self.batcher_poll_us),
            guard_poll: Duration::from_micros(self.guard_poll_us),
            random_symmetry: self.random_symmetry,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BoardConfig {
    #[serde(default = "d_board_size")]
    pub size: usize,
    #[serde(default = "d_komi")]
    pub komi: f64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            size: d_board_size(),
            komi: d_komi(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SelfplayConfig {
    #[serde(default = "d_games")]
    pub games: u32,
    #[serde(default = "d_max_moves")]
    pub max_moves: u32,
    #[serde(default = "d_temp_threshold")]
    pub temp_threshold: u32,
    #[serde(default = "d_reuse_tree")]
    pub reuse_tree: bool,
}

impl Default for SelfplayConfig {
    fn default() -> Self {
        Self {
            games: d_games(),
            max_moves: d_max_moves(),
            temp_threshold: d_temp_threshold(),
            reuse_tree: d_reuse_tree(),
        }
    }
}
