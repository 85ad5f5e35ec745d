//! Default configuration values loaded from config.defaults.toml.
//!
//! The file is embedded at compile time, so the binary and the checked-in
//! defaults can never disagree.

use once_cell::sync::Lazy;
use serde::Deserialize;

/// The embedded defaults TOML file (loaded at compile time)
const DEFAULTS_TOML: &str = include_str!("../../../config.defaults.toml");

/// Parsed defaults structure (parsed once at first use)
static DEFAULTS: Lazy<DefaultsConfig> = Lazy::new(|| {
    toml::from_str(DEFAULTS_TOML).expect("config.defaults.toml should be valid TOML")
});

// ============================================================================
// Internal structs for parsing config.defaults.toml
// ============================================================================

#[derive(Debug, Deserialize)]
struct DefaultsConfig {
    common: CommonDefaults,
    search: SearchDefaults,
    board: BoardDefaults,
    selfplay: SelfplayDefaults,
}

#[derive(Debug, Deserialize)]
struct CommonDefaults {
    log_level: String,
    seed: u64,
}

#[derive(Debug, Deserialize)]
struct SearchDefaults {
    iterations: u32,
    c_puct: f64,
    virtual_loss: u32,
    dirichlet_alpha: f64,
    dirichlet_epsilon: f64,
    root_noise: bool,
    leaf_noise: bool,
    max_concurrency: usize,
    queue_capacity: usize,
    batcher_margin: u32,
    batcher_poll_us: u64,
    guard_poll_us: u64,
    random_symmetry: bool,
}

#[derive(Debug, Deserialize)]
struct BoardDefaults {
    size: usize,
    komi: f64,
}

#[derive(Debug, Deserialize)]
struct SelfplayDefaults {
    games: u32,
    max_moves: u32,
    temp_threshold: u32,
    reuse_tree: bool,
}

// ============================================================================
// Public accessor functions
// ============================================================================

// Common
pub fn log_level() -> &'static str {
    &DEFAULTS.common.log_level
}
pub fn seed() -> u64 {
    DEFAULTS.common.seed
}

// Search
pub fn iterations() -> u32 {
    DEFAULTS.search.iterations
}
pub fn c_puct() -> f64 {
    DEFAULTS.search.c_puct
}
pub fn virtual_loss() -> u32 {
    DEFAULTS.search.virtual_loss
}
pub fn dirichlet_alpha() -> f64 {
    DEFAULTS.search.dirichlet_alpha
}
pub fn dirichlet_epsilon() -> f64 {
    DEFAULTS.search.dirichlet_epsilon
}
pub fn root_noise() -> bool {
    DEFAULTS.search.root_noise
}
pub fn leaf_noise() -> bool {
    DEFAULTS.search.leaf_noise
}
pub fn max_concurrency() -> usize {
    DEFAULTS.search.max_concurrency
}
pub fn queue_capacity() -> usize {
    DEFAULTS.search.queue_capacity
}
pub fn batcher_margin() -> u32 {
    DEFAULTS.search.batcher_margin
}
pub fn batcher_poll_us() -> u64 {
    DEFAULTS.search.batcher_poll_us
}
pub fn guard_poll_us() -> u64 {
    DEFAULTS.search.guard_poll_us
}
pub fn random_symmetry() -> bool {
    DEFAULTS.search.random_symmetry
}

// Board
pub fn board_size() -> usize {
    DEFAULTS.board.size
}
pub fn komi() -> f64 {
    DEFAULTS.board.komi
}

// Self-play
pub fn games() -> u32 {
    DEFAULTS.selfplay.games
}
pub fn max_moves() -> u32 {
    DEFAULTS.selfplay.max_moves
}
pub fn temp_threshold() -> u32 {
    DEFAULTS.selfplay.temp_threshold
}
pub fn reuse_tree() -> bool {
    DEFAULTS.selfplay.reuse_tree
}
