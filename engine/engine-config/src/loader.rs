//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable overrides.

use crate::CentralConfig;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Standard locations to search for config.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",    // Current directory
    "../config.toml", // Parent directory (when running from subdirectory)
];

/// Load the central configuration from config.toml.
///
/// Searches for config.toml in the following order:
/// 1. Path specified by APV_CONFIG environment variable
/// 2. Current directory (config.toml)
/// 3. Parent directory (../config.toml)
///
/// After loading, environment variable overrides are applied.
pub fn load_config() -> CentralConfig {
    if let Ok(path) = std::env::var("APV_CONFIG") {
        let path = PathBuf::from(&path);
        if path.exists() {
            info!("Loading config from APV_CONFIG: {}", path.display());
            return load_from_path(&path);
        }
        warn!("APV_CONFIG={} not found, searching defaults", path.display());
    }

    for path_str in CONFIG_SEARCH_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return load_from_path(&path);
        }
    }

    debug!("No config.toml found, using built-in defaults");
    apply_env_overrides(CentralConfig::default())
}

/// Load configuration from a specific path.
///
/// A missing or malformed file is logged and replaced by the defaults.
pub fn load_from_path(path: &PathBuf) -> CentralConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => apply_env_overrides(config),
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                apply_env_overrides(CentralConfig::default())
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}, using defaults", path.display(), e);
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (u32, f64, bool, etc.); unparseable values are ignored
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        if let Ok(v) =
            std::env::var($key).and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent))
        {
            $config.$section.$field = v;
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: APV_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    // Common
    env_override!(config, common.log_level, "APV_COMMON_LOG_LEVEL");
    env_override!(config, common.seed, "APV_COMMON_SEED", parse);

    // Search
    env_override!(config, search.iterations, "APV_SEARCH_ITERATIONS", parse);
    env_override!(config, search.c_puct, "APV_SEARCH_C_PUCT", parse);
    env_override!(
        config,
        search.virtual_loss,
        "APV_SEARCH_VIRTUAL_LOSS",
        parse
    );
    env_override!(
        config,
        search.dirichlet_alpha,
        "APV_SEARCH_DIRICHLET_ALPHA",
        parse
    );
    env_override!(
        config,
        search.dirichlet_epsilon,
        "APV_SEARCH_DIRICHLET_EPSILON",
        parse
    );
    env_override!(config, search.root_noise, "APV_SEARCH_ROOT_NOISE", parse);
    env_override!(config, search.leaf_noise, "APV_SEARCH_LEAF_NOISE", parse);
    env_override!(
        config,
        search.max_concurrency,
        "APV_SEARCH_MAX_CONCURRENCY",
        parse
    );
    env_override!(
        config,
        search.queue_capacity,
        "APV_SEARCH_QUEUE_CAPACITY",
        parse
    );
    env_override!(
        config,
        search.batcher_margin,
        "APV_SEARCH_BATCHER_MARGIN",
        parse
    );
    env_override!(
        config,
        search.batcher_poll_us,
        "APV_SEARCH_BATCHER_POLL_US",
        parse
    );
    env_override!(
        config,
        search.guard_poll_us,
        "APV_SEARCH_GUARD_POLL_US",
        parse
    );
    env_override!(
        config,
        search.random_symmetry,
        "APV_SEARCH_RANDOM_SYMMETRY",
        parse
    );

    // Board
    env_override!(config, board.size, "APV_BOARD_SIZE", parse);
    env_override!(config, board.komi, "APV_BOARD_KOMI", parse);

    // Self-play
    env_override!(config, selfplay.games, "APV_SELFPLAY_GAMES", parse);
    env_override!(config, selfplay.max_moves, "APV_SELFPLAY_MAX_MOVES", parse);
    env_override!(
        config,
        selfplay.temp_threshold,
        "APV_SELFPLAY_TEMP_THRESHOLD",
        parse
    );
    env_override!(
        config,
        selfplay.reuse_tree,
        "APV_SELFPLAY_REUSE_TREE",
        parse
    );

    config
}
