//! Prometheus metrics for the searcher.
//!
//! Search throughput, batching efficiency and game outcomes. The registry is
//! dumped as text on exit when `--print-metrics` is set.

use anyhow::Result;
use apv_mcts::SearchStats;
use games_go::Color;
use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Once;
use tracing::warn;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ========== Game Counters ==========

    /// Total self-play games completed
    pub static ref GAMES_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("searcher_games_total", "Total self-play games completed")
    ).unwrap();

    /// Finished games by winner (black, white, draw)
    pub static ref GAME_RESULTS: IntCounterVec = IntCounterVec::new(
        Opts::new("searcher_game_results_total", "Finished games by winner"),
        &["winner"]
    ).unwrap();

    /// Moves played per game
    pub static ref GAME_MOVES: Histogram = Histogram::with_opts(
        HistogramOpts::new("searcher_game_moves", "Moves played per game")
            .buckets(vec![10.0, 25.0, 50.0, 81.0, 120.0, 200.0, 400.0])
    ).unwrap();

    // ========== Search Metrics ==========

    /// Total searches performed
    pub static ref SEARCHES_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("searcher_searches_total", "Total searches performed")
    ).unwrap();

    /// Wall time per search (seconds)
    pub static ref SEARCH_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("searcher_search_seconds", "Wall time per search")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0])
    ).unwrap();

    /// Descents completed per search
    pub static ref DESCENTS_PER_SEARCH: Histogram = Histogram::with_opts(
        HistogramOpts::new("searcher_descents_per_search", "Descents completed per search")
            .buckets(vec![50.0, 100.0, 200.0, 400.0, 800.0, 1600.0])
    ).unwrap();

    /// Evaluator batch sizes, averaged per search
    pub static ref BATCH_SIZE: Histogram = Histogram::with_opts(
        HistogramOpts::new("searcher_batch_size", "Mean evaluator batch size per search")
            .buckets(vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0])
    ).unwrap();

    /// Total evaluator batches
    pub static ref BATCHES_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("searcher_batches_total", "Total evaluator batches")
    ).unwrap();

    /// Descents that waited on a leaf being expanded by another descent
    pub static ref GUARD_WAITS_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("searcher_guard_waits_total", "Descents that waited on an in-flight expansion")
    ).unwrap();

    /// Descents that ended on an illegal move or finished game
    pub static ref TERMINAL_HITS_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("searcher_terminal_hits_total", "Descents ending on an illegal move or finished game")
    ).unwrap();
}

static INIT: Once = Once::new();

/// Register all metrics with the registry.
/// Safe to call multiple times - only registers once.
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(GAMES_TOTAL.clone()),
            Box::new(GAME_RESULTS.clone()),
            Box::new(GAME_MOVES.clone()),
            Box::new(SEARCHES_TOTAL.clone()),
            Box::new(SEARCH_SECONDS.clone()),
            Box::new(DESCENTS_PER_SEARCH.clone()),
            Box::new(BATCH_SIZE.clone()),
            Box::new(BATCHES_TOTAL.clone()),
            Box::new(GUARD_WAITS_TOTAL.clone()),
            Box::new(TERMINAL_HITS_TOTAL.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                warn!("Failed to register metric: {}", e);
            }
        }
    });
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record the statistics of one search
pub fn record_search(stats: &SearchStats) {
    SEARCHES_TOTAL.inc();
    SEARCH_SECONDS.observe(stats.elapsed.as_secs_f64());
    DESCENTS_PER_SEARCH.observe(stats.descents_completed as f64);
    BATCHES_TOTAL.inc_by(stats.batches);
    GUARD_WAITS_TOTAL.inc_by(stats.guard_waits);
    TERMINAL_HITS_TOTAL.inc_by(stats.terminal_hits);
    if stats.batches > 0 {
        BATCH_SIZE.observe(stats.evaluated_items as f64 / stats.batches as f64);
    }
}

/// Record a finished game
pub fn record_game(moves: usize, winner: Option<Color>) {
    GAMES_TOTAL.inc();
    GAME_MOVES.observe(moves as f64);
    let label = match winner {
        Some(Color::Black) => "black",
        Some(Color::White) => "white",
        None => "draw",
    };
    GAME_RESULTS.with_label_values(&[label]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_metrics_init() {
        init_metrics();
        init_metrics();
    }

    #[test]
    fn test_encode_metrics() {
        init_metrics();
        SEARCHES_TOTAL.inc_by(0);
        let output = encode_metrics().unwrap();
        assert!(output.contains("searcher_searches_total"));
        assert!(output.contains("searcher_games_total"));
    }

    #[test]
    fn test_record_search() {
        init_metrics();
        let before = BATCHES_TOTAL.get();
        let stats = SearchStats {
            descents_completed: 64,
            batches: 8,
            evaluated_items: 64,
            largest_batch: 12,
            elapsed: Duration::from_millis(3),
            ..SearchStats::default()
        };
        record_search(&stats);
        assert!(BATCHES_TOTAL.get() >= before + 8);
    }

    #[test]
    fn test_record_game() {
        init_metrics();
        record_game(40, Some(Color::White));
        record_game(12, None);
        assert!(GAME_RESULTS.with_label_values(&["white"]).get() >= 1);
        assert!(GAME_RESULTS.with_label_values(&["draw"]).get() >= 1);
    }
}
