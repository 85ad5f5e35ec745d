//! Searcher - self-play driver for the batched Go tree search
//!
//! A short-running process that:
//! 1. Loads config.toml (with env and CLI overrides)
//! 2. Plays self-play Go games, one asynchronous batched search per move
//! 3. Logs per-game results and, on request, dumps Prometheus metrics

use anyhow::Result;
use apv_mcts::{Evaluator, UniformEvaluator};
use clap::Parser;
use games_go::HeuristicEvaluator;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

mod config;
mod metrics;
mod selfplay;

use crate::config::{Config, EvaluatorKind};
use crate::selfplay::SelfPlay;

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

async fn play_all<E: Evaluator + 'static>(config: Config, evaluator: Arc<E>) -> Result<()> {
    let games = config.games;
    let selfplay = SelfPlay::new(config, evaluator);
    let mut black_wins = 0u32;

    for game in 0..games {
        let record = selfplay.play_game(game).await?;
        if record.winner == Some(games_go::Color::Black) {
            black_wins += 1;
        }
    }

    info!(games, black_wins, "Self-play finished");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    config.validate()?;

    init_tracing(&config.log_level)?;
    info!(log_level = %config.log_level, "Tracing initialized");
    info!(
        board_size = config.board_size,
        iterations = config.iterations,
        max_concurrency = config.max_concurrency,
        evaluator = ?config.evaluator,
        "Starting self-play"
    );

    metrics::init_metrics();
    let print_metrics = config.print_metrics;

    let run = async {
        match config.evaluator {
            EvaluatorKind::Heuristic => {
                let evaluator = Arc::new(HeuristicEvaluator::new(config.board_size));
                play_all(config.clone(), evaluator).await
            }
            EvaluatorKind::Uniform => {
                let actions = config.board_size * config.board_size + 1;
                let evaluator = Arc::new(UniformEvaluator::new(actions));
                play_all(config.clone(), evaluator).await
            }
        }
    };

    // The search holds non-Send state, so it runs on this task and races the signal
    tokio::pin!(run);
    let run_result = tokio::select! {
        result = &mut run => result,
        signal = signal::ctrl_c() => match signal {
            Ok(()) => {
                warn!("Shutdown signal received, abandoning current game");
                Ok(())
            }
            Err(e) => {
                warn!("Failed to listen for ctrl+c: {}", e);
                run.await
            }
        },
    };

    if print_metrics {
        match metrics::encode_metrics() {
            Ok(text) => println!("{}", text),
            Err(e) => warn!("Failed to encode metrics: {}", e),
        }
    }

    match run_result {
        Ok(()) => {
            info!("Searcher completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Searcher failed: {:#}", e);
            Err(e)
        }
    }
}
