//! Self-play game loop.
//!
//! Each move runs one search from the current position, picks a move from
//! the visit distribution and, when enabled, keeps that move's subtree for
//! the next search.

use anyhow::{Context, Result};
use apv_mcts::{sample_action, Evaluator, GameState, MctsSearch, Move};
use games_go::{Color, GoEncoder, GoPosition};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::metrics;

/// Outcome of one self-play game.
#[derive(Debug, Clone)]
pub struct GameRecord {
    pub moves: Vec<Move>,
    pub final_position: GoPosition,
    /// Area score, Black minus White, after komi
    pub score: f32,
    pub winner: Option<Color>,
}

/// Plays self-play games with one search instance per game.
pub struct SelfPlay<E> {
    config: Config,
    evaluator: Arc<E>,
}

impl<E: Evaluator + 'static> SelfPlay<E> {
    pub fn new(config: Config, evaluator: Arc<E>) -> Self {
        Self { config, evaluator }
    }

    /// Play game number `game_index`; seeds are derived from the configured seed.
    pub async fn play_game(&self, game_index: u32) -> Result<GameRecord> {
        let cfg = &self.config;
        let seed = cfg.seed.wrapping_add(u64::from(game_index));
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut search = MctsSearch::new(
            GoEncoder,
            Arc::clone(&self.evaluator),
            cfg.mcts_config(),
            seed,
        )
        .context("failed to create search")?;

        let mut position = GoPosition::new(cfg.board_size);
        let mut moves = Vec::new();

        while !position.is_over() && moves.len() < cfg.max_moves as usize {
            let result = search
                .search(position.clone(), cfg.iterations)
                .await
                .with_context(|| format!("search failed at move {}", moves.len() + 1))?;
            metrics::record_search(&result.stats);

            let greedy = position.move_number() >= cfg.temp_threshold;
            let mv = pick_move(&position, &result.policy, greedy, &mut rng)?;
            debug!(
                move_number = position.move_number(),
                ?mv,
                value = result.value,
                batches = result.stats.batches,
                "Playing move"
            );

            position = position
                .play(mv)
                .with_context(|| format!("search chose illegal move {:?}", mv))?;
            moves.push(mv);

            if cfg.reuse_tree {
                search.advance_root(mv)?;
            } else {
                search.reset();
            }
        }

        let komi = cfg.komi as f32;
        let record = GameRecord {
            score: position.score(komi),
            winner: position.winner(komi),
            moves,
            final_position: position,
        };
        metrics::record_game(record.moves.len(), record.winner);
        info!(
            game = game_index,
            moves = record.moves.len(),
            score = record.score,
            winner = ?record.winner,
            "Game finished"
        );
        debug!("Final position:\n{}", record.final_position);

        Ok(record)
    }
}

/// Choose a move from a search distribution, ignoring illegal entries.
///
/// `greedy` plays the most visited legal move (first one on ties); otherwise
/// the move is sampled proportionally. Falls back to passing when no legal
/// point received any visits.
pub fn pick_move(
    position: &GoPosition,
    policy: &[f32],
    greedy: bool,
    rng: &mut ChaCha20Rng,
) -> Result<Move> {
    let masked: Vec<f32> = policy
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let mv = Move::from_index(i, position.board_cells());
            if position.is_legal(mv) {
                p
            } else {
                0.0
            }
        })
        .collect();

    let total: f32 = masked.iter().sum();
    if total <= 0.0 {
        return Ok(Move::Pass);
    }

    let index = if greedy {
        masked
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, &p)| {
                if p > best.1 {
                    (i, p)
                } else {
                    best
                }
            })
            .0
    } else {
        let normalized: Vec<f32> = masked.iter().map(|p| p / total).collect();
        sample_action(&normalized, rng)?
    };

    Ok(Move::from_index(index, position.board_cells()))
}
