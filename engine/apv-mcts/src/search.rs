//! Search scheduler.
//!
//! A search call runs on a `LocalSet`:
//! 1. Prepare the root: resume the retained tree, or evaluate and expand a
//!    fresh root
//! 2. Spawn one task per iteration; each waits for an admission permit,
//!    then runs a descent
//! 3. Spawn exactly one batcher task serving every descent's evaluations
//! 4. Gather, then turn the root's visit counts into a move distribution

use std::cell::Ref;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinSet, LocalSet};
use tracing::{debug, trace};

use crate::batcher::{self, BatchStats, Batcher, RunningDescents};
use crate::config::MctsConfig;
use crate::descent::{descend, SearchContext};
use crate::evaluator::{Evaluator, EvaluatorError};
use crate::game::{Encoder, GameState, Move};
use crate::noise::mix_dirichlet_noise;
use crate::tree::{MctsTree, TreeError};

/// Errors that can occur during a search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),

    #[error("Evaluation queue closed before the request was answered")]
    BatcherClosed,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Search task failed: {0}")]
    TaskFailed(String),
}

/// Counters for one search call.
#[derive(Debug, Clone, Default)]
pub struct SearchStats {
    pub descents_completed: u64,
    /// Evaluator calls, including the root evaluation
    pub batches: u64,
    pub evaluated_items: u64,
    pub largest_batch: usize,
    /// Times a descent found its leaf claimed by another descent
    pub guard_waits: u64,
    /// Illegal or terminal leaves reached
    pub terminal_hits: u64,
    pub expansions: u64,
    pub virtual_loss_applied: u64,
    pub virtual_loss_reverted: u64,
    pub elapsed: Duration,
}

/// Result of a search call.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Visit distribution over actions, indexed by [`Move::index`] (pass last)
    pub policy: Vec<f32>,

    /// Root Q, from the side to move at the root
    pub value: f32,

    /// Root visit count, including visits retained from earlier searches
    pub simulations: u32,

    pub stats: SearchStats,
}

/// Asynchronous batched search over a retained tree.
pub struct MctsSearch<S, C, E> {
    ctx: Rc<SearchContext<S, C>>,
    evaluator: Arc<E>,
}

impl<S, C, E> MctsSearch<S, C, E>
where
    S: GameState,
    C: Encoder<S> + 'static,
    E: Evaluator + 'static,
{
    /// Create a search with an empty tree. `seed` drives noise and symmetry draws.
    pub fn new(encoder: C, evaluator: Arc<E>, config: MctsConfig, seed: u64) -> Result<Self, SearchError> {
        config.validate()?;
        let rng = ChaCha20Rng::seed_from_u64(seed);
        Ok(Self {
            ctx: Rc::new(SearchContext::new(encoder, config, rng)),
            evaluator,
        })
    }

    pub fn config(&self) -> &MctsConfig {
        &self.ctx.config
    }

    /// Get the search tree (for inspection/debugging).
    pub fn tree(&self) -> Ref<'_, MctsTree<S>> {
        self.ctx.tree.borrow()
    }

    /// Discard the whole tree.
    pub fn reset(&mut self) {
        *self.ctx.tree.borrow_mut() = MctsTree::new();
    }

    /// Keep only the subtree under `mv` for the next search.
    ///
    /// Falls back to an empty tree if that child was never expanded.
    pub fn advance_root(&mut self, mv: Move) -> Result<(), SearchError> {
        let mut tree = self.ctx.tree.borrow_mut();
        match tree.child(tree.root(), mv) {
            Some(child) if tree.get(child).is_expanded() => {
                tree.promote(child)?;
                debug!(?mv, nodes = tree.len(), "Reusing subtree");
            }
            _ => *tree = MctsTree::new(),
        }
        Ok(())
    }

    /// Search `iterations` descents from `root_state` and return the
    /// resulting move distribution (board cells + pass).
    pub async fn suggest_move_distribution(
        &mut self,
        root_state: S,
        iterations: u32,
    ) -> Result<Vec<f32>, SearchError> {
        Ok(self.search(root_state, iterations).await?.policy)
    }

    /// Run `iterations` descents from `root_state`.
    ///
    /// If the retained root already holds `root_state` the search resumes
    /// on it; otherwise a fresh root is evaluated and expanded first.
    pub async fn search(&mut self, root_state: S, iterations: u32) -> Result<SearchResult, SearchError> {
        let start = Instant::now();
        self.ctx.counters.reset();

        let root_eval = self.prepare_root(root_state)?;
        let batches = if iterations > 0 {
            self.run_descents(iterations).await?
        } else {
            BatchStats::default()
        };

        let tree = self.ctx.tree.borrow();
        let root = tree.get(tree.root());
        let counters = &self.ctx.counters;
        let stats = SearchStats {
            descents_completed: counters.completed.get(),
            batches: batches.batches + root_eval,
            evaluated_items: batches.items + root_eval,
            largest_batch: batches.largest_batch.max(root_eval as usize),
            guard_waits: counters.guard_waits.get(),
            terminal_hits: counters.terminal_hits.get(),
            expansions: counters.expansions.get(),
            virtual_loss_applied: counters.virtual_loss_applied.get(),
            virtual_loss_reverted: counters.virtual_loss_reverted.get(),
            elapsed: start.elapsed(),
        };

        debug!(
            iterations,
            batches = stats.batches,
            largest_batch = stats.largest_batch,
            "Searched for {:.5} seconds",
            stats.elapsed.as_secs_f64()
        );

        Ok(SearchResult {
            policy: tree.root_policy(1.0),
            // The root stores the view of the side that moved into it
            value: -root.mean_value(),
            simulations: root.visit_count,
            stats,
        })
    }

    /// Make sure the root holds `root_state` and is expanded.
    /// Returns the number of evaluator calls made (0 or 1).
    fn prepare_root(&self, root_state: S) -> Result<u64, SearchError> {
        let ctx = &self.ctx;
        {
            let mut tree = ctx.tree.borrow_mut();
            let root = tree.get(tree.root());
            if root.state.as_ref() == Some(&root_state) {
                trace!(visits = root.visit_count, "Resuming search on retained root");
                return Ok(0);
            }
            *tree = MctsTree::new();
        }

        let symmetry = ctx.draw_symmetry();
        let features = ctx.encoder.encode(&root_state, symmetry);
        let mut results = self.evaluator.evaluate_batch(&[features.as_slice()])?;
        let eval = match (results.pop(), results.is_empty()) {
            (Some(eval), true) => eval,
            _ => {
                return Err(EvaluatorError::EvaluationFailed(
                    "root evaluation did not return exactly one result".to_string(),
                )
                .into())
            }
        };

        let mut priors = ctx.encoder.restore_policy(&root_state, &eval.policy, symmetry);
        if ctx.config.root_noise {
            mix_dirichlet_noise(
                &mut priors,
                ctx.config.dirichlet_alpha,
                ctx.config.dirichlet_epsilon,
                &mut *ctx.rng.borrow_mut(),
            );
        }

        let mut tree = ctx.tree.borrow_mut();
        let root = tree.root();
        tree.expand(root, root_state, &priors)?;
        Ok(1)
    }

    /// Launch the descents and the batcher, and gather them.
    ///
    /// The first failure aborts the remaining descents. A batcher failure
    /// takes precedence since it is the cause of the descents' errors.
    async fn run_descents(&self, iterations: u32) -> Result<BatchStats, SearchError> {
        let config = &self.ctx.config;
        let (queue, rx) = batcher::channel(config.queue_capacity);
        let running = RunningDescents::new();
        let admission = Rc::new(Semaphore::new(config.max_concurrency));

        let local = LocalSet::new();
        let outcome = local
            .run_until(async {
                let mut descents = JoinSet::new();
                for _ in 0..iterations {
                    let ctx = self.ctx.clone();
                    let queue = queue.clone();
                    let admission = admission.clone();
                    let token = running.register();
                    descents.spawn_local(async move {
                        let _token = token;
                        let _permit = admission
                            .acquire()
                            .await
                            .map_err(|e| SearchError::TaskFailed(e.to_string()))?;
                        descend(&ctx, &queue).await
                    });
                }
                drop(queue);

                let batcher = Batcher::new(
                    rx,
                    self.evaluator.clone(),
                    running.clone(),
                    config.batcher_margin,
                    config.batcher_poll,
                );
                let batcher = tokio::task::spawn_local(batcher.run());

                let mut first_error = None;
                while let Some(joined) = descents.join_next().await {
                    let result = match joined {
                        Ok(result) => result,
                        Err(e) if e.is_cancelled() => continue,
                        Err(e) => Err(SearchError::TaskFailed(e.to_string())),
                    };
                    if let Err(e) = result {
                        if first_error.is_none() {
                            descents.abort_all();
                            first_error = Some(e);
                        }
                    }
                }

                let batched = match batcher.await {
                    Ok(result) => result,
                    Err(e) => Err(SearchError::TaskFailed(e.to_string())),
                };
                match (batched, first_error) {
                    (Err(e), _) | (Ok(_), Some(e)) => Err(e),
                    (Ok(stats), None) => Ok(stats),
                }
            })
            .await;
        drop(local);
        outcome
    }
}

/// Sample an action index from a probability distribution.
pub fn sample_action<R: Rng + ?Sized>(policy: &[f32], rng: &mut R) -> Result<usize, SearchError> {
    let r: f32 = rng.gen();
    let mut cumsum = 0.0;

    for (i, &p) in policy.iter().enumerate() {
        cumsum += p;
        if r < cumsum {
            return Ok(i);
        }
    }

    // Fallback to last non-zero action (handles floating point issues)
    policy
        .iter()
        .rposition(|&p| p > 0.0)
        .ok_or_else(|| SearchError::InvalidState("policy has no probability mass".to_string()))
}
