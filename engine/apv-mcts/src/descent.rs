//! One tree descent: select down to a leaf, evaluate it, back up.
//!
//! A descent walks from the root applying virtual loss to every node it
//! passes, so concurrent descents spread over different subtrees. At an
//! unexpanded leaf it claims the node in the [`ExpandingSet`], submits the
//! encoded state to the batcher and suspends. When the result arrives the
//! leaf is expanded and the value is backed up along the recorded path,
//! flipping sign at every level.
//!
//! The tree lives in a `RefCell` shared by every descent on the same
//! thread. Borrows are never held across an await, so each synchronous
//! segment sees and leaves the tree consistent.

use std::cell::{Cell, RefCell};

use rand_chacha::ChaCha20Rng;
use tracing::{error, trace};

use crate::batcher::BatchQueue;
use crate::config::MctsConfig;
use crate::expanding::{ExpandingSet, ExpansionGuard};
use crate::game::{Encoder, GameState};
use crate::node::NodeId;
use crate::noise::mix_dirichlet_noise;
use crate::search::SearchError;
use crate::symmetry::Symmetry;
use crate::tree::MctsTree;

/// Value, for the side that moved into it, of an illegal or terminal leaf.
/// The mover who produced it loses.
pub const TERMINAL_VALUE: f32 = -1.0;

/// State shared by all descents of one search.
pub struct SearchContext<S, C> {
    pub tree: RefCell<MctsTree<S>>,
    pub expanding: ExpandingSet,
    pub encoder: C,
    pub config: MctsConfig,
    pub rng: RefCell<ChaCha20Rng>,
    pub counters: DescentCounters,
}

impl<S: GameState, C: Encoder<S>> SearchContext<S, C> {
    pub fn new(encoder: C, config: MctsConfig, rng: ChaCha20Rng) -> Self {
        Self {
            tree: RefCell::new(MctsTree::new()),
            expanding: ExpandingSet::new(),
            encoder,
            config,
            rng: RefCell::new(rng),
            counters: DescentCounters::default(),
        }
    }

    /// Symmetry for the next evaluation.
    pub fn draw_symmetry(&self) -> Symmetry {
        if self.config.random_symmetry {
            Symmetry::random(&mut *self.rng.borrow_mut())
        } else {
            Symmetry::IDENTITY
        }
    }
}

/// Event counts accumulated by descents.
#[derive(Debug, Default)]
pub struct DescentCounters {
    pub completed: Cell<u64>,
    pub guard_waits: Cell<u64>,
    pub terminal_hits: Cell<u64>,
    pub expansions: Cell<u64>,
    pub virtual_loss_applied: Cell<u64>,
    pub virtual_loss_reverted: Cell<u64>,
}

impl DescentCounters {
    fn bump(counter: &Cell<u64>) {
        counter.set(counter.get() + 1);
    }

    pub fn reset(&self) {
        for counter in [
            &self.completed,
            &self.guard_waits,
            &self.terminal_hits,
            &self.expansions,
            &self.virtual_loss_applied,
            &self.virtual_loss_reverted,
        ] {
            counter.set(0);
        }
    }
}

/// Virtual loss outstanding on the current path.
///
/// Every application is recorded and reverted exactly once: by
/// [`VirtualLossPath::backup`] on success, or by `Drop` when the descent
/// fails or is cancelled mid-flight.
struct VirtualLossPath<'a, S> {
    tree: &'a RefCell<MctsTree<S>>,
    counters: &'a DescentCounters,
    loss: u32,
    /// (parent, child) per selection step, root first
    edges: Vec<(NodeId, NodeId)>,
    /// Applications not yet reverted, in application order
    outstanding: Vec<NodeId>,
}

impl<'a, S> VirtualLossPath<'a, S> {
    fn new(tree: &'a RefCell<MctsTree<S>>, counters: &'a DescentCounters, loss: u32) -> Self {
        Self {
            tree,
            counters,
            loss,
            edges: Vec::new(),
            outstanding: Vec::new(),
        }
    }

    /// Apply virtual loss to `parent` and its selected `child`.
    fn step(&mut self, tree: &mut MctsTree<S>, parent: NodeId, child: NodeId) {
        for id in [parent, child] {
            tree.apply_virtual_loss(id, self.loss);
            self.outstanding.push(id);
            DescentCounters::bump(&self.counters.virtual_loss_applied);
        }
        self.edges.push((parent, child));
    }

    fn revert_last(&mut self, tree: &mut MctsTree<S>) {
        if let Some(id) = self.outstanding.pop() {
            tree.revert_virtual_loss(id, self.loss);
            DescentCounters::bump(&self.counters.virtual_loss_reverted);
        }
    }

    /// Unwind the path leaf first. `value` is for the side that moved into
    /// the leaf. Every node stores the value of the side that moved into it,
    /// so the sign flips once per level, and the root takes the negation of
    /// its child's value.
    fn backup(mut self, mut value: f32, c_puct: f32) {
        let cell = self.tree;
        let mut tree = cell.borrow_mut();
        while let Some((parent, child)) = self.edges.pop() {
            self.revert_last(&mut tree);
            tree.backup(child, value, c_puct);
            self.revert_last(&mut tree);
            if tree.get(parent).is_root() {
                tree.backup(parent, -value, c_puct);
            }
            trace!(node = child.0, value, "Backed up");
            value = -value;
        }
    }
}

impl<S> Drop for VirtualLossPath<'_, S> {
    fn drop(&mut self) {
        if self.outstanding.is_empty() {
            return;
        }
        let cell = self.tree;
        match cell.try_borrow_mut() {
            Ok(mut tree) => {
                while !self.outstanding.is_empty() {
                    self.revert_last(&mut tree);
                }
            }
            Err(_) => error!(
                pending = self.outstanding.len(),
                "Tree borrowed while abandoning a descent; virtual loss leaked"
            ),
        }
    }
}

/// Run one descent from the root.
///
/// The root must already be expanded.
pub async fn descend<S, C>(ctx: &SearchContext<S, C>, queue: &BatchQueue) -> Result<(), SearchError>
where
    S: GameState,
    C: Encoder<S>,
{
    let mut path = VirtualLossPath::new(&ctx.tree, &ctx.counters, ctx.config.virtual_loss);
    let mut node = ctx.tree.borrow().root();

    let value = loop {
        if ctx.expanding.wait_until_free(node, ctx.config.guard_poll).await {
            DescentCounters::bump(&ctx.counters.guard_waits);
        }

        let next = {
            let mut tree = ctx.tree.borrow_mut();
            let current = tree.get(node);
            if current.is_leaf() {
                if current.is_root() {
                    return Err(SearchError::InvalidState(
                        "descent started from an unexpanded root".to_string(),
                    ));
                }
                None
            } else {
                let child = tree.select_child(node).ok_or_else(|| {
                    SearchError::InvalidState(format!("expanded node {:?} has no children", node))
                })?;
                path.step(&mut tree, node, child);
                Some(child)
            }
        };

        match next {
            Some(child) => node = child,
            None => match ctx.expanding.try_enter(node) {
                Some(guard) => break evaluate_leaf(ctx, queue, guard).await?,
                // Claimed by another descent since the wait; wait again
                None => continue,
            },
        }
    };

    path.backup(value, ctx.config.c_puct);
    DescentCounters::bump(&ctx.counters.completed);
    Ok(())
}

/// Materialize, evaluate and expand a claimed leaf.
///
/// Returns the value for the side that moved into the leaf, which is the
/// evaluator's value as reported.
/// The claim is released when `guard` drops, on every exit path.
async fn evaluate_leaf<S, C>(
    ctx: &SearchContext<S, C>,
    queue: &BatchQueue,
    guard: ExpansionGuard<'_>,
) -> Result<f32, SearchError>
where
    S: GameState,
    C: Encoder<S>,
{
    let node = guard.node();
    let transition = {
        let tree = ctx.tree.borrow();
        let leaf = tree.get(node);
        let parent_state = tree.get(leaf.parent).state.as_ref().ok_or_else(|| {
            SearchError::InvalidState(format!("parent of leaf {:?} is not expanded", node))
        })?;
        parent_state.play(leaf.action)
    };

    let Some(state) = transition else {
        trace!(node = node.0, "Illegal or terminal leaf");
        DescentCounters::bump(&ctx.counters.terminal_hits);
        return Ok(TERMINAL_VALUE);
    };

    let symmetry = ctx.draw_symmetry();
    let features = ctx.encoder.encode(&state, symmetry);
    let eval = queue.submit(features).await?;

    let mut priors = ctx.encoder.restore_policy(&state, &eval.policy, symmetry);
    if ctx.config.leaf_noise {
        mix_dirichlet_noise(
            &mut priors,
            ctx.config.dirichlet_alpha,
            ctx.config.dirichlet_epsilon,
            &mut *ctx.rng.borrow_mut(),
        );
    }
    ctx.tree.borrow_mut().expand(node, state, &priors)?;
    DescentCounters::bump(&ctx.counters.expansions);
    drop(guard);

    Ok(eval.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batcher::{self, Batcher, RunningDescents};
    use crate::evaluator::Evaluator;
    use crate::game::Move;
    use crate::test_util::{ConstantEvaluator, FailingEvaluator, GridEncoder, GridState};
    use rand::SeedableRng;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::task::{spawn_local, LocalSet};

    fn context(root: GridState, config: MctsConfig) -> SearchContext<GridState, GridEncoder> {
        let ctx = SearchContext::new(GridEncoder, config, ChaCha20Rng::seed_from_u64(1));
        let priors = vec![1.0 / root.num_actions() as f32; root.num_actions()];
        {
            let mut tree = ctx.tree.borrow_mut();
            let id = tree.root();
            tree.expand(id, root, &priors).unwrap();
        }
        ctx
    }

    /// Run `n` descents concurrently against one batcher.
    async fn run_descents<E: Evaluator + 'static>(
        ctx: Rc<SearchContext<GridState, GridEncoder>>,
        evaluator: Arc<E>,
        n: usize,
    ) -> Vec<Result<(), SearchError>> {
        let (queue, rx) = batcher::channel(ctx.config.queue_capacity);
        let running = RunningDescents::new();
        let tasks: Vec<_> = (0..n)
            .map(|_| {
                let ctx = ctx.clone();
                let queue = queue.clone();
                let token = running.register();
                spawn_local(async move {
                    let _token = token;
                    descend(&ctx, &queue).await
                })
            })
            .collect();
        drop(queue);

        let batcher = Batcher::new(rx, evaluator, running, 2, Duration::from_millis(1));
        let _ = batcher.run().await;

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap());
        }
        results
    }

    #[tokio::test]
    async fn test_illegal_leaf_values_alternate_up_the_path() {
        // Cell 1 is blocked; after playing cell 0 every placement is illegal,
        // and the first child in order (cell 0, occupied) is selected.
        let root_state = GridState::with_blocked(2, &[1]);
        let ctx = context(root_state.clone(), MctsConfig::for_testing());
        let c0 = {
            let mut tree = ctx.tree.borrow_mut();
            let c0 = tree.child(tree.root(), Move::Place(0)).unwrap();
            let next = root_state.play(Move::Place(0)).unwrap();
            tree.expand(c0, next, &[0.4, 0.4, 0.2]).unwrap();
            c0
        };
        let (queue, _rx) = batcher::channel(1);

        descend(&ctx, &queue).await.unwrap();

        let tree = ctx.tree.borrow();
        let leaf = tree.child(c0, Move::Place(0)).unwrap();
        let (root, c0, leaf) = (tree.get(tree.root()), tree.get(c0), tree.get(leaf));

        assert_eq!((leaf.visit_count, leaf.value_sum), (1, -1.0));
        assert_eq!((c0.visit_count, c0.value_sum), (1, 1.0));
        assert_eq!((root.visit_count, root.value_sum), (1, -1.0));

        // Illegal transition never expands
        assert!(leaf.is_leaf());
        assert!(leaf.children.is_empty());
        assert_eq!(ctx.counters.terminal_hits.get(), 1);
        assert_eq!(ctx.counters.expansions.get(), 0);
    }

    #[tokio::test]
    async fn test_values_alternate_sign_over_three_levels() {
        let root_state = GridState::empty(2);
        let ctx = context(root_state.clone(), MctsConfig::for_testing());
        let (c0, c01) = {
            let mut tree = ctx.tree.borrow_mut();
            let c0 = tree.child(tree.root(), Move::Place(0)).unwrap();
            let after_c0 = root_state.play(Move::Place(0)).unwrap();
            tree.expand(c0, after_c0.clone(), &[0.4, 0.4, 0.2]).unwrap();

            // Steer selection at c0 away from the occupied cell
            let c01 = tree.child(c0, Move::Place(1)).unwrap();
            tree.get_mut(c01).exploration = 1.0;
            let full = after_c0.play(Move::Place(1)).unwrap();
            tree.expand(c01, full, &[0.4, 0.4, 0.2]).unwrap();
            (c0, c01)
        };
        let (queue, _rx) = batcher::channel(1);

        // Both cells are taken below c01, so its first child is illegal
        descend(&ctx, &queue).await.unwrap();

        let tree = ctx.tree.borrow();
        let leaf = tree.child(c01, Move::Place(0)).unwrap();
        let w = |id: NodeId| (tree.get(id).visit_count, tree.get(id).value_sum);

        assert_eq!(w(leaf), (1, -1.0));
        assert_eq!(w(c01), (1, 1.0));
        assert_eq!(w(c0), (1, -1.0));
        assert_eq!(w(tree.root()), (1, 1.0));
        assert_eq!(tree.get(tree.root()).value_sum, -tree.get(c0).value_sum);
        assert_eq!(tree.pending_virtual_loss(), 0);
    }

    #[tokio::test]
    async fn test_virtual_loss_is_fully_reverted() {
        let finished = GridState::empty(2)
            .play(Move::Pass)
            .and_then(|s| s.play(Move::Pass))
            .unwrap();
        let ctx = context(finished, MctsConfig::for_testing());
        let (queue, _rx) = batcher::channel(1);

        // Every move after two passes is illegal, so no evaluator is needed
        descend(&ctx, &queue).await.unwrap();
        descend(&ctx, &queue).await.unwrap();

        let applied = ctx.counters.virtual_loss_applied.get();
        assert!(applied > 0);
        assert_eq!(applied, ctx.counters.virtual_loss_reverted.get());
        assert_eq!(ctx.tree.borrow().pending_virtual_loss(), 0);
    }

    #[tokio::test]
    async fn test_leaf_expansion_uses_batched_value() {
        LocalSet::new()
            .run_until(async {
                let ctx = Rc::new(context(GridState::empty(4), MctsConfig::for_testing()));
                let evaluator = Arc::new(ConstantEvaluator::new(5, 0.5));

                let results = run_descents(ctx.clone(), evaluator.clone(), 1).await;
                assert!(results.iter().all(|r| r.is_ok()));

                let tree = ctx.tree.borrow();
                let c0 = tree.get(tree.child(tree.root(), Move::Place(0)).unwrap());
                assert!(c0.is_expanded());
                assert_eq!(c0.children.len(), 5);
                // Evaluator's 0.5 is for the side that played into c0; the root
                // stores the other side's view
                assert!((c0.value_sum - 0.5).abs() < 1e-6);
                assert!((tree.get(tree.root()).value_sum + 0.5).abs() < 1e-6);
                assert_eq!(evaluator.items(), 1);
            })
            .await;
    }

    #[tokio::test]
    async fn test_converging_descents_expand_leaf_once() {
        LocalSet::new()
            .run_until(async {
                // Without virtual loss both descents pick the same first child
                let config = MctsConfig::for_testing().with_virtual_loss(0);
                let ctx = Rc::new(context(GridState::empty(1), config));
                let evaluator = Arc::new(ConstantEvaluator::new(2, 0.0));

                let results = run_descents(ctx.clone(), evaluator.clone(), 2).await;
                assert!(results.iter().all(|r| r.is_ok()));

                // One evaluation for cell 0; the waiter then went one level
                // deeper and hit the occupied cell
                assert_eq!(evaluator.items(), 1);
                assert_eq!(ctx.counters.expansions.get(), 1);
                assert_eq!(ctx.counters.guard_waits.get(), 1);
                assert_eq!(ctx.counters.terminal_hits.get(), 1);
                assert!(ctx.expanding.is_empty());

                let tree = ctx.tree.borrow();
                let c0 = tree.get(tree.child(tree.root(), Move::Place(0)).unwrap());
                assert_eq!(c0.visit_count, 2);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_descent_leaves_no_trace() {
        let ctx = context(GridState::empty(4), MctsConfig::for_testing());
        // Nobody drains the queue: the descent suspends on its evaluation
        let (queue, _rx) = batcher::channel(1);

        let outcome = tokio::time::timeout(Duration::from_millis(10), descend(&ctx, &queue)).await;
        assert!(outcome.is_err());

        let tree = ctx.tree.borrow();
        assert_eq!(tree.pending_virtual_loss(), 0);
        assert!(ctx.expanding.is_empty());
        let root = tree.get(tree.root());
        assert_eq!((root.visit_count, root.value_sum), (0, 0.0));
        assert!(root.children.iter().all(|(_, id)| tree.get(*id).visit_count == 0));
        assert_eq!(
            ctx.counters.virtual_loss_applied.get(),
            ctx.counters.virtual_loss_reverted.get()
        );
    }

    #[tokio::test]
    async fn test_evaluator_failure_propagates_without_leaks() {
        LocalSet::new()
            .run_until(async {
                let ctx = Rc::new(context(GridState::empty(4), MctsConfig::for_testing()));
                let evaluator = Arc::new(FailingEvaluator::new(5));

                let results = run_descents(ctx.clone(), evaluator, 3).await;
                assert!(results
                    .iter()
                    .all(|r| matches!(r, Err(SearchError::Evaluator(_)) | Err(SearchError::BatcherClosed))));
                assert!(matches!(results[0], Err(SearchError::Evaluator(_))));

                assert_eq!(ctx.tree.borrow().pending_virtual_loss(), 0);
                assert!(ctx.expanding.is_empty());
                assert_eq!(ctx.counters.expansions.get(), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn test_unexpanded_root_is_rejected() {
        let ctx: SearchContext<GridState, GridEncoder> =
            SearchContext::new(GridEncoder, MctsConfig::for_testing(), ChaCha20Rng::seed_from_u64(0));
        let (queue, _rx) = batcher::channel(1);
        let outcome = descend(&ctx, &queue).await;
        assert!(matches!(outcome, Err(SearchError::InvalidState(_))));
    }
}
