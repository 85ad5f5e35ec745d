//! Search tree node representation.
//!
//! Each node is reached by playing `action` from its parent. Its state is
//! materialized lazily, the first time a descent reaches it as a leaf.
//! Statistics follow the AlphaGo notation: N (visits), W (total value),
//! Q = W / N and the exploration bonus U.

use tracing::warn;

use crate::game::Move;

/// Index into the node arena. Using a newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    pub fn is_some(self) -> bool {
        !self.is_none()
    }
}

/// A node in the search tree.
#[derive(Debug, Clone)]
pub struct MctsNode<S> {
    /// Parent node index (NONE for root)
    pub parent: NodeId,

    /// Action that led to this node from its parent
    pub action: Move,

    /// Prior probability assigned to `action` when the parent was expanded
    pub prior: f32,

    /// Game state, set together with `children` on expansion
    pub state: Option<S>,

    /// Children: (action, NodeId) pairs in expansion order, pass last.
    /// Empty until node is expanded.
    pub children: Vec<(Move, NodeId)>,

    /// N: completed descents through this node, plus outstanding virtual loss
    pub visit_count: u32,

    /// W: sum of backed-up values, minus outstanding virtual loss.
    /// Stored from the perspective of the side choosing this node.
    pub value_sum: f32,

    /// U: exploration bonus, recomputed on every backup
    pub exploration: f32,

    /// Virtual-loss applications not yet reverted
    pub pending_virtual_loss: u32,
}

impl<S> MctsNode<S> {
    /// Create a new, unexpanded root node.
    pub fn new_root() -> Self {
        Self {
            parent: NodeId::NONE,
            action: Move::Pass,
            prior: 1.0, // Root has prior 1.0
            state: None,
            children: Vec::new(),
            visit_count: 0,
            value_sum: 0.0,
            exploration: 0.0,
            pending_virtual_loss: 0,
        }
    }

    /// Create a new, unexpanded child node.
    pub fn new_child(parent: NodeId, action: Move, prior: f32) -> Self {
        Self {
            parent,
            action,
            prior,
            ..Self::new_root()
        }
    }

    /// Q = W / N. Returns 0.0 if never visited.
    #[inline]
    pub fn mean_value(&self) -> f32 {
        if self.visit_count == 0 {
            0.0
        } else {
            self.value_sum / self.visit_count as f32
        }
    }

    /// Q + U, the sole ranking key for child selection.
    ///
    /// U is the value computed at the last backup, not recomputed here:
    /// it only changes when N does.
    #[inline]
    pub fn action_score(&self) -> f32 {
        self.mean_value() + self.exploration
    }

    /// A node is expanded iff its state has been materialized.
    #[inline]
    pub fn is_expanded(&self) -> bool {
        self.state.is_some()
    }

    /// Leaf: not yet expanded.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        !self.is_expanded()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Pessimistic provisional update for an in-flight descent.
    pub fn apply_virtual_loss(&mut self, loss: u32) {
        self.visit_count += loss;
        self.value_sum -= loss as f32;
        self.pending_virtual_loss += 1;
    }

    /// Undo one [`apply_virtual_loss`](Self::apply_virtual_loss).
    ///
    /// A revert with nothing outstanding is logged and ignored, leaving the
    /// statistics untouched.
    pub fn revert_virtual_loss(&mut self, loss: u32) {
        if self.pending_virtual_loss == 0 {
            warn!(action = ?self.action, "Virtual loss revert without a matching apply");
            return;
        }
        self.visit_count -= loss;
        self.value_sum += loss as f32;
        self.pending_virtual_loss -= 1;
    }

    /// Record one completed descent.
    ///
    /// `parent_visits` is the parent's current N; pass `None` for the root,
    /// which has no exploration bonus.
    pub fn backup(&mut self, value: f32, parent_visits: Option<u32>, c_puct: f32) {
        self.visit_count += 1;
        self.value_sum += value;
        if let Some(parent_visits) = parent_visits {
            self.exploration =
                c_puct * (parent_visits as f32).sqrt() * self.prior / self.visit_count as f32;
        }
    }
}
