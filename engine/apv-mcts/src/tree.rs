//! Search tree structure with arena allocation.
//!
//! Nodes are stored in a contiguous Vec and referenced by NodeId indices,
//! so the parent back-reference is a plain index and upward walks during
//! backup are O(1) per level without reference cycles.

use std::cmp::Ordering;

use thiserror::Error;

use crate::game::{GameState, Move};
use crate::node::{MctsNode, NodeId};

/// Structural errors raised by tree mutations.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("node {0:?} is already expanded")]
    AlreadyExpanded(NodeId),

    #[error("policy has {got} entries, expected {expected} (board cells + pass)")]
    PolicyLength { expected: usize, got: usize },

    #[error("node {0:?} is not a child of the root")]
    NotRootChild(NodeId),
}

/// Search tree with arena-based node storage.
#[derive(Debug)]
pub struct MctsTree<S> {
    /// Arena storing all nodes
    nodes: Vec<MctsNode<S>>,

    /// Root node index (always 0)
    root: NodeId,
}

impl<S> Default for MctsTree<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> MctsTree<S> {
    /// Create a tree holding a single unexpanded root.
    pub fn new() -> Self {
        Self {
            nodes: vec![MctsNode::new_root()],
            root: NodeId(0),
        }
    }

    /// Get the root node ID.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Get a reference to a node by ID.
    #[inline]
    pub fn get(&self, id: NodeId) -> &MctsNode<S> {
        &self.nodes[id.0 as usize]
    }

    /// Get a mutable reference to a node by ID.
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut MctsNode<S> {
        &mut self.nodes[id.0 as usize]
    }

    /// Allocate a new node and return its ID.
    pub fn allocate(&mut self, node: MctsNode<S>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Get the total number of nodes in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty (should never be true after construction).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get the arena slice for read access.
    #[inline]
    pub fn arena(&self) -> &[MctsNode<S>] {
        &self.nodes
    }

    /// Child of `node_id` reached by `action`, if expanded.
    pub fn child(&self, node_id: NodeId, action: Move) -> Option<NodeId> {
        self.get(node_id)
            .children
            .iter()
            .find(|(mv, _)| *mv == action)
            .map(|(_, id)| *id)
    }

    /// Select the child with the highest Q + U.
    ///
    /// Ties go to the first child in expansion order (row-major, pass last).
    pub fn select_child(&self, node_id: NodeId) -> Option<NodeId> {
        let mut best: Option<(NodeId, f32)> = None;
        for &(_, child_id) in &self.get(node_id).children {
            let score = self.get(child_id).action_score();
            match best {
                Some((_, best_score)) if score.partial_cmp(&best_score) != Some(Ordering::Greater) => {}
                _ => best = Some((child_id, score)),
            }
        }
        best.map(|(id, _)| id)
    }

    /// Record one completed descent at `node_id`.
    ///
    /// U is recomputed against the parent's current visit count; the root
    /// only gets N and W.
    pub fn backup(&mut self, node_id: NodeId, value: f32, c_puct: f32) {
        let parent = self.get(node_id).parent;
        let parent_visits = parent.is_some().then(|| self.get(parent).visit_count);
        self.get_mut(node_id).backup(value, parent_visits, c_puct);
    }

    /// Apply virtual loss to a single node.
    #[inline]
    pub fn apply_virtual_loss(&mut self, node_id: NodeId, loss: u32) {
        self.get_mut(node_id).apply_virtual_loss(loss);
    }

    /// Revert one virtual-loss application on a single node.
    #[inline]
    pub fn revert_virtual_loss(&mut self, node_id: NodeId, loss: u32) {
        self.get_mut(node_id).revert_virtual_loss(loss);
    }

    /// Total virtual-loss applications not yet reverted, across all nodes.
    pub fn pending_virtual_loss(&self) -> u64 {
        self.nodes
            .iter()
            .map(|n| n.pending_virtual_loss as u64)
            .sum()
    }

    /// Get the most visited root action.
    /// Returns (action, visit_count) or None if root has no children.
    /// Ties go to the first child in expansion order.
    pub fn best_action(&self) -> Option<(Move, u32)> {
        let root = self.get(self.root);
        root.children
            .iter()
            .map(|(action, id)| (*action, self.get(*id).visit_count))
            .fold(None, |best, (action, visits)| match best {
                Some((_, best_visits)) if visits <= best_visits => best,
                _ => Some((action, visits)),
            })
    }

    /// Make a child of the root the new root, discarding everything else.
    ///
    /// The retained subtree is compacted into a fresh arena. Its statistics
    /// are kept; the new root loses its parent link and exploration bonus.
    pub fn promote(&mut self, child: NodeId) -> Result<(), TreeError> {
        if self.get(child).parent != self.root {
            return Err(TreeError::NotRootChild(child));
        }

        let mut old: Vec<Option<MctsNode<S>>> =
            std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        let mut queue = std::collections::VecDeque::from([(child, NodeId::NONE)]);

        while let Some((old_id, new_parent)) = queue.pop_front() {
            let Some(mut node) = old[old_id.0 as usize].take() else {
                continue;
            };
            let new_id = NodeId(self.nodes.len() as u32);
            let children = std::mem::take(&mut node.children);
            node.parent = new_parent;
            if new_parent.is_none() {
                node.exploration = 0.0;
            } else {
                self.get_mut(new_parent).children.push((node.action, new_id));
            }
            self.nodes.push(node);
            for (_, grandchild) in children {
                queue.push_back((grandchild, new_id));
            }
        }

        self.root = NodeId(0);
        Ok(())
    }

    /// Get statistics about the tree for debugging.
    pub fn stats(&self) -> TreeStats {
        let root = self.get(self.root);
        TreeStats {
            total_nodes: self.nodes.len(),
            expanded_nodes: self.nodes.iter().filter(|n| n.is_expanded()).count(),
            root_visits: root.visit_count,
            root_value: root.mean_value(),
            max_depth: self.compute_max_depth(),
        }
    }

    fn compute_max_depth(&self) -> u32 {
        let mut max_depth = 0;
        let mut stack = vec![(self.root, 0u32)];
        while let Some((node_id, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            for (_, child) in &self.get(node_id).children {
                stack.push((*child, depth + 1));
            }
        }
        max_depth
    }
}

impl<S: GameState> MctsTree<S> {
    /// Expand a leaf: materialize its state and create one child per action.
    ///
    /// `priors` has one entry per intersection plus pass. Pass is always
    /// instantiated, however small its prior.
    pub fn expand(&mut self, node_id: NodeId, state: S, priors: &[f32]) -> Result<(), TreeError> {
        let cells = state.board_cells();
        if priors.len() != cells + 1 {
            return Err(TreeError::PolicyLength {
                expected: cells + 1,
                got: priors.len(),
            });
        }
        if self.get(node_id).is_expanded() {
            return Err(TreeError::AlreadyExpanded(node_id));
        }

        let mut children = Vec::with_capacity(priors.len());
        for (index, &prior) in priors.iter().enumerate() {
            let action = Move::from_index(index, cells);
            let prior = if prior.is_finite() { prior.max(0.0) } else { 0.0 };
            let child_id = self.allocate(MctsNode::new_child(node_id, action, prior));
            children.push((action, child_id));
        }

        let node = self.get_mut(node_id);
        node.children = children;
        node.state = Some(state);
        Ok(())
    }

    /// Visit distribution at the root over all actions (board cells + pass).
    ///
    /// With temperature 1.0 this is N_child / N_root, renormalized to sum
    /// to 1. Temperature 0.0 puts all mass on the most visited action. If no
    /// child has been visited the mass is spread uniformly over the children.
    pub fn root_policy(&self, temperature: f32) -> Vec<f32> {
        let root = self.get(self.root);
        let Some(state) = root.state.as_ref() else {
            return Vec::new();
        };
        let cells = state.board_cells();
        let mut policy = vec![0.0; cells + 1];

        if root.children.is_empty() {
            return policy;
        }

        if temperature < 1e-6 {
            // Greedy: all mass on best action
            if let Some((action, _)) = self.best_action() {
                policy[action.index(cells)] = 1.0;
            }
            return policy;
        }

        let root_visits = root.visit_count.max(1) as f32;
        for (action, id) in &root.children {
            let share = self.get(*id).visit_count as f32 / root_visits;
            policy[action.index(cells)] = if temperature == 1.0 {
                share
            } else {
                share.powf(1.0 / temperature)
            };
        }

        let total: f32 = policy.iter().sum();
        if total > f32::EPSILON {
            for p in &mut policy {
                *p /= total;
            }
        } else {
            let uniform = 1.0 / root.children.len() as f32;
            for (action, _) in &root.children {
                policy[action.index(cells)] = uniform;
            }
        }

        policy
    }
}

/// Statistics about a search tree.
#[derive(Debug, Clone)]
pub struct TreeStats {
    pub total_nodes: usize,
    pub expanded_nodes: usize,
    pub root_visits: u32,
    /// Root Q, from the side that moved into the root position
    pub root_value: f32,
    pub max_depth: u32,
}
