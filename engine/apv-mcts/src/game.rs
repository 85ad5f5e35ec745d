//! Collaborator contracts consumed by the search.
//!
//! The search never looks inside a game state. It only needs a pure
//! transition function, an encoder that turns a state into evaluator
//! features, and the board size so it can lay out the policy vector
//! (one entry per intersection, pass last).

use crate::symmetry::Symmetry;

/// An action on a board with `cells` intersections.
///
/// Policies are indexed by [`Move::index`]: intersections in row-major
/// order, then pass at index `cells`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    /// Place a stone on the given intersection.
    Place(u16),
    /// Pass. Always instantiated as a child so it stays selectable.
    Pass,
}

impl Move {
    /// Map a policy index back to a move.
    #[inline]
    pub fn from_index(index: usize, cells: usize) -> Self {
        if index >= cells {
            Move::Pass
        } else {
            Move::Place(index as u16)
        }
    }

    /// Policy index of this move.
    #[inline]
    pub fn index(self, cells: usize) -> usize {
        match self {
            Move::Place(point) => point as usize,
            Move::Pass => cells,
        }
    }

    pub fn is_pass(self) -> bool {
        self == Move::Pass
    }
}

/// State/transition provider.
///
/// `play` must be a pure function of `(self, mv)`. Returning `None` is the
/// only modeled failure: the move is illegal, or the game is already over.
pub trait GameState: Clone + PartialEq + 'static {
    /// Number of board intersections.
    fn board_cells(&self) -> usize;

    /// Apply `mv`, or `None` if the transition is illegal/terminal.
    fn play(&self, mv: Move) -> Option<Self>;

    /// Length of every policy vector: intersections plus pass.
    #[inline]
    fn num_actions(&self) -> usize {
        self.board_cells() + 1
    }
}

/// Turns a state into evaluator input.
///
/// `encode` receives the symmetry drawn for this evaluation and must lay
/// the board out in transformed coordinates. `restore_policy` maps an
/// evaluator policy produced for those features back to true board
/// coordinates.
pub trait Encoder<S: GameState> {
    fn encode(&self, state: &S, symmetry: Symmetry) -> Vec<f32>;

    fn restore_policy(&self, _state: &S, policy: &[f32], symmetry: Symmetry) -> Vec<f32> {
        symmetry.invert_policy(policy)
    }
}
