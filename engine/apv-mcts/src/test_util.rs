//! Toy game and scripted evaluators shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::evaluator::{EvalResult, Evaluator, EvaluatorError};
use crate::game::{Encoder, GameState, Move};
use crate::symmetry::{square_side, Symmetry};

/// Stones on a tiny board with no captures.
///
/// Placing on an occupied or blocked cell is illegal, and two consecutive
/// passes end the game (every later move is illegal).
#[derive(Debug, Clone, PartialEq)]
pub struct GridState {
    stones: Vec<i8>,
    blocked: Vec<bool>,
    to_move: i8,
    passes: u8,
}

impl GridState {
    pub fn empty(cells: usize) -> Self {
        Self {
            stones: vec![0; cells],
            blocked: vec![false; cells],
            to_move: 1,
            passes: 0,
        }
    }

    /// Board where placing on any of `blocked` is illegal.
    pub fn with_blocked(cells: usize, blocked: &[usize]) -> Self {
        let mut state = Self::empty(cells);
        for &cell in blocked {
            state.blocked[cell] = true;
        }
        state
    }

    pub fn is_over(&self) -> bool {
        self.passes >= 2
    }
}

impl GameState for GridState {
    fn board_cells(&self) -> usize {
        self.stones.len()
    }

    fn play(&self, mv: Move) -> Option<Self> {
        if self.is_over() {
            return None;
        }
        let mut next = self.clone();
        match mv {
            Move::Pass => next.passes += 1,
            Move::Place(cell) => {
                let cell = cell as usize;
                if cell >= self.stones.len() || self.blocked[cell] || self.stones[cell] != 0 {
                    return None;
                }
                next.stones[cell] = self.to_move;
                next.passes = 0;
            }
        }
        next.to_move = -self.to_move;
        Some(next)
    }
}

/// One plane of stones from the mover's point of view, laid out under the
/// requested symmetry when the board is square.
#[derive(Debug, Clone, Default)]
pub struct GridEncoder;

impl Encoder<GridState> for GridEncoder {
    fn encode(&self, state: &GridState, symmetry: Symmetry) -> Vec<f32> {
        let plane: Vec<f32> = state
            .stones
            .iter()
            .map(|&s| (s * state.to_move) as f32)
            .collect();
        match square_side(plane.len()) {
            Some(side) => symmetry.apply_plane(&plane, side),
            None => plane,
        }
    }
}

/// A game where every move is always legal and nothing is ever terminal.
/// Only the ply count distinguishes states.
#[derive(Debug, Clone, PartialEq)]
pub struct EndlessState {
    pub cells: usize,
    pub ply: u32,
}

impl GameState for EndlessState {
    fn board_cells(&self) -> usize {
        self.cells
    }

    fn play(&self, _mv: Move) -> Option<Self> {
        Some(Self {
            cells: self.cells,
            ply: self.ply + 1,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlyEncoder;

impl Encoder<EndlessState> for PlyEncoder {
    fn encode(&self, state: &EndlessState, _symmetry: Symmetry) -> Vec<f32> {
        vec![state.ply as f32]
    }
}

/// Uniform priors and a fixed value. Records every batch size it sees.
#[derive(Debug)]
pub struct ConstantEvaluator {
    num_actions: usize,
    value: f32,
    calls: AtomicUsize,
    items: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
}

impl ConstantEvaluator {
    pub fn new(num_actions: usize, value: f32) -> Self {
        Self {
            num_actions,
            value,
            calls: AtomicUsize::new(0),
            items: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Number of `evaluate_batch` calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of states evaluated across all calls.
    pub fn items(&self) -> usize {
        self.items.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }
}

impl Evaluator for ConstantEvaluator {
    fn evaluate(&self, _features: &[f32]) -> Result<EvalResult, EvaluatorError> {
        Ok(EvalResult {
            policy: vec![1.0 / self.num_actions as f32; self.num_actions],
            value: self.value,
        })
    }

    fn evaluate_batch(&self, batch: &[&[f32]]) -> Result<Vec<EvalResult>, EvaluatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.items.fetch_add(batch.len(), Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(batch.len());
        batch.iter().map(|f| self.evaluate(f)).collect()
    }
}

/// Returns the first feature as the value, so callers can check they got
/// their own row back.
#[derive(Debug)]
pub struct EchoEvaluator {
    pub num_actions: usize,
}

impl Evaluator for EchoEvaluator {
    fn evaluate(&self, features: &[f32]) -> Result<EvalResult, EvaluatorError> {
        Ok(EvalResult {
            policy: vec![1.0 / self.num_actions as f32; self.num_actions],
            value: features.first().copied().unwrap_or_default(),
        })
    }
}

/// Puts most prior mass on the occupied feature cells.
/// Lets tests check that priors land on true board coordinates after a
/// symmetry round trip.
#[derive(Debug)]
pub struct MarkerEvaluator;

impl Evaluator for MarkerEvaluator {
    fn evaluate(&self, features: &[f32]) -> Result<EvalResult, EvaluatorError> {
        let mut policy: Vec<f32> = features
            .iter()
            .map(|&f| if f != 0.0 { 0.9 } else { 0.01 })
            .collect();
        policy.push(0.01);
        Ok(EvalResult { policy, value: 0.0 })
    }
}

/// Succeeds for `ok_batches` batches, then fails every call.
#[derive(Debug)]
pub struct FailingEvaluator {
    num_actions: usize,
    ok_batches: AtomicUsize,
}

impl FailingEvaluator {
    pub fn new(num_actions: usize) -> Self {
        Self::after(num_actions, 0)
    }

    pub fn after(num_actions: usize, ok_batches: usize) -> Self {
        Self {
            num_actions,
            ok_batches: AtomicUsize::new(ok_batches),
        }
    }
}

impl Evaluator for FailingEvaluator {
    fn evaluate(&self, _features: &[f32]) -> Result<EvalResult, EvaluatorError> {
        Ok(EvalResult {
            policy: vec![1.0 / self.num_actions as f32; self.num_actions],
            value: 0.0,
        })
    }

    fn evaluate_batch(&self, batch: &[&[f32]]) -> Result<Vec<EvalResult>, EvaluatorError> {
        let remaining = self.ok_batches.load(Ordering::SeqCst);
        if remaining == 0 {
            return Err(EvaluatorError::ModelError("model unavailable".to_string()));
        }
        self.ok_batches.store(remaining - 1, Ordering::SeqCst);
        batch.iter().map(|f| self.evaluate(f)).collect()
    }
}
