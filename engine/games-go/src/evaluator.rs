//! A cheap stand-in for a trained policy/value network.

use apv_mcts::{EvalResult, Evaluator, EvaluatorError};

use crate::encoder::PLANES;

/// Prior mass given to passing, before normalization.
const PASS_WEIGHT: f32 = 0.01;

/// Scores [`GoEncoder`](crate::GoEncoder) features without a model.
///
/// Policy: empty non-ko points, weighted towards the center. Value: the
/// stone balance of the side that just moved, squashed into (-1, 1). Both are
/// invariant under board symmetries, so they are correct in whatever
/// coordinates the features were laid out.
#[derive(Debug, Clone)]
pub struct HeuristicEvaluator {
    size: usize,
}

impl HeuristicEvaluator {
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    pub fn num_actions(&self) -> usize {
        self.size * self.size + 1
    }

    fn centrality(&self, index: usize) -> f32 {
        let center = (self.size as f32 - 1.0) / 2.0;
        let (row, col) = ((index / self.size) as f32, (index % self.size) as f32);
        let distance = (row - center).abs().max((col - center).abs());
        1.0 - distance / (center + 1.0)
    }
}

impl Evaluator for HeuristicEvaluator {
    fn evaluate(&self, features: &[f32]) -> Result<EvalResult, EvaluatorError> {
        let cells = self.size * self.size;
        if features.len() != PLANES * cells {
            return Err(EvaluatorError::InvalidInput(format!(
                "expected {} features for a {}x{} board, got {}",
                PLANES * cells,
                self.size,
                self.size,
                features.len()
            )));
        }

        let own = &features[..cells];
        let opponent = &features[cells..2 * cells];
        let empty = &features[2 * cells..3 * cells];

        let mut policy: Vec<f32> = (0..cells)
            .map(|i| empty[i] * (0.5 + self.centrality(i)))
            .collect();
        policy.push(PASS_WEIGHT);
        let total: f32 = policy.iter().sum();
        for p in &mut policy {
            *p /= total;
        }

        // Features are laid out for the side to move; score the previous mover
        let balance: f32 = opponent.iter().sum::<f32>() - own.iter().sum::<f32>();
        let value = (4.0 * balance / cells as f32).tanh();

        Ok(EvalResult { policy, value })
    }
}
