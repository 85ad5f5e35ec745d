//! Evaluator trait for leaf evaluation.
//!
//! The evaluator maps encoded states to a policy (one entry per action,
//! pass last) and a scalar value for the side that just moved. In AlphaZero-style
//! play this is a neural network; its per-call overhead is why the search
//! funnels every request through the batcher. For testing we provide a
//! uniform evaluator.

use thiserror::Error;

/// Errors that can occur during evaluation.
///
/// `Clone` so that one failed batch can be reported to every request that
/// was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum EvaluatorError {
    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model error: {0}")]
    ModelError(String),
}

/// Result of evaluating one encoded state.
#[derive(Debug, Clone)]
pub struct EvalResult {
    /// Policy over actions, in the coordinates the features were encoded in.
    /// Values are non-negative; they need not sum to exactly 1.
    pub policy: Vec<f32>,

    /// Value estimate for the side that just moved into the evaluated state.
    /// Range: -1.0 (certain loss) to +1.0 (certain win).
    pub value: f32,
}

/// Trait for leaf evaluators.
///
/// `evaluate_batch` must return exactly one result per input, in order.
pub trait Evaluator: Send + Sync {
    /// Evaluate a single encoded state.
    fn evaluate(&self, features: &[f32]) -> Result<EvalResult, EvaluatorError>;

    /// Batch evaluate multiple encoded states.
    /// Default implementation calls evaluate() in a loop; real models override it.
    fn evaluate_batch(&self, batch: &[&[f32]]) -> Result<Vec<EvalResult>, EvaluatorError> {
        batch.iter().map(|features| self.evaluate(features)).collect()
    }
}

/// Uniform evaluator that assigns equal probability to every action.
/// Value is always 0.0 (neutral). Useful for testing the search without a model.
#[derive(Debug, Clone)]
pub struct UniformEvaluator {
    num_actions: usize,
}

impl UniformEvaluator {
    /// `num_actions` is board cells plus one for pass.
    pub fn new(num_actions: usize) -> Self {
        Self { num_actions }
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }
}

impl Evaluator for UniformEvaluator {
    fn evaluate(&self, _features: &[f32]) -> Result<EvalResult, EvaluatorError> {
        if self.num_actions == 0 {
            return Err(EvaluatorError::InvalidInput(
                "uniform evaluator needs at least one action".to_string(),
            ));
        }

        let prob = 1.0 / self.num_actions as f32;
        Ok(EvalResult {
            policy: vec![prob; self.num_actions],
            value: 0.0,
        })
    }
}
