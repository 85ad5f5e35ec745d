//! Small-board Go for the batched tree search.
//!
//! Provides the three collaborators the search consumes:
//!
//! - [`GoPosition`]: rules and transitions (captures, suicide, simple ko,
//!   pass; two passes end the game)
//! - [`GoEncoder`]: feature planes honoring all 8 board symmetries
//! - [`HeuristicEvaluator`]: a model-free policy/value estimate
//!
//! # Usage
//!
//! ```rust
//! use apv_mcts::{GameState, Move};
//! use games_go::GoPosition;
//!
//! let position = GoPosition::new(9);
//! let next = position.play(Move::Place(40)).expect("center is empty");
//! assert!(next.play(Move::Place(40)).is_none());
//! ```

mod encoder;
mod evaluator;
mod position;

pub use encoder::{GoEncoder, PLANES};
pub use evaluator::HeuristicEvaluator;
pub use position::{Color, GoPosition, Point};

#[cfg(test)]
mod tests {
    use super::*;
    use apv_mcts::{GameState, MctsConfig, MctsSearch};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_search_plays_on_go_board() {
        let position = GoPosition::new(5);
        let evaluator = Arc::new(HeuristicEvaluator::new(5));
        let config = MctsConfig::for_testing().with_max_concurrency(8);
        let mut search = MctsSearch::new(GoEncoder, evaluator, config, 3).unwrap();

        let result = search.search(position.clone(), 64).await.unwrap();

        assert_eq!(result.policy.len(), position.num_actions());
        assert!((result.policy.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        assert_eq!(result.simulations, 64);
        assert_eq!(search.tree().pending_virtual_loss(), 0);
    }

    #[tokio::test]
    async fn test_occupied_point_gets_no_visits() {
        let position = GoPosition::new(3).play(apv_mcts::Move::Place(4)).unwrap();
        let evaluator = Arc::new(HeuristicEvaluator::new(3));
        let config = MctsConfig::for_evaluation().with_max_concurrency(1);
        let mut search = MctsSearch::new(GoEncoder, evaluator, config, 0).unwrap();

        let policy = search
            .suggest_move_distribution(position, 40)
            .await
            .unwrap();
        // At most the one visit that discovers the move is illegal
        assert!(policy[4] < 0.05);
    }
}
