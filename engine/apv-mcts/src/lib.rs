//! Asynchronous batched PUCT tree search with virtual loss.
//!
//! The search runs many logically sequential descents concurrently on one
//! thread. Each descent walks the tree from the root to a leaf, submits the
//! leaf to a shared evaluation queue and suspends; a single batcher task
//! drains the queue and calls the evaluator once per batch. This amortizes
//! the evaluator's per-call cost (typically a neural network) without any
//! locking: the tree is only touched between suspension points.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use apv_mcts::{MctsConfig, MctsSearch, UniformEvaluator};
//! use games_go::{GoEncoder, GoPosition};
//!
//! let position = GoPosition::new(9);
//! let evaluator = Arc::new(UniformEvaluator::new(position.num_actions()));
//! let mut search = MctsSearch::new(GoEncoder, evaluator, MctsConfig::default(), 42)?;
//!
//! let policy = search.suggest_move_distribution(position, 800).await?;
//! ```
//!
//! # Configuration
//!
//! The [`MctsConfig`] struct controls search behavior:
//!
//! - `c_puct`: Exploration constant (default: 5.0)
//! - `virtual_loss`: Provisional loss per in-flight visit (default: 3)
//! - `max_concurrency`: Admission cap on concurrent descents (default: 64)
//! - `root_noise`: Dirichlet noise on fresh root priors (default: on)
//!
//! # Architecture
//!
//! ```text
//!            MctsSearch::search
//!                   |
//!     +-------------+--------------+
//!     |   admission semaphore (K)  |
//!     v             v              v
//!  descend       descend   ...  descend ---- ExpandingSet
//!     |             |              |         (one expansion per leaf)
//!     +------> BatchQueue <--------+
//!                   |
//!                Batcher ---- Evaluator::evaluate_batch
//! ```

pub mod batcher;
pub mod config;
mod descent;
pub mod evaluator;
pub mod expanding;
pub mod game;
pub mod node;
pub mod noise;
pub mod search;
pub mod symmetry;
pub mod tree;

#[cfg(test)]
mod test_util;

// Re-export main types
pub use config::MctsConfig;
pub use descent::TERMINAL_VALUE;
pub use evaluator::{EvalResult, Evaluator, EvaluatorError, UniformEvaluator};
pub use game::{Encoder, GameState, Move};
pub use node::{MctsNode, NodeId};
pub use search::{sample_action, MctsSearch, SearchError, SearchResult, SearchStats};
pub use symmetry::Symmetry;
pub use tree::{MctsTree, TreeError, TreeStats};
