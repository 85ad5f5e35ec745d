//! Search configuration parameters.

use std::time::Duration;

use crate::search::SearchError;

/// Configuration for the asynchronous batched search.
#[derive(Debug, Clone)]
pub struct MctsConfig {
    /// Exploration constant in U = c_puct * sqrt(N_parent) * P / N.
    pub c_puct: f32,

    /// Provisional loss applied to every node on an in-flight path:
    /// N += virtual_loss, W -= virtual_loss. Always reverted.
    pub virtual_loss: u32,

    /// Dirichlet noise alpha. Small values give spiky noise, which suits
    /// large action spaces (0.03 for a 19x19 board).
    pub dirichlet_alpha: f32,

    /// Fraction of prior that comes from Dirichlet noise.
    /// 0.25 means 75% prior + 25% noise.
    pub dirichlet_epsilon: f32,

    /// Mix noise into the priors when a fresh root is expanded.
    pub root_noise: bool,

    /// Mix noise into the priors of every leaf expansion as well.
    pub leaf_noise: bool,

    /// Admission cap: descents allowed inside select/recurse at once.
    /// Higher values batch better but spread more virtual loss.
    pub max_concurrency: usize,

    /// Capacity of the evaluation queue. Producers wait on a full queue.
    /// Must be at least `max_concurrency`.
    pub queue_capacity: usize,

    /// Idle polls the batcher tolerates after the last descent finished.
    pub batcher_margin: u32,

    /// How long the batcher waits for a request before counting an idle cycle.
    pub batcher_poll: Duration,

    /// Upper bound on a single wait for a leaf another descent is expanding.
    pub guard_poll: Duration,

    /// Evaluate each leaf under a randomly drawn board symmetry.
    pub random_symmetry: bool,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            c_puct: 5.0,
            virtual_loss: 3,
            dirichlet_alpha: 0.03,
            dirichlet_epsilon: 0.25,
            root_noise: true,
            leaf_noise: false,
            max_concurrency: 64,
            queue_capacity: 64,
            batcher_margin: 10,
            batcher_poll: Duration::from_millis(1),
            guard_poll: Duration::from_micros(100),
            random_symmetry: true,
        }
    }
}

impl MctsConfig {
    /// Create config for self-play (with exploration noise).
    pub fn for_training() -> Self {
        Self::default()
    }

    /// Create config for evaluation/inference (no noise).
    pub fn for_evaluation() -> Self {
        Self {
            root_noise: false,
            leaf_noise: false,
            dirichlet_epsilon: 0.0,
            ..Self::default()
        }
    }

    /// Create a small, noise-free config for testing.
    pub fn for_testing() -> Self {
        Self {
            root_noise: false,
            leaf_noise: false,
            random_symmetry: false,
            max_concurrency: 8,
            queue_capacity: 8,
            batcher_margin: 2,
            ..Self::default()
        }
    }

    /// Builder pattern: set c_puct exploration constant.
    pub fn with_c_puct(mut self, c: f32) -> Self {
        self.c_puct = c;
        self
    }

    /// Builder pattern: set the admission cap, growing the queue to match.
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self.queue_capacity = self.queue_capacity.max(n);
        self
    }

    /// Builder pattern: set evaluation queue capacity.
    pub fn with_queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    /// Builder pattern: enable or disable root noise.
    pub fn with_root_noise(mut self, enabled: bool) -> Self {
        self.root_noise = enabled;
        self
    }

    /// Builder pattern: enable or disable random evaluation symmetries.
    pub fn with_random_symmetry(mut self, enabled: bool) -> Self {
        self.random_symmetry = enabled;
        self
    }

    /// Builder pattern: set virtual loss magnitude.
    pub fn with_virtual_loss(mut self, loss: u32) -> Self {
        self.virtual_loss = loss;
        self
    }

    /// Reject configurations the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), SearchError> {
        if !(self.c_puct.is_finite() && self.c_puct >= 0.0) {
            return Err(SearchError::InvalidConfig(format!(
                "c_puct must be finite and non-negative, got {}",
                self.c_puct
            )));
        }
        if self.max_concurrency == 0 {
            return Err(SearchError::InvalidConfig(
                "max_concurrency must be greater than 0".to_string(),
            ));
        }
        if self.queue_capacity < self.max_concurrency {
            return Err(SearchError::InvalidConfig(format!(
                "queue_capacity ({}) must be >= max_concurrency ({})",
                self.queue_capacity, self.max_concurrency
            )));
        }
        if !(0.0..=1.0).contains(&self.dirichlet_epsilon) {
            return Err(SearchError::InvalidConfig(format!(
                "dirichlet_epsilon must be within [0, 1], got {}",
                self.dirichlet_epsilon
            )));
        }
        if (self.root_noise || self.leaf_noise) && self.dirichlet_alpha <= 0.0 {
            return Err(SearchError::InvalidConfig(
                "dirichlet_alpha must be positive when noise is enabled".to_string(),
            ));
        }
        if self.batcher_poll.is_zero() {
            return Err(SearchError::InvalidConfig(
                "batcher_poll must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
