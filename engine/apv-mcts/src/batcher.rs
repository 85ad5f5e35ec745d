//! Evaluation batcher.
//!
//! Descents submit encoded leaves through a bounded [`BatchQueue`] and
//! suspend on a oneshot reply. A single [`Batcher`] task drains whatever is
//! queued, makes one `evaluate_batch` call for all of it, and answers every
//! request with its own row, in submission order.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::evaluator::{EvalResult, Evaluator, EvaluatorError};
use crate::search::SearchError;

type Reply = oneshot::Sender<Result<EvalResult, EvaluatorError>>;

/// One pending evaluation.
#[derive(Debug)]
pub struct EvalRequest {
    pub features: Vec<f32>,
    reply: Reply,
}

/// Producer side of the evaluation queue.
///
/// Cloned into every descent. `submit` waits while the queue is full.
#[derive(Debug, Clone)]
pub struct BatchQueue {
    tx: mpsc::Sender<EvalRequest>,
}

impl BatchQueue {
    /// Queue `features` and wait for the batched result.
    pub async fn submit(&self, features: Vec<f32>) -> Result<EvalResult, SearchError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(EvalRequest { features, reply })
            .await
            .map_err(|_| SearchError::BatcherClosed)?;

        match response.await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SearchError::BatcherClosed),
        }
    }
}

/// Create a queue holding at most `capacity` pending requests.
pub fn channel(capacity: usize) -> (BatchQueue, mpsc::Receiver<EvalRequest>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (BatchQueue { tx }, rx)
}

/// Number of descents that have not finished yet.
///
/// The batcher only starts counting down its idle margin once this is zero.
#[derive(Debug, Clone, Default)]
pub struct RunningDescents(Rc<Cell<usize>>);

impl RunningDescents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one descent as running until the returned token is dropped.
    pub fn register(&self) -> RunningToken {
        self.0.set(self.0.get() + 1);
        RunningToken(self.0.clone())
    }

    pub fn count(&self) -> usize {
        self.0.get()
    }
}

#[derive(Debug)]
pub struct RunningToken(Rc<Cell<usize>>);

impl Drop for RunningToken {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

/// Counters for one batcher run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// `evaluate_batch` calls made
    pub batches: u64,
    /// States evaluated across all batches
    pub items: u64,
    pub largest_batch: usize,
}

/// Consumer side: the drain loop.
pub struct Batcher<E: Evaluator> {
    rx: mpsc::Receiver<EvalRequest>,
    evaluator: Arc<E>,
    running: RunningDescents,
    margin: u32,
    poll: Duration,
}

impl<E: Evaluator> Batcher<E> {
    pub fn new(
        rx: mpsc::Receiver<EvalRequest>,
        evaluator: Arc<E>,
        running: RunningDescents,
        margin: u32,
        poll: Duration,
    ) -> Self {
        Self {
            rx,
            evaluator,
            running,
            margin,
            poll,
        }
    }

    /// Drain until every producer is gone, or no descent is running and
    /// `margin` idle polls have passed.
    ///
    /// An evaluator failure fails the batch in flight and every request
    /// still queued, closes the queue and is returned.
    pub async fn run(mut self) -> Result<BatchStats, SearchError> {
        let mut stats = BatchStats::default();
        let mut margin = self.margin;

        loop {
            match tokio::time::timeout(self.poll, self.rx.recv()).await {
                Ok(Some(first)) => {
                    // Let descents that are ready to submit do so before draining
                    tokio::task::yield_now().await;
                    let mut batch = vec![first];
                    while let Ok(request) = self.rx.try_recv() {
                        batch.push(request);
                    }
                    if let Err(e) = self.flush(batch, &mut stats) {
                        self.fail_pending(&e);
                        return Err(e.into());
                    }
                }
                // All producers dropped their queue handles
                Ok(None) => break,
                Err(_) => {
                    if self.running.count() == 0 {
                        if margin == 0 {
                            break;
                        }
                        margin -= 1;
                    }
                }
            }
        }

        debug!(
            batches = stats.batches,
            items = stats.items,
            largest = stats.largest_batch,
            "Batcher finished"
        );
        Ok(stats)
    }

    fn flush(&self, batch: Vec<EvalRequest>, stats: &mut BatchStats) -> Result<(), EvaluatorError> {
        let size = batch.len();
        let inputs: Vec<&[f32]> = batch.iter().map(|r| r.features.as_slice()).collect();
        let outcome = self.evaluator.evaluate_batch(&inputs).and_then(|results| {
            if results.len() == size {
                Ok(results)
            } else {
                Err(EvaluatorError::EvaluationFailed(format!(
                    "evaluator returned {} results for a batch of {}",
                    results.len(),
                    size
                )))
            }
        });

        match outcome {
            Ok(results) => {
                stats.batches += 1;
                stats.items += size as u64;
                stats.largest_batch = stats.largest_batch.max(size);
                debug!(batch_size = size, "Evaluated batch");

                for (request, result) in batch.into_iter().zip(results) {
                    // A dropped receiver means the descent was cancelled
                    let _ = request.reply.send(Ok(result));
                }
                Ok(())
            }
            Err(e) => {
                warn!(batch_size = size, error = %e, "Evaluator failed");
                for request in batch {
                    let _ = request.reply.send(Err(e.clone()));
                }
                Err(e)
            }
        }
    }

    fn fail_pending(&mut self, error: &EvaluatorError) {
        self.rx.close();
        while let Ok(request) = self.rx.try_recv() {
            let _ = request.reply.send(Err(error.clone()));
        }
    }
}
