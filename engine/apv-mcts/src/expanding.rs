//! Tracks leaves whose evaluation is in flight.
//!
//! A descent that reaches an unexpanded leaf claims it here before
//! submitting it to the batcher. Any other descent arriving at the same node
//! waits until the claim is released, then re-reads the node, which by then
//! is either expanded or (after a failure) still a leaf it may claim itself.

use std::cell::RefCell;
use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::Notify;

use crate::node::NodeId;

/// Set of node ids currently being expanded, plus a wakeup for waiters.
#[derive(Debug, Default)]
pub struct ExpandingSet {
    nodes: RefCell<HashSet<NodeId>>,
    released: Notify,
}

impl ExpandingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id` for expansion. `None` if another descent already holds it.
    pub fn try_enter(&self, id: NodeId) -> Option<ExpansionGuard<'_>> {
        if self.nodes.borrow_mut().insert(id) {
            Some(ExpansionGuard { set: self, id })
        } else {
            None
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.borrow().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    /// Suspend until `id` is not being expanded.
    ///
    /// Wakes on every release, and at least every `poll` regardless.
    /// Returns whether the caller had to wait at all.
    pub async fn wait_until_free(&self, id: NodeId, poll: Duration) -> bool {
        let mut waited = false;
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not lost
            notified.as_mut().enable();

            if !self.contains(id) {
                return waited;
            }
            waited = true;
            let _ = tokio::time::timeout(poll, notified).await;
        }
    }

    fn release(&self, id: NodeId) {
        self.nodes.borrow_mut().remove(&id);
        self.released.notify_waiters();
    }
}

/// Claim on one node. Dropping it releases the node and wakes waiters,
/// whether the expansion succeeded, failed or was cancelled.
#[derive(Debug)]
pub struct ExpansionGuard<'a> {
    set: &'a ExpandingSet,
    id: NodeId,
}

impl ExpansionGuard<'_> {
    pub fn node(&self) -> NodeId {
        self.id
    }
}

impl Drop for ExpansionGuard<'_> {
    fn drop(&mut self) {
        self.set.release(self.id);
    }
}
