//! Branch table bookkeeping
//!
//! The branch board is the single source of truth for concurrently-active
//! forked executions: which branches are live, which have completed and
//! with what outcome, and which (branch, event type) pairs are suspended
//! waiting for an event. Branch completions are queued here and folded
//! into waiting joins by the dispatcher between node calls.

use std::collections::{HashMap, VecDeque};

use crate::types::{BranchId, EventType, Outcome};

use super::node::NodeRun;

/// Status of one branch for the lifetime of a scheduler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BranchStatus {
    /// Branch is live: begun and not yet resolved.
    Running,
    /// Branch resolved with the recorded outcome.
    Done(Outcome),
}

/// Runtime bookkeeping shared by every node call of one scheduler instance.
#[derive(Default)]
pub(crate) struct BranchBoard {
    statuses: HashMap<BranchId, BranchStatus>,
    /// Pending set: event type -> branches suspended on it. A branch runs
    /// sequentially, so it holds at most one pending leaf at a time.
    pending: HashMap<EventType, Vec<BranchId>>,
    completions: VecDeque<(BranchId, Outcome)>,
}

impl BranchBoard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reserve a branch id, marking it live. Returns false when the id is
    /// already live, which is a caller contract violation.
    pub(crate) fn reserve(&mut self, branch: BranchId) -> bool {
        if self.is_live(branch) {
            return false;
        }
        self.statuses.insert(branch, BranchStatus::Running);
        true
    }

    pub(crate) fn status(&self, branch: BranchId) -> Option<BranchStatus> {
        self.statuses.get(&branch).copied()
    }

    pub(crate) fn is_live(&self, branch: BranchId) -> bool {
        matches!(self.status(branch), Some(BranchStatus::Running))
    }

    /// Record a branch resolution and queue it for join delivery. The
    /// status record outlives the queue entry so a join that begins later
    /// still counts this contributor.
    pub(crate) fn record_done(&mut self, branch: BranchId, outcome: Outcome) {
        self.statuses.insert(branch, BranchStatus::Done(outcome));
        self.completions.push_back((branch, outcome));
    }

    pub(crate) fn take_completion(&mut self) -> Option<(BranchId, Outcome)> {
        self.completions.pop_front()
    }

    pub(crate) fn add_pending(&mut self, branch: BranchId, event_type: EventType) {
        self.pending.entry(event_type).or_default().push(branch);
    }

    pub(crate) fn remove_pending(&mut self, branch: BranchId, event_type: &EventType) {
        if let Some(branches) = self.pending.get_mut(event_type) {
            branches.retain(|b| *b != branch);
            if branches.is_empty() {
                self.pending.remove(event_type);
            }
        }
    }

    /// Branches suspended on the given event type, in registration order.
    pub(crate) fn matching_branches(&self, event_type: &EventType) -> Vec<BranchId> {
        self.pending.get(event_type).cloned().unwrap_or_default()
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drop all pending registrations and queued completions. Statuses
    /// are kept; the instance terminates right after and is never
    /// consulted again.
    pub(crate) fn clear(&mut self) {
        self.pending.clear();
        self.completions.clear();
    }
}

/// The branch table: bookkeeping plus the suspended runners of forked
/// branches. The main continuation's runner is owned by the dispatcher
/// and never appears in `runners`.
#[derive(Default)]
pub(crate) struct BranchSet {
    pub(crate) board: BranchBoard,
    pub(crate) runners: HashMap<BranchId, NodeRun>,
}

impl BranchSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Detach a suspended forked runner for a node call, avoiding an
    /// aliased borrow of the set. Reattach with `park` if still running.
    pub(crate) fn detach(&mut self, branch: BranchId) -> Option<NodeRun> {
        self.runners.remove(&branch)
    }

    pub(crate) fn park(&mut self, branch: BranchId, runner: NodeRun) {
        self.runners.insert(branch, runner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_rejects_live_branch_id() {
        let mut board = BranchBoard::new();
        assert!(board.reserve(BranchId::new(1)));
        assert!(!board.reserve(BranchId::new(1)));
    }

    #[test]
    fn test_reserve_allows_reuse_after_completion() {
        let mut board = BranchBoard::new();
        assert!(board.reserve(BranchId::new(1)));
        board.record_done(BranchId::new(1), Outcome::Success);
        assert!(board.reserve(BranchId::new(1)));
    }

    #[test]
    fn test_done_status_outlives_completion_queue() {
        let mut board = BranchBoard::new();
        board.reserve(BranchId::new(2));
        board.record_done(BranchId::new(2), Outcome::Failed);
        assert_eq!(
            board.take_completion(),
            Some((BranchId::new(2), Outcome::Failed))
        );
        assert_eq!(
            board.status(BranchId::new(2)),
            Some(BranchStatus::Done(Outcome::Failed))
        );
    }

    #[test]
    fn test_pending_registration_and_matching() {
        let mut board = BranchBoard::new();
        let ev = EventType::from("e1");
        board.add_pending(BranchId::MAIN, ev.clone());
        board.add_pending(BranchId::new(1), ev.clone());
        assert_eq!(
            board.matching_branches(&ev),
            vec![BranchId::MAIN, BranchId::new(1)]
        );

        board.remove_pending(BranchId::MAIN, &ev);
        assert_eq!(board.matching_branches(&ev), vec![BranchId::new(1)]);
        board.remove_pending(BranchId::new(1), &ev);
        assert!(!board.has_pending());
        assert!(board.matching_branches(&ev).is_empty());
    }
}
