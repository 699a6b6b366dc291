//! Runtime action tree
//!
//! `NodeRun` is the per-instance runtime counterpart of the immutable
//! [`Action`](crate::action::Action) definition. Nodes make progress
//! through three recursive operations:
//! - `begin`: walk until the node resolves or suspends on an event
//! - `resolve`: deliver an event to the suspended leaf and fold upward
//! - `branch_done`: fold a forked branch completion into a waiting join
//!
//! A `Fork` node begins its child eagerly as an independent branch runner:
//! the child runs to its first suspension point before the enclosing
//! sequence continues, then parks on the branch set until an event of its
//! expected type arrives.

use std::sync::Arc;

use crate::action::{Action, AsyncActivity, SyncActivity};
use crate::context::TransactionContext;
use crate::event::Event;
use crate::types::{BranchId, EventType, Outcome};

use super::branch::{BranchSet, BranchStatus};

/// Per-call scope: the opaque external context plus the branch being run.
#[derive(Clone, Copy)]
pub(crate) struct ExecScope<'a> {
    pub(crate) ctx: &'a TransactionContext,
    pub(crate) branch: BranchId,
}

impl<'a> ExecScope<'a> {
    pub(crate) fn new(ctx: &'a TransactionContext, branch: BranchId) -> Self {
        Self { ctx, branch }
    }

    fn on(&self, branch: BranchId) -> Self {
        Self {
            ctx: self.ctx,
            branch,
        }
    }
}

pub(crate) enum NodeRun {
    Sync(SyncRun),
    Async(AsyncRun),
    Sequential(SequentialRun),
    Fork(ForkRun),
    Join(JoinRun),
}

pub(crate) struct SyncRun {
    activity: Arc<dyn SyncActivity>,
}

pub(crate) struct AsyncRun {
    activity: Arc<dyn AsyncActivity>,
    expected: EventType,
    waiting: bool,
}

pub(crate) struct SequentialRun {
    children: Vec<NodeRun>,
    index: usize,
    /// Branch ids forked by this scope since it began, in fork order.
    forked: Vec<BranchId>,
}

pub(crate) struct ForkRun {
    branch: BranchId,
    /// Definition instantiated into a branch runner when the fork begins.
    child: Action,
}

pub(crate) struct JoinRun {
    waiting: Vec<BranchId>,
    any_failed: bool,
    active: bool,
}

impl NodeRun {
    /// Build the runtime tree for one scheduler instance.
    pub(crate) fn instantiate(def: &Action) -> Self {
        match def {
            Action::Sync(activity) => NodeRun::Sync(SyncRun {
                activity: Arc::clone(activity),
            }),
            Action::Async(activity) => NodeRun::Async(AsyncRun {
                expected: activity.expected_event(),
                activity: Arc::clone(activity),
                waiting: false,
            }),
            Action::Sequential(children) => NodeRun::Sequential(SequentialRun {
                children: children.iter().map(NodeRun::instantiate).collect(),
                index: 0,
                forked: Vec::new(),
            }),
            Action::Fork { branch, child } => NodeRun::Fork(ForkRun {
                branch: *branch,
                child: (**child).clone(),
            }),
            Action::Join => NodeRun::Join(JoinRun {
                waiting: Vec::new(),
                any_failed: false,
                active: false,
            }),
        }
    }

    /// Attempt initial progress. Returns `Success`/`Failed` for resolved
    /// nodes, `StillRunning` for suspension, `ProgrammerError` on a
    /// contract breach (fork of a live branch id).
    pub(crate) async fn begin(&mut self, scope: ExecScope<'_>, set: &mut BranchSet) -> Outcome {
        match self {
            NodeRun::Sync(run) => {
                let out = run.activity.exec(scope.ctx).await.outcome();
                tracing::debug!(
                    transaction_id = %scope.ctx.transaction_id,
                    branch = %scope.branch,
                    activity = run.activity.name(),
                    outcome = %out,
                    "sync activity resolved"
                );
                out
            }
            NodeRun::Async(run) => {
                run.activity.on_start(scope.ctx).await;
                run.waiting = true;
                set.board.add_pending(scope.branch, run.expected.clone());
                tracing::debug!(
                    transaction_id = %scope.ctx.transaction_id,
                    branch = %scope.branch,
                    activity = run.activity.name(),
                    event_type = %run.expected,
                    "async activity suspended"
                );
                Outcome::StillRunning
            }
            NodeRun::Sequential(run) => run.run_from(scope, set).await,
            NodeRun::Fork(run) => run.begin(scope, set).await,
            NodeRun::Join(run) => {
                run.active = true;
                run.evaluate()
            }
        }
    }

    /// Deliver an event to the suspended leaf under this node. A non-match
    /// returns `UnknownEvent` and changes nothing.
    pub(crate) async fn resolve(
        &mut self,
        scope: ExecScope<'_>,
        event: &Event,
        set: &mut BranchSet,
    ) -> Outcome {
        match self {
            NodeRun::Async(run) => {
                if !run.waiting || event.event_type() != &run.expected {
                    return Outcome::UnknownEvent;
                }
                let out = run.activity.on_event(scope.ctx, event).await.outcome();
                run.waiting = false;
                set.board.remove_pending(scope.branch, &run.expected);
                tracing::debug!(
                    transaction_id = %scope.ctx.transaction_id,
                    branch = %scope.branch,
                    activity = run.activity.name(),
                    event_type = %run.expected,
                    outcome = %out,
                    "async activity resolved"
                );
                out
            }
            NodeRun::Sequential(run) => run.resolve_current(scope, event, set).await,
            // Sync never suspends; Fork children run on their own branch;
            // Join resolves on branch completions, not events.
            NodeRun::Sync(_) | NodeRun::Fork(_) | NodeRun::Join(_) => Outcome::UnknownEvent,
        }
    }

    /// Fold a forked branch completion into a join waiting under this
    /// node. `None` means no active join consumed the completion.
    pub(crate) async fn branch_done(
        &mut self,
        scope: ExecScope<'_>,
        done: BranchId,
        outcome: Outcome,
        set: &mut BranchSet,
    ) -> Option<Outcome> {
        match self {
            NodeRun::Join(run) => run.fold(done, outcome),
            NodeRun::Sequential(run) => run.fold_branch_done(scope, done, outcome, set).await,
            NodeRun::Sync(_) | NodeRun::Async(_) | NodeRun::Fork(_) => None,
        }
    }

    /// Forcibly resolve this node and its active descendants. Forked
    /// branch runners are aborted by the dispatcher, not here.
    pub(crate) async fn abort(
        &mut self,
        scope: ExecScope<'_>,
        reason: Outcome,
        set: &mut BranchSet,
    ) {
        match self {
            NodeRun::Sync(_) | NodeRun::Fork(_) => {}
            NodeRun::Async(run) => {
                if run.waiting {
                    run.waiting = false;
                    set.board.remove_pending(scope.branch, &run.expected);
                    run.activity.on_abort(scope.ctx, reason).await;
                    tracing::debug!(
                        transaction_id = %scope.ctx.transaction_id,
                        branch = %scope.branch,
                        activity = run.activity.name(),
                        reason = %reason,
                        "async activity aborted"
                    );
                }
            }
            NodeRun::Sequential(run) => {
                if run.index < run.children.len() {
                    Box::pin(run.children[run.index].abort(scope, reason, set)).await;
                }
            }
            NodeRun::Join(run) => {
                run.active = false;
                run.waiting.clear();
            }
        }
    }
}

impl ForkRun {
    /// Begin the forked child as an independent branch. The child runs
    /// eagerly to its first suspension point; a child that resolves
    /// within the call is recorded on the board so a later join still
    /// counts it. The fork itself reports `StillRunning` for the branch.
    async fn begin(&mut self, scope: ExecScope<'_>, set: &mut BranchSet) -> Outcome {
        if !set.board.reserve(self.branch) {
            tracing::error!(
                transaction_id = %scope.ctx.transaction_id,
                branch = %self.branch,
                "fork of a live branch id"
            );
            return Outcome::ProgrammerError;
        }
        tracing::debug!(
            transaction_id = %scope.ctx.transaction_id,
            branch = %self.branch,
            "branch forked"
        );

        let mut runner = NodeRun::instantiate(&self.child);
        let out = Box::pin(runner.begin(scope.on(self.branch), set)).await;
        match out {
            Outcome::StillRunning => set.park(self.branch, runner),
            Outcome::ProgrammerError => return Outcome::ProgrammerError,
            resolved => set.board.record_done(self.branch, resolved),
        }
        Outcome::StillRunning
    }
}

impl SequentialRun {
    /// Advance through children from the current position until a child
    /// suspends, fails, or the sequence completes.
    async fn run_from(&mut self, scope: ExecScope<'_>, set: &mut BranchSet) -> Outcome {
        while self.index < self.children.len() {
            let fork_branch = match &self.children[self.index] {
                NodeRun::Fork(f) => Some(f.branch),
                _ => None,
            };
            // a join collects every branch this scope forked before it
            if let NodeRun::Join(join) = &mut self.children[self.index] {
                join.seed(&self.forked, set);
                self.forked.clear();
            }

            let out = Box::pin(self.children[self.index].begin(scope, set)).await;

            if let Some(branch) = fork_branch {
                // the fork reports StillRunning for the branch, but the
                // sequence itself continues immediately
                if out == Outcome::ProgrammerError {
                    return out;
                }
                self.forked.push(branch);
                self.index += 1;
                continue;
            }

            match out {
                Outcome::Success => self.index += 1,
                Outcome::StillRunning => return Outcome::StillRunning,
                other => return other,
            }
        }
        Outcome::Success
    }

    async fn resolve_current(
        &mut self,
        scope: ExecScope<'_>,
        event: &Event,
        set: &mut BranchSet,
    ) -> Outcome {
        if self.index >= self.children.len() {
            return Outcome::UnknownEvent;
        }
        let out = Box::pin(self.children[self.index].resolve(scope, event, set)).await;
        match out {
            Outcome::Success => {
                self.index += 1;
                self.run_from(scope, set).await
            }
            other => other,
        }
    }

    async fn fold_branch_done(
        &mut self,
        scope: ExecScope<'_>,
        done: BranchId,
        outcome: Outcome,
        set: &mut BranchSet,
    ) -> Option<Outcome> {
        if self.index >= self.children.len() {
            return None;
        }
        let folded =
            Box::pin(self.children[self.index].branch_done(scope, done, outcome, set)).await?;
        match folded {
            Outcome::Success => {
                self.index += 1;
                Some(self.run_from(scope, set).await)
            }
            other => Some(other),
        }
    }
}

impl JoinRun {
    /// Register the contributors this barrier waits on. Branches that
    /// already resolved are folded immediately from the board record.
    fn seed(&mut self, contributors: &[BranchId], set: &BranchSet) {
        for branch in contributors {
            match set.board.status(*branch) {
                Some(BranchStatus::Running) => self.waiting.push(*branch),
                Some(BranchStatus::Done(outcome)) => {
                    if outcome == Outcome::Failed {
                        self.any_failed = true;
                    }
                }
                None => {}
            }
        }
    }

    fn evaluate(&self) -> Outcome {
        if self.any_failed {
            return Outcome::Failed;
        }
        if self.waiting.is_empty() {
            Outcome::Success
        } else {
            Outcome::StillRunning
        }
    }

    /// Fold one live contributor completion. Fail-fast: the first failed
    /// contributor resolves the barrier.
    fn fold(&mut self, done: BranchId, outcome: Outcome) -> Option<Outcome> {
        if !self.active || !self.waiting.contains(&done) {
            return None;
        }
        self.waiting.retain(|b| *b != done);
        if outcome == Outcome::Failed {
            self.any_failed = true;
        }
        Some(self.evaluate())
    }
}
