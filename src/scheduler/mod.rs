//! Scheduler module
//!
//! The dispatcher drives one transaction attempt over an immutable action
//! tree. It is responsible for:
//! - Lifecycle enforcement (`NotStarted -> Running -> Terminated`)
//! - Event routing into suspended branches via the pending set
//! - Folding forked branch completions into waiting join barriers
//! - Atomic teardown on `stop` / `kill`
//!
//! All entry points are invoked sequentially by the owning caller; the
//! scheduler performs no spawning or locking of its own. "Fork" is
//! logical concurrency: multiple suspension points tracked at once.

mod branch;
mod node;

use std::mem;

use crate::action::ActionTree;
use crate::context::TransactionContext;
use crate::event::Event;
use crate::types::{BranchId, Lifecycle, Outcome};

use branch::BranchSet;
use node::{ExecScope, NodeRun};

/// Drives one transaction attempt to completion.
///
/// Created per attempt from a shared [`ActionTree`] and discarded once
/// `Terminated`. Every operation returns an [`Outcome`]; operations
/// invalid for the current lifecycle return `Outcome::ProgrammerError`
/// and change nothing.
pub struct TransactionScheduler {
    lifecycle: Lifecycle,
    main: NodeRun,
    set: BranchSet,
    final_outcome: Option<Outcome>,
}

impl TransactionScheduler {
    /// Create a scheduler instance over a shared tree definition.
    pub fn new(tree: &ActionTree) -> Self {
        Self {
            lifecycle: Lifecycle::NotStarted,
            main: NodeRun::instantiate(tree.root()),
            set: BranchSet::new(),
            final_outcome: None,
        }
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// The recorded final outcome, once terminated.
    pub fn outcome(&self) -> Option<Outcome> {
        self.final_outcome
    }

    /// Begin the transaction. Valid only from `NotStarted`.
    ///
    /// Returns `Success`/`Failed` when the tree resolves synchronously,
    /// `StillRunning` when suspended on pending events.
    pub async fn start(&mut self, ctx: &TransactionContext) -> Outcome {
        if self.lifecycle != Lifecycle::NotStarted {
            tracing::warn!(
                transaction_id = %ctx.transaction_id,
                lifecycle = %self.lifecycle,
                "start rejected: scheduler already started"
            );
            return Outcome::ProgrammerError;
        }
        self.lifecycle = Lifecycle::Running;
        self.set.board.reserve(BranchId::MAIN);
        tracing::info!(transaction_id = %ctx.transaction_id, "transaction started");

        let scope = ExecScope::new(ctx, BranchId::MAIN);
        let out = self.main.begin(scope, &mut self.set).await;
        let out = self.settle(ctx, out).await;
        self.conclude(ctx, out).await
    }

    /// Deliver an event. Valid only from `Running`.
    ///
    /// An event matching no pending leaf returns `UnknownEvent` and
    /// leaves the instance fully usable; the correct event can still be
    /// delivered afterwards.
    pub async fn handle_event(&mut self, ctx: &TransactionContext, event: &Event) -> Outcome {
        if self.lifecycle != Lifecycle::Running {
            tracing::warn!(
                transaction_id = %ctx.transaction_id,
                lifecycle = %self.lifecycle,
                event_type = %event.event_type(),
                "event rejected: scheduler not running"
            );
            return Outcome::ProgrammerError;
        }

        let targets = self.set.board.matching_branches(event.event_type());
        if targets.is_empty() {
            tracing::debug!(
                transaction_id = %ctx.transaction_id,
                event_type = %event.event_type(),
                "unknown event ignored"
            );
            return Outcome::UnknownEvent;
        }

        let mut main_out = Outcome::StillRunning;
        for branch in targets {
            if branch.is_main() {
                let scope = ExecScope::new(ctx, branch);
                let out = self.main.resolve(scope, event, &mut self.set).await;
                if out != Outcome::UnknownEvent {
                    main_out = out;
                }
            } else if let Some(mut runner) = self.set.detach(branch) {
                let scope = ExecScope::new(ctx, branch);
                let out = runner.resolve(scope, event, &mut self.set).await;
                match out {
                    Outcome::Success | Outcome::Failed => {
                        tracing::debug!(
                            transaction_id = %ctx.transaction_id,
                            branch = %branch,
                            outcome = %out,
                            "branch resolved"
                        );
                        self.set.board.record_done(branch, out);
                    }
                    Outcome::ProgrammerError => {
                        main_out = Outcome::ProgrammerError;
                        self.set.park(branch, runner);
                    }
                    _ => self.set.park(branch, runner),
                }
            }
            if main_out != Outcome::StillRunning {
                break;
            }
        }

        let out = self.settle(ctx, main_out).await;
        self.conclude(ctx, out).await
    }

    /// Force-stop the transaction. Valid only from `Running`. Aborts
    /// every pending node atomically and returns `ForceStopped`.
    pub async fn stop(&mut self, ctx: &TransactionContext, reason: Outcome) -> Outcome {
        if self.lifecycle != Lifecycle::Running {
            tracing::warn!(
                transaction_id = %ctx.transaction_id,
                lifecycle = %self.lifecycle,
                "stop rejected: scheduler not running"
            );
            return Outcome::ProgrammerError;
        }
        tracing::info!(
            transaction_id = %ctx.transaction_id,
            reason = %reason,
            "transaction force stopped"
        );
        self.teardown(ctx, reason).await;
        self.lifecycle = Lifecycle::Terminated;
        self.final_outcome = Some(Outcome::ForceStopped);
        Outcome::ForceStopped
    }

    /// Unconditional teardown. Returns no outcome; after a kill every
    /// operation reports `ProgrammerError`. Killing an instance that is
    /// not running is logged and ignored.
    pub async fn kill(&mut self, ctx: &TransactionContext, reason: Outcome) {
        if self.lifecycle != Lifecycle::Running {
            tracing::warn!(
                transaction_id = %ctx.transaction_id,
                lifecycle = %self.lifecycle,
                "kill ignored: scheduler not running"
            );
            return;
        }
        tracing::info!(
            transaction_id = %ctx.transaction_id,
            reason = %reason,
            "transaction killed"
        );
        self.teardown(ctx, reason).await;
        self.lifecycle = Lifecycle::Terminated;
        self.final_outcome = Some(Outcome::ForceStopped);
    }

    /// Drain queued branch completions, folding each into whichever
    /// active join is waiting on it. Unconsumed completions are dropped;
    /// their status record remains for joins that begin later.
    async fn settle(&mut self, ctx: &TransactionContext, mut main_out: Outcome) -> Outcome {
        while let Some((done, outcome)) = self.set.board.take_completion() {
            if main_out == Outcome::ProgrammerError {
                break;
            }

            if main_out == Outcome::StillRunning {
                let scope = ExecScope::new(ctx, BranchId::MAIN);
                if let Some(folded) = self
                    .main
                    .branch_done(scope, done, outcome, &mut self.set)
                    .await
                {
                    main_out = folded;
                    continue;
                }
            }

            // joins inside forked branches
            let branches: Vec<BranchId> = self.set.runners.keys().copied().collect();
            for branch in branches {
                let Some(mut runner) = self.set.detach(branch) else {
                    continue;
                };
                let scope = ExecScope::new(ctx, branch);
                match runner.branch_done(scope, done, outcome, &mut self.set).await {
                    Some(out) if out.is_resolved() => self.set.board.record_done(branch, out),
                    Some(Outcome::ProgrammerError) => {
                        main_out = Outcome::ProgrammerError;
                        self.set.park(branch, runner);
                    }
                    _ => self.set.park(branch, runner),
                }
            }
        }
        main_out
    }

    /// Apply a folded root outcome: terminal results move the instance to
    /// `Terminated` and abort any straggling branches.
    async fn conclude(&mut self, ctx: &TransactionContext, out: Outcome) -> Outcome {
        match out {
            Outcome::Success | Outcome::Failed => {
                self.teardown(ctx, Outcome::ForceStopped).await;
                self.lifecycle = Lifecycle::Terminated;
                self.final_outcome = Some(out);
                tracing::info!(
                    transaction_id = %ctx.transaction_id,
                    outcome = %out,
                    "transaction resolved"
                );
                out
            }
            Outcome::ProgrammerError => {
                self.teardown(ctx, Outcome::ForceStopped).await;
                self.lifecycle = Lifecycle::Terminated;
                self.final_outcome = Some(out);
                tracing::error!(
                    transaction_id = %ctx.transaction_id,
                    "transaction torn down after contract violation"
                );
                out
            }
            other => {
                tracing::debug!(
                    transaction_id = %ctx.transaction_id,
                    outcome = %other,
                    "transaction suspended"
                );
                other
            }
        }
    }

    /// Abort the main continuation and every parked branch runner, then
    /// clear the pending set. No partial abort state is observable.
    async fn teardown(&mut self, ctx: &TransactionContext, reason: Outcome) {
        let scope = ExecScope::new(ctx, BranchId::MAIN);
        self.main.abort(scope, reason, &mut self.set).await;

        let mut runners = mem::take(&mut self.set.runners);
        for (branch, mut runner) in runners.drain() {
            let scope = ExecScope::new(ctx, branch);
            runner.abort(scope, reason, &mut self.set).await;
        }
        self.set.board.clear();
    }
}
