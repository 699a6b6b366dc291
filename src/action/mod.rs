//! Action abstraction module
//!
//! This module defines the static execution tree and its leaf contracts:
//! - SyncActivity: a leaf that resolves within the call
//! - AsyncActivity: a leaf that suspends until a matching event arrives
//! - Action: the tree node variants (Sync | Async | Sequential | Fork | Join)
//! - ActionTree: a validated, immutable tree shared across scheduler instances

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::TransactionContext;
use crate::event::Event;
use crate::types::{BranchId, EventType, Outcome};

/// Result of a leaf activity. Leaves resolve to success or failure only;
/// suspension is the scheduler's business, not the activity's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityOutcome {
    Success,
    Failed,
}

impl ActivityOutcome {
    pub(crate) fn outcome(self) -> Outcome {
        match self {
            ActivityOutcome::Success => Outcome::Success,
            ActivityOutcome::Failed => Outcome::Failed,
        }
    }
}

/// A synchronous unit of work. Resolves immediately when begun.
#[async_trait]
pub trait SyncActivity: Send + Sync {
    /// Activity name, used in logs.
    fn name(&self) -> &str;

    /// Perform the work. May read/write the shared working set.
    async fn exec(&self, ctx: &TransactionContext) -> ActivityOutcome;
}

/// An asynchronous unit of work. Suspends when begun and resolves when an
/// event of the expected type is delivered.
#[async_trait]
pub trait AsyncActivity: Send + Sync {
    /// Activity name, used in logs.
    fn name(&self) -> &str;

    /// The event type this activity resolves on.
    fn expected_event(&self) -> EventType;

    /// Side effect performed when the activity suspends, e.g. sending the
    /// outbound request the awaited event answers.
    async fn on_start(&self, _ctx: &TransactionContext) {}

    /// Consume the matching event and resolve.
    async fn on_event(&self, ctx: &TransactionContext, event: &Event) -> ActivityOutcome;

    /// Teardown hook, invoked when the activity is aborted while pending.
    async fn on_abort(&self, _ctx: &TransactionContext, _reason: Outcome) {}
}

/// A node in the static execution tree.
///
/// The tree is built once, validated into an [`ActionTree`], and never
/// mutated afterwards; all runtime state lives in the scheduler instance.
#[derive(Clone)]
pub enum Action {
    /// Leaf resolving within the call.
    Sync(Arc<dyn SyncActivity>),
    /// Leaf suspending until its expected event arrives.
    Async(Arc<dyn AsyncActivity>),
    /// Ordered children; fails fast, advances on success.
    Sequential(Vec<Action>),
    /// Opens a concurrent branch running `child` under `branch`.
    Fork { branch: BranchId, child: Box<Action> },
    /// Barrier joining every branch forked by the enclosing sequential
    /// scope, plus the continuation that reaches it.
    Join,
}

impl Action {
    /// Wrap a synchronous activity.
    pub fn sync(activity: impl SyncActivity + 'static) -> Self {
        Action::Sync(Arc::new(activity))
    }

    /// Wrap an asynchronous activity.
    pub fn asyn(activity: impl AsyncActivity + 'static) -> Self {
        Action::Async(Arc::new(activity))
    }

    /// Ordered sequence of child actions.
    pub fn sequence(children: Vec<Action>) -> Self {
        Action::Sequential(children)
    }

    /// Fork `child` as branch `branch`.
    pub fn fork(branch: impl Into<BranchId>, child: Action) -> Self {
        Action::Fork {
            branch: branch.into(),
            child: Box::new(child),
        }
    }

    /// Join barrier for the enclosing sequential scope.
    pub fn join() -> Self {
        Action::Join
    }

    fn describe(&self) -> &'static str {
        match self {
            Action::Sync(_) => "sync",
            Action::Async(_) => "async",
            Action::Sequential(_) => "sequential",
            Action::Fork { .. } => "fork",
            Action::Join => "join",
        }
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Sync(a) => f.debug_tuple("Sync").field(&a.name()).finish(),
            Action::Async(a) => f.debug_tuple("Async").field(&a.name()).finish(),
            Action::Sequential(children) => {
                f.debug_tuple("Sequential").field(children).finish()
            }
            Action::Fork { branch, child } => f
                .debug_struct("Fork")
                .field("branch", branch)
                .field("child", child)
                .finish(),
            Action::Join => f.write_str("Join"),
        }
    }
}

/// Construction-time tree validation errors.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("sequential node has no children")]
    EmptySequence,
    #[error("branch id {0} is forked more than once in the same scope")]
    DuplicateBranch(BranchId),
    #[error("branch id 0 is reserved for the main continuation")]
    ReservedBranch,
}

/// A validated, immutable action tree.
///
/// Cheap to clone; the definition may be shared across any number of
/// scheduler instances, each of which owns its own runtime state.
#[derive(Debug, Clone)]
pub struct ActionTree {
    root: Arc<Action>,
}

impl ActionTree {
    /// Validate and seal a tree definition.
    pub fn new(root: Action) -> Result<Self, TreeError> {
        validate(&root)?;
        Ok(Self {
            root: Arc::new(root),
        })
    }

    pub(crate) fn root(&self) -> &Action {
        &self.root
    }
}

fn validate(action: &Action) -> Result<(), TreeError> {
    match action {
        Action::Sync(_) | Action::Async(_) | Action::Join => Ok(()),
        Action::Fork { branch, child } => {
            if branch.is_main() {
                return Err(TreeError::ReservedBranch);
            }
            validate(child)
        }
        Action::Sequential(children) => {
            if children.is_empty() {
                return Err(TreeError::EmptySequence);
            }
            let mut seen = HashSet::new();
            for child in children {
                if let Action::Fork { branch, .. } = child {
                    if !seen.insert(*branch) {
                        return Err(TreeError::DuplicateBranch(*branch));
                    }
                }
                validate(child)?;
            }
            Ok(())
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}
