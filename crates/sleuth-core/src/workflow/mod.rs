//! Generic submission workflow.
//!
//! Every analysis tool follows the same cycle: post a
//! [`SubmissionRequest`] to the tool's endpoint, wait for the AI evaluation,
//! and hand a [`SubmissionOutcome`] to a presenter. [`SubmissionWorkflow`]
//! runs that cycle once per instance, parameterized by [`ToolKind`].

mod engine;
mod notification;
mod outcome;
mod request;

pub use engine::{
    CANCELLED_MESSAGE, PreconditionViolation, SubmissionWorkflow, WorkflowError, WorkflowState,
};
pub use notification::{Notification, NotificationKind};
pub use outcome::{
    BiasOutcome, BlockchainTx, HypothesisOutcome, LogicOutcome, MintReceipt, SubmissionOutcome,
    SynopsisOutcome, UNRANKED,
};
pub use request::{SubmissionRequest, ToolKind, UnknownTool};
