//! Submission form and tool selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::engine::PreconditionViolation;
use crate::catalog::Case;

/// Analysis tool a submission is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Scored synopsis; valid ones are recorded on chain.
    Synopsis,
    /// Hypothesis critique.
    Hypothesis,
    /// Bias detection.
    Bias,
    /// Timeline and logic verification.
    Logic,
}

impl ToolKind {
    /// Every tool, in display order.
    pub const ALL: [Self; 4] = [Self::Synopsis, Self::Hypothesis, Self::Bias, Self::Logic];

    /// Lower-case tool name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Synopsis => "synopsis",
            Self::Hypothesis => "hypothesis",
            Self::Bias => "bias",
            Self::Logic => "logic",
        }
    }

    /// Submission endpoint.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Synopsis => "/submit_submission/synopsis",
            Self::Hypothesis => "/submit_submission/hypothesis",
            Self::Bias => "/submit_submission/bias",
            Self::Logic => "/submit_submission/logic",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a [`ToolKind`] name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool '{0}' (expected synopsis, hypothesis, bias or logic)")]
pub struct UnknownTool(pub String);

impl FromStr for ToolKind {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownTool(s.to_string()))
    }
}

/// The form posted to a submission endpoint.
///
/// Serialized as `{"caseId": .., "case": .., "theory": ..}`. Built once and
/// never modified; validation happens in
/// [`SubmissionWorkflow::submit`](super::SubmissionWorkflow::submit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    #[serde(rename = "caseId")]
    case_id: u64,
    #[serde(rename = "case")]
    case_description: String,
    theory: String,
}

impl SubmissionRequest {
    /// Builds a form.
    #[must_use]
    pub fn new(
        case_id: u64,
        case_description: impl Into<String>,
        theory: impl Into<String>,
    ) -> Self {
        Self {
            case_id,
            case_description: case_description.into(),
            theory: theory.into(),
        }
    }

    /// Builds a form for a catalog case, using its description as case text.
    #[must_use]
    pub fn for_case(case: &Case, theory: impl Into<String>) -> Self {
        Self::new(case.id, case.description.clone(), theory)
    }

    /// Case identifier.
    #[must_use]
    pub const fn case_id(&self) -> u64 {
        self.case_id
    }

    /// Case text the theory is evaluated against.
    #[must_use]
    pub fn case_description(&self) -> &str {
        &self.case_description
    }

    /// The user's analysis.
    #[must_use]
    pub fn theory(&self) -> &str {
        &self.theory
    }

    /// Checks the form locally.
    ///
    /// # Errors
    ///
    /// [`PreconditionViolation::EmptyTheory`] if the theory is blank.
    pub fn validate(&self) -> Result<(), PreconditionViolation> {
        if self.theory.trim().is_empty() {
            return Err(PreconditionViolation::EmptyTheory);
        }
        Ok(())
    }
}
