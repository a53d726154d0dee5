//! Per-tool rendering of submission results.
//!
//! Presenters turn a [`SubmissionOutcome`] into plain text lines and pick the
//! notification shown when a submission settles. They hold no state.

use std::fmt;

use crate::query::Submission;
use crate::workflow::{NotificationKind, SubmissionOutcome};

/// Notification text for an accepted synopsis.
pub const SYNOPSIS_ACCEPTED: &str = "NFT Minted Successfully!";
/// Notification text for a refused synopsis.
pub const SYNOPSIS_REFUSED: &str = "Evaluation Invalid";
/// Notification text for a hypothesis critique.
pub const HYPOTHESIS_DONE: &str = "Hypothesis evaluation complete!";
/// Notification text for a bias analysis.
pub const BIAS_DONE: &str = "Bias analysis complete!";
/// Notification text for a logic verification.
pub const LOGIC_DONE: &str = "Logic analysis complete!";

/// Rendered result: a title and display lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    /// Heading.
    pub title: String,
    /// Body lines, in display order.
    pub lines: Vec<String>,
}

impl Presentation {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
        }
    }

    fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn rank_and_flag(&mut self, outcome: &SubmissionOutcome) {
        self.line(format!("Rank: {}", outcome.rank()));
        if let Some(flag) = outcome.flag() {
            self.line(format!("Flag: {flag}"));
        }
    }

    fn section(&mut self, heading: &str, items: &[String]) {
        if items.is_empty() {
            self.line(format!("{heading}: none"));
            return;
        }
        self.line(format!("{heading}:"));
        for item in items {
            self.line(format!("  - {item}"));
        }
    }
}

impl fmt::Display for Presentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Renders an outcome for display.
#[must_use]
pub fn present(outcome: &SubmissionOutcome) -> Presentation {
    match outcome {
        SubmissionOutcome::Synopsis(synopsis) => {
            let mut out = Presentation::new("Synopsis Evaluation");
            out.line(format!("Clarity: {}/10", synopsis.clarity));
            out.line(format!("Plausibility: {}/10", synopsis.plausibility));
            out.line(format!("Consistency: {}/10", synopsis.consistency));
            out.line(format!("Relevance: {}/10", synopsis.relevance));
            out.line(format!("AI Summary: {}", synopsis.summary));
            out.line(format!(
                "Validity: {}",
                if synopsis.is_valid { "Valid" } else { "Invalid" }
            ));
            out.line(format!(
                "Safety: {}",
                if synopsis.is_safe { "Safe" } else { "Unsafe" }
            ));
            out.rank_and_flag(outcome);
            if let Some(receipt) = outcome.mint_receipt() {
                out.line("Blockchain Transaction:");
                if let Some(id) = receipt.submission_id {
                    out.line(format!("  Submission ID: {id}"));
                }
                out.line(format!(
                    "  NFT Minted: {}",
                    if receipt.nft_minted { "Yes" } else { "No" }
                ));
                if let Some(timestamp) = receipt.timestamp {
                    out.line(format!("  Timestamp: {}", timestamp.format("%Y-%m-%d %H:%M:%S UTC")));
                }
                if let Some(hash) = receipt.tx_hash {
                    out.line(format!("  TX Hash: {hash}"));
                }
            }
            out
        },
        SubmissionOutcome::Hypothesis(hypothesis) => {
            let mut out = Presentation::new("Hypothesis Evaluation");
            out.line(format!(
                "Plausibility Assessment: {}/10",
                hypothesis.plausibility_assessment
            ));
            out.section("Counterpoints", &hypothesis.counterpoints);
            out.line(format!("Evidence Match: {}", hypothesis.evidence_match));
            out.line(format!(
                "Further Investigation: {}",
                hypothesis.suggest_further_investigation
            ));
            out.rank_and_flag(outcome);
            out
        },
        SubmissionOutcome::Bias(bias) => {
            let mut out = Presentation::new("Bias Analysis");
            out.section("Detected Biases", &bias.detected_biases);
            out.line(format!("Objectivity Score: {}/10", bias.objectivity_score));
            out.section("Challenge Points", &bias.challenge_points);
            out.line(format!("Bias Impact: {}", bias.bias_impact_summary));
            out.rank_and_flag(outcome);
            out
        },
        SubmissionOutcome::Logic(logic) => {
            let mut out = Presentation::new("Logic Analysis");
            out.section("Inconsistencies", &logic.inconsistencies);
            out.section("Missing Links", &logic.missing_links);
            out.line(format!("Timeline Validity: {}/10", logic.timeline_validity));
            out.line(format!("Conflict Summary: {}", logic.conflict_summary));
            out.line(format!("Suggested Corrections: {}", logic.correction_suggestions));
            out.rank_and_flag(outcome);
            out
        },
    }
}

/// Renders a stored submission.
#[must_use]
pub fn present_submission(submission: &Submission) -> Presentation {
    let title = submission.submission_id.map_or_else(
        || format!("Submission for case {}", submission.case_id),
        |id| format!("Submission #{id} for case {}", submission.case_id),
    );
    let mut out = Presentation::new(title);
    out.line(format!("Author: {}", submission.author));
    out.line(format!("Rank: {}", submission.rank));
    out.line(format!(
        "Score: {}/40 (clarity {}, plausibility {}, consistency {}, relevance {})",
        submission.total_score(),
        submission.clarity,
        submission.plausibility,
        submission.consistency,
        submission.relevance
    ));
    out.line(format!(
        "Status: {}",
        if submission.is_valid { "Valid" } else { "Invalid" }
    ));
    if !submission.flag.trim().is_empty() {
        out.line(format!("Flag: {}", submission.flag));
    }
    if let Some(submitted) = submission.submitted_at() {
        out.line(format!("Submitted: {}", submitted.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    out.line(format!("Theory: {}", submission.theory));
    out.line(format!("Summary: {}", submission.summary));
    out
}

/// Notification raised when `outcome` arrives.
#[must_use]
pub fn notification_for(outcome: &SubmissionOutcome) -> (NotificationKind, &'static str) {
    match outcome {
        SubmissionOutcome::Synopsis(synopsis) if synopsis.is_valid => {
            (NotificationKind::Success, SYNOPSIS_ACCEPTED)
        },
        SubmissionOutcome::Synopsis(_) => (NotificationKind::Error, SYNOPSIS_REFUSED),
        SubmissionOutcome::Hypothesis(_) => (NotificationKind::Success, HYPOTHESIS_DONE),
        SubmissionOutcome::Bias(_) => (NotificationKind::Success, BIAS_DONE),
        SubmissionOutcome::Logic(_) => (NotificationKind::Success, LOGIC_DONE),
    }
}

/// Notification raised when a submission fails with `message`.
#[must_use]
pub fn failure_notification(message: &str) -> (NotificationKind, String) {
    (NotificationKind::Error, format!("Submission Error: {message}"))
}
