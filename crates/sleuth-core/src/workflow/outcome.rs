//! Per-tool evaluation results.
//!
//! The evaluation fields are produced by a language model behind the
//! backend, so their types are not always what the schema promises: scores
//! may arrive as floats or numeric strings, free-text fields as lists. The
//! decoders here accept those shapes instead of failing the submission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::request::ToolKind;
use crate::request::RequestError;

/// Rank reported for tools that do not rank submissions.
pub const UNRANKED: &str = "Unranked";

/// On-chain record of an accepted synopsis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockchainTx {
    /// Transaction hash.
    #[serde(default)]
    pub hash: Option<String>,
    /// Transaction digest (the chain's name for the hash).
    #[serde(default)]
    pub tx_digest: Option<String>,
    /// Chain-side status.
    #[serde(default)]
    pub status: Option<String>,
}

impl BlockchainTx {
    /// Transaction identifier, whichever field carries it.
    #[must_use]
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref().or(self.tx_digest.as_deref())
    }
}

/// What the chain recorded for a valid synopsis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintReceipt {
    /// On-chain submission id.
    pub submission_id: Option<u64>,
    /// Whether an NFT was minted.
    pub nft_minted: bool,
    /// Submission time.
    pub timestamp: Option<DateTime<Utc>>,
    /// Transaction identifier.
    pub tx_hash: Option<String>,
}

/// Result of `POST /submit_submission/synopsis`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynopsisOutcome {
    /// Case identifier.
    #[serde(rename = "caseId", default)]
    pub case_id: u64,
    /// Submitting wallet.
    #[serde(default)]
    pub author: String,
    /// Clarity score, 0-10.
    #[serde(default, deserialize_with = "lenient_score")]
    pub clarity: u32,
    /// Plausibility score, 0-10.
    #[serde(default, deserialize_with = "lenient_score")]
    pub plausibility: u32,
    /// Consistency score, 0-10.
    #[serde(default, deserialize_with = "lenient_score")]
    pub consistency: u32,
    /// Relevance score, 0-10.
    #[serde(default, deserialize_with = "lenient_score")]
    pub relevance: u32,
    /// Content passed moderation.
    #[serde(default = "default_true")]
    pub is_safe: bool,
    /// Moderation or contradiction flag; empty when none.
    #[serde(default, deserialize_with = "lenient_text")]
    pub flag: String,
    /// Echo of the submitted theory.
    #[serde(default)]
    pub theory: String,
    /// Evaluator feedback.
    #[serde(default, deserialize_with = "lenient_text")]
    pub summary: String,
    /// Gold, Silver, Bronze or None.
    #[serde(default, deserialize_with = "lenient_text")]
    pub rank: String,
    /// Whether the synopsis met the acceptance bar.
    pub is_valid: bool,
    /// On-chain submission id.
    #[serde(default)]
    pub submission_id: Option<u64>,
    /// On-chain transaction.
    #[serde(default)]
    pub blockchain_tx: Option<BlockchainTx>,
    /// Whether an NFT was minted.
    #[serde(default)]
    pub nft_minted: bool,
    /// Unix seconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Whether reputation points were awarded.
    #[serde(default)]
    pub reputation_updated: bool,
}

impl SynopsisOutcome {
    /// Sum of the four scores.
    #[must_use]
    pub const fn total_score(&self) -> u32 {
        self.clarity
            .saturating_add(self.plausibility)
            .saturating_add(self.consistency)
            .saturating_add(self.relevance)
    }
}

/// Result of `POST /submit_submission/hypothesis`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypothesisOutcome {
    /// Submitting wallet.
    #[serde(default)]
    pub author: String,
    /// Likelihood score, 0-10.
    #[serde(default, deserialize_with = "lenient_score")]
    pub plausibility_assessment: u32,
    /// Counter-arguments.
    #[serde(default, deserialize_with = "lenient_list")]
    pub counterpoints: Vec<String>,
    /// Whether supporting evidence exists.
    #[serde(default, deserialize_with = "lenient_text")]
    pub evidence_match: String,
    /// Suggested next steps.
    #[serde(default, deserialize_with = "lenient_text")]
    pub suggest_further_investigation: String,
    /// Rank, when the backend supplies one.
    #[serde(default)]
    pub rank: Option<String>,
    /// Moderation flag, when the backend supplies one.
    #[serde(default)]
    pub flag: Option<String>,
}

/// Result of `POST /submit_submission/bias`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiasOutcome {
    /// Submitting wallet.
    #[serde(default)]
    pub author: String,
    /// Biases and fallacies found.
    #[serde(default, deserialize_with = "lenient_list")]
    pub detected_biases: Vec<String>,
    /// Objectivity score, 0-10.
    #[serde(default, deserialize_with = "lenient_score")]
    pub objectivity_score: u32,
    /// Prompts to rethink the theory.
    #[serde(default, deserialize_with = "lenient_list")]
    pub challenge_points: Vec<String>,
    /// How the biases could mislead.
    #[serde(default, deserialize_with = "lenient_text")]
    pub bias_impact_summary: String,
    /// Rank, when the backend supplies one.
    #[serde(default)]
    pub rank: Option<String>,
    /// Moderation flag, when the backend supplies one.
    #[serde(default)]
    pub flag: Option<String>,
}

/// Result of `POST /submit_submission/logic`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicOutcome {
    /// Submitting wallet.
    #[serde(default)]
    pub author: String,
    /// Contradictions or impossible events.
    #[serde(default, deserialize_with = "lenient_list")]
    pub inconsistencies: Vec<String>,
    /// Gaps in the reasoning.
    #[serde(default, deserialize_with = "lenient_list")]
    pub missing_links: Vec<String>,
    /// Chronology score, 0-10.
    #[serde(default, deserialize_with = "lenient_score")]
    pub timeline_validity: u32,
    /// Main timeline issues.
    #[serde(default, deserialize_with = "lenient_text")]
    pub conflict_summary: String,
    /// How to fix them.
    #[serde(default, deserialize_with = "lenient_text")]
    pub correction_suggestions: String,
    /// Rank, when the backend supplies one.
    #[serde(default)]
    pub rank: Option<String>,
    /// Moderation flag, when the backend supplies one.
    #[serde(default)]
    pub flag: Option<String>,
}

/// Evaluation result, one variant per tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tool", content = "result", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// Synopsis evaluation.
    Synopsis(SynopsisOutcome),
    /// Hypothesis critique.
    Hypothesis(HypothesisOutcome),
    /// Bias analysis.
    Bias(BiasOutcome),
    /// Logic verification.
    Logic(LogicOutcome),
}

impl SubmissionOutcome {
    /// Decodes a response body for `kind`.
    ///
    /// # Errors
    ///
    /// [`RequestError::InvalidResponse`] if the body does not fit the tool's
    /// result shape.
    pub fn from_value(kind: ToolKind, value: Value) -> Result<Self, RequestError> {
        let decoded = match kind {
            ToolKind::Synopsis => serde_json::from_value(value).map(Self::Synopsis),
            ToolKind::Hypothesis => serde_json::from_value(value).map(Self::Hypothesis),
            ToolKind::Bias => serde_json::from_value(value).map(Self::Bias),
            ToolKind::Logic => serde_json::from_value(value).map(Self::Logic),
        };
        decoded.map_err(|error| RequestError::InvalidResponse {
            message: format!("unexpected {kind} result: {error}"),
        })
    }

    /// Tool that produced this outcome.
    #[must_use]
    pub const fn kind(&self) -> ToolKind {
        match self {
            Self::Synopsis(_) => ToolKind::Synopsis,
            Self::Hypothesis(_) => ToolKind::Hypothesis,
            Self::Bias(_) => ToolKind::Bias,
            Self::Logic(_) => ToolKind::Logic,
        }
    }

    /// Rank label; [`UNRANKED`] when the tool gave none.
    #[must_use]
    pub fn rank(&self) -> &str {
        let rank = match self {
            Self::Synopsis(outcome) => Some(outcome.rank.as_str()),
            Self::Hypothesis(outcome) => outcome.rank.as_deref(),
            Self::Bias(outcome) => outcome.rank.as_deref(),
            Self::Logic(outcome) => outcome.rank.as_deref(),
        };
        rank.filter(|rank| !rank.trim().is_empty())
            .unwrap_or(UNRANKED)
    }

    /// Moderation flag, if any was raised.
    #[must_use]
    pub fn flag(&self) -> Option<&str> {
        let flag = match self {
            Self::Synopsis(outcome) => Some(outcome.flag.as_str()),
            Self::Hypothesis(outcome) => outcome.flag.as_deref(),
            Self::Bias(outcome) => outcome.flag.as_deref(),
            Self::Logic(outcome) => outcome.flag.as_deref(),
        };
        flag.map(str::trim).filter(|flag| !flag.is_empty())
    }

    /// Whether the backend accepted the submission. Only synopses can be
    /// refused; the other tools always produce feedback.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        match self {
            Self::Synopsis(outcome) => outcome.is_valid,
            Self::Hypothesis(_) | Self::Bias(_) | Self::Logic(_) => true,
        }
    }

    /// On-chain receipt of a valid synopsis.
    ///
    /// `None` for invalid synopses, for synopses the chain did not record,
    /// and for every other tool.
    #[must_use]
    pub fn mint_receipt(&self) -> Option<MintReceipt> {
        let Self::Synopsis(outcome) = self else {
            return None;
        };
        if !outcome.is_valid {
            return None;
        }
        let tx = outcome.blockchain_tx.as_ref()?;
        Some(MintReceipt {
            submission_id: outcome.submission_id,
            nft_minted: outcome.nft_minted,
            timestamp: outcome
                .timestamp
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            tx_hash: tx.hash().map(str::to_string),
        })
    }
}

const fn default_true() -> bool {
    true
}

fn lenient_score<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(score_of(&value))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(text_of(&value))
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .map(text_of)
            .filter(|item| !item.is_empty())
            .collect(),
        other => {
            let text = text_of(&other);
            if text.is_empty() { Vec::new() } else { vec![text] }
        },
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn score_of(value: &Value) -> u32 {
    let raw = match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => text.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if raw.is_finite() && raw > 0.0 {
        raw.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(text_of)
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_gold_synopsis_with_receipt() {
        let outcome = SubmissionOutcome::from_value(
            ToolKind::Synopsis,
            json!({
                "is_valid": true,
                "rank": "Gold",
                "submission_id": 12,
                "nft_minted": true,
                "timestamp": 1_735_689_600,
                "blockchain_tx": {"tx_digest": "9xYz", "status": "success"}
            }),
        )
        .unwrap();

        assert_eq!(outcome.rank(), "Gold");
        assert!(outcome.is_accepted());
        let receipt = outcome.mint_receipt().unwrap();
        assert_eq!(receipt.submission_id, Some(12));
        assert!(receipt.nft_minted);
        assert_eq!(receipt.tx_hash.as_deref(), Some("9xYz"));
        assert!(receipt.timestamp.is_some());
    }

    #[test]
    fn test_invalid_synopsis_has_no_receipt() {
        let outcome = SubmissionOutcome::from_value(
            ToolKind::Synopsis,
            json!({
                "is_valid": false,
                "rank": "None",
                "flag": "Suspect in two places at once",
                "clarity": 4, "plausibility": 3, "consistency": 2, "relevance": 5,
                "blockchain_tx": {"hash": "ignored"}
            }),
        )
        .unwrap();

        assert!(!outcome.is_accepted());
        assert!(outcome.mint_receipt().is_none());
        assert_eq!(outcome.flag(), Some("Suspect in two places at once"));
        let SubmissionOutcome::Synopsis(synopsis) = outcome else {
            panic!("expected synopsis");
        };
        assert_eq!(synopsis.total_score(), 14);
    }

    #[test]
    fn test_synopsis_requires_is_valid() {
        let err = SubmissionOutcome::from_value(ToolKind::Synopsis, json!({"rank": "Gold"}))
            .unwrap_err();
        assert!(matches!(err, RequestError::InvalidResponse { .. }));
    }

    #[test]
    fn test_empty_flag_is_none() {
        let outcome = SubmissionOutcome::from_value(
            ToolKind::Synopsis,
            json!({"is_valid": true, "flag": "  "}),
        )
        .unwrap();
        assert_eq!(outcome.flag(), None);
    }

    #[test]
    fn test_hypothesis_tolerates_loose_types() {
        let outcome = SubmissionOutcome::from_value(
            ToolKind::Hypothesis,
            json!({
                "author": "0xabc",
                "plausibility_assessment": "7.6",
                "counterpoints": "The tide was out",
                "evidence_match": ["footprints", "boat log"],
                "suggest_further_investigation": null
            }),
        )
        .unwrap();

        let SubmissionOutcome::Hypothesis(hypothesis) = &outcome else {
            panic!("expected hypothesis");
        };
        assert_eq!(hypothesis.plausibility_assessment, 8);
        assert_eq!(hypothesis.counterpoints, vec!["The tide was out"]);
        assert_eq!(hypothesis.evidence_match, "footprints; boat log");
        assert_eq!(hypothesis.suggest_further_investigation, "");
        assert_eq!(outcome.rank(), UNRANKED);
        assert!(outcome.mint_receipt().is_none());
    }

    #[test]
    fn test_logic_and_bias_defaults() {
        let logic = SubmissionOutcome::from_value(ToolKind::Logic, json!({})).unwrap();
        assert_eq!(logic.kind(), ToolKind::Logic);
        assert_eq!(logic.flag(), None);

        let bias = SubmissionOutcome::from_value(
            ToolKind::Bias,
            json!({"detected_biases": ["confirmation bias"], "objectivity_score": 6, "rank": "Silver"}),
        )
        .unwrap();
        assert_eq!(bias.rank(), "Silver");
    }

    #[test]
    fn test_score_of_clamps() {
        assert_eq!(score_of(&json!(-3)), 0);
        assert_eq!(score_of(&json!("n/a")), 0);
        assert_eq!(score_of(&json!(9.4)), 9);
    }
}
