//! Read access to recorded submissions.
//!
//! The backend reads submissions back from the chain. Its list endpoints
//! answer 404 when there is nothing to list; that is reported here as an
//! empty list rather than an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::request::{RequestClient, RequestError};

/// All submissions endpoint.
pub const ALL_SUBMISSIONS_PATH: &str = "/get_all_submissions";

/// Score total a synopsis needs to count as valid.
pub const VALID_SCORE_THRESHOLD: u32 = 30;

/// Errors from [`SubmissionQueries`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum QueryError {
    /// No submission has this id.
    #[error("submission {id} not found")]
    NotFound {
        /// Requested id.
        id: u64,
    },

    /// The backend call failed.
    #[error(transparent)]
    Request(#[from] RequestError),
}

/// A recorded synopsis submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Case identifier.
    #[serde(rename = "caseId")]
    pub case_id: u64,
    /// Submitting wallet.
    pub author: String,
    /// Clarity score.
    pub clarity: u32,
    /// Plausibility score.
    pub plausibility: u32,
    /// Consistency score.
    pub consistency: u32,
    /// Relevance score.
    pub relevance: u32,
    /// Content passed moderation.
    pub is_safe: bool,
    /// Moderation flag; empty when none.
    #[serde(default)]
    pub flag: String,
    /// Submitted theory.
    #[serde(default)]
    pub theory: String,
    /// Evaluator feedback.
    #[serde(default)]
    pub summary: String,
    /// Rank label.
    #[serde(default)]
    pub rank: String,
    /// Validity as reported by the backend.
    #[serde(default)]
    pub is_valid: bool,
    /// On-chain id.
    #[serde(default)]
    pub submission_id: Option<u64>,
    /// Unix seconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl Submission {
    /// Sum of the four scores.
    #[must_use]
    pub const fn total_score(&self) -> u32 {
        self.clarity
            .saturating_add(self.plausibility)
            .saturating_add(self.consistency)
            .saturating_add(self.relevance)
    }

    /// Whether the scores and moderation result meet the acceptance bar.
    #[must_use]
    pub const fn meets_threshold(&self) -> bool {
        self.is_safe && self.total_score() >= VALID_SCORE_THRESHOLD
    }

    /// Submission time.
    #[must_use]
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Queries over recorded submissions.
#[derive(Debug, Clone)]
pub struct SubmissionQueries {
    client: RequestClient,
}

impl SubmissionQueries {
    /// Creates a query handle over `client`.
    #[must_use]
    pub const fn new(client: RequestClient) -> Self {
        Self { client }
    }

    /// Every recorded submission.
    ///
    /// # Errors
    ///
    /// [`QueryError::Request`] if the call fails.
    pub async fn list_submissions(&self) -> Result<Vec<Submission>, QueryError> {
        self.list(ALL_SUBMISSIONS_PATH).await
    }

    /// Submissions for one case.
    ///
    /// # Errors
    ///
    /// [`QueryError::Request`] if the call fails.
    pub async fn list_submissions_for_case(
        &self,
        case_id: u64,
    ) -> Result<Vec<Submission>, QueryError> {
        self.list(&format!("{ALL_SUBMISSIONS_PATH}/case/{case_id}"))
            .await
    }

    /// Submissions by one author, compared case-insensitively.
    ///
    /// # Errors
    ///
    /// [`QueryError::Request`] if the call fails.
    pub async fn list_submissions_by_author(
        &self,
        author: &str,
    ) -> Result<Vec<Submission>, QueryError> {
        let mut submissions = self.list_submissions().await?;
        submissions.retain(|submission| submission.author.eq_ignore_ascii_case(author));
        Ok(submissions)
    }

    /// One submission.
    ///
    /// # Errors
    ///
    /// - [`QueryError::NotFound`] on a 404
    /// - [`QueryError::Request`] if the call otherwise fails
    pub async fn get_submission(&self, id: u64) -> Result<Submission, QueryError> {
        match self
            .client
            .get_json::<Submission>(&format!("/get_submission/{id}"))
            .await
        {
            Ok(submission) => Ok(submission),
            Err(error) if error.is_not_found() => Err(QueryError::NotFound { id }),
            Err(error) => Err(error.into()),
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<Submission>, QueryError> {
        match self.client.get_json::<Vec<Submission>>(path).await {
            Ok(submissions) => Ok(submissions),
            Err(error) if error.is_not_found() => {
                debug!(path, "no submissions");
                Ok(Vec::new())
            },
            Err(error) => Err(error.into()),
        }
    }
}
