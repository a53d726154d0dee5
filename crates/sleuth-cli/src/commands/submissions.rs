//! `sleuth submissions` - browse recorded submissions.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use sleuth_core::config::ClientConfig;
use sleuth_core::presenter;
use sleuth_core::query::{Submission, SubmissionQueries};

use super::{build_store, print_json};

/// Submission query subcommands.
#[derive(Subcommand, Debug)]
pub enum SubmissionsCommand {
    /// List recorded submissions
    List {
        /// Only submissions for this case
        #[arg(long = "case")]
        case_id: Option<u64>,

        /// Only submissions by the signed-in wallet
        #[arg(long)]
        mine: bool,
    },

    /// Show one submission
    Show {
        /// Submission id
        id: u64,
    },
}

/// Runs a submissions subcommand.
pub async fn run(config: &ClientConfig, cmd: &SubmissionsCommand, json: bool) -> Result<()> {
    let store = build_store(config)?;
    let queries = SubmissionQueries::new(store.client());

    match cmd {
        SubmissionsCommand::List { case_id, mine } => {
            let submissions = if *mine {
                let Some(wallet) = store.session().wallet_address else {
                    bail!("--mine needs a signed-in wallet; run `sleuth login <wallet>` first");
                };
                let mut own = queries.list_submissions_by_author(&wallet).await?;
                if let Some(case_id) = case_id {
                    own.retain(|submission| submission.case_id == *case_id);
                }
                own
            } else if let Some(case_id) = case_id {
                queries.list_submissions_for_case(*case_id).await?
            } else {
                queries.list_submissions().await?
            };

            if json {
                return print_json(&submissions);
            }
            if submissions.is_empty() {
                println!("No submissions");
            }
            for submission in &submissions {
                println!("{}", list_line(submission));
            }
        },
        SubmissionsCommand::Show { id } => {
            let submission = queries
                .get_submission(*id)
                .await
                .with_context(|| format!("failed to fetch submission {id}"))?;
            if json {
                return print_json(&submission);
            }
            print!("{}", presenter::present_submission(&submission));
        },
    }
    Ok(())
}

fn list_line(submission: &Submission) -> String {
    let id = submission
        .submission_id
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    format!(
        "{id:>5}  case {:<4} {:<8} {:>3}/40  {}",
        submission.case_id,
        submission.rank,
        submission.total_score(),
        submission.author
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_list_line() {
        let submission: Submission = serde_json::from_value(json!({
            "caseId": 3,
            "author": "0xabc",
            "clarity": 9, "plausibility": 8, "consistency": 8, "relevance": 9,
            "is_safe": true,
            "rank": "Gold",
            "is_valid": true,
            "submission_id": 21
        }))
        .unwrap();

        assert_eq!(
            list_line(&submission),
            "   21  case 3    Gold      34/40  0xabc"
        );
    }
}
