//! Session commands: `login`, `logout`, `whoami`.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sleuth_core::config::ClientConfig;
use sleuth_core::session::{
    AccountInfo, ProfileState, ReputationStats, Session, SessionError, SessionStatus, WalletEvent,
};

use super::{build_store, open_store, print_json};

/// Printable view of a session. Never includes the token.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Connected wallet.
    pub wallet_address: Option<String>,
    /// Token expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Account record, when loaded.
    pub account: Option<AccountInfo>,
    /// Reputation counters, when loaded.
    pub reputation: Option<ReputationStats>,
    /// Why the profile is missing, when its fetch failed.
    pub profile_error: Option<String>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        let (account, reputation, profile_error) = match &session.profile {
            ProfileState::Absent => (None, None, None),
            ProfileState::Loaded(profile) => (
                Some(profile.account.clone()),
                profile.reputation.clone(),
                None,
            ),
            ProfileState::Unavailable { reason } => (None, None, Some(reason.clone())),
        };
        Self {
            status: session.status,
            wallet_address: session.wallet_address.clone(),
            expires_at: session.expires_at,
            account,
            reputation,
            profile_error,
        }
    }
}

impl SessionSummary {
    /// Human-readable lines.
    pub fn render(&self) -> Vec<String> {
        let mut lines = vec![format!("Status: {}", self.status)];
        if let Some(wallet) = &self.wallet_address {
            lines.push(format!("Wallet: {wallet}"));
        }
        if let Some(expires_at) = self.expires_at {
            lines.push(format!(
                "Token expires: {}",
                expires_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        if let Some(account) = &self.account {
            if let Some(created) = account.created_at_utc() {
                lines.push(format!("Member since: {}", created.format("%Y-%m-%d")));
            }
            lines.push(format!(
                "Reputation object: {}",
                if account.reputation_created { "created" } else { "pending" }
            ));
        }
        if let Some(reputation) = &self.reputation {
            lines.push(format!("Reputation points: {}", reputation.reputation_points));
            lines.push(format!("NFTs: {}", reputation.nft_count));
            lines.push(format!(
                "Accepted submissions: {}",
                reputation.submissions_accepted
            ));
        }
        if let Some(error) = &self.profile_error {
            lines.push(format!("Profile unavailable: {error}"));
        }
        lines
    }
}

fn print_summary(session: &Session, json: bool) -> Result<()> {
    let summary = SessionSummary::from(session);
    if json {
        return print_json(&summary);
    }
    for line in summary.render() {
        println!("{line}");
    }
    Ok(())
}

/// `sleuth login <wallet>`
pub async fn login(config: &ClientConfig, wallet: &str, json: bool) -> Result<()> {
    let wallet = wallet.trim();
    if wallet.is_empty() {
        bail!("wallet address must not be empty");
    }

    let store = open_store(config).await?;
    match store.handle_wallet_event(WalletEvent::connected(wallet)).await {
        Ok(()) => {},
        // Token issued, profile fetch failed: still signed in.
        Err(SessionError::Request(error)) if store.session().is_authenticated() => {
            tracing::warn!(error = %error, "signed in without profile");
        },
        Err(error) => return Err(error).context("login failed"),
    }

    print_summary(&store.session(), json)
}

/// `sleuth logout`
pub fn logout(config: &ClientConfig) -> Result<()> {
    let store = build_store(config)?;
    store.logout().context("failed to remove stored session")?;
    println!("Logged out");
    Ok(())
}

/// `sleuth whoami`
pub async fn whoami(config: &ClientConfig, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    print_summary(&store.session(), json)
}
