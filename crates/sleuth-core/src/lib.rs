//! # sleuth-core
//!
//! Client core for the sleuth case platform: a wallet-gated session
//! lifecycle, a single outbound request gateway, and a generic workflow
//! engine for submitting case analyses to the AI evaluation backend.
//!
//! ## Components
//!
//! - [`request::RequestClient`]: the only outbound HTTP gateway. Attaches the
//!   current session credential to every call and normalizes transport
//!   failures into [`request::RequestError`].
//! - [`session::SessionStore`]: owns the process-wide [`session::Session`].
//!   Reconciles the external wallet signal with the backend-issued token and
//!   publishes every transition to subscribers.
//! - [`workflow::SubmissionWorkflow`]: one state machine per tool invocation
//!   (`Idle -> Submitting -> Succeeded | Failed`).
//! - [`presenter`]: per-tool formatting of outcomes and notifications.
//!
//! ## Data Flow
//!
//! ```text
//! WalletEvent ──► SessionStore ──watch──► SessionView
//!                     │                     │
//!                     ▼                     ▼
//!               RequestClient ◄──── SubmissionWorkflow ──► presenter
//!                     │
//!                     ▼
//!                 Transport (reqwest | mock)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use sleuth_core::config::ClientConfig;
//! use sleuth_core::session::{MemoryTokenStorage, SessionStore, WalletEvent};
//! use sleuth_core::transport::ReqwestTransport;
//! use sleuth_core::workflow::{SubmissionRequest, SubmissionWorkflow, ToolKind};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::default();
//! let transport = Arc::new(ReqwestTransport::new(config.request_timeout())?);
//! let store = SessionStore::new(
//!     &config,
//!     transport,
//!     Arc::new(MemoryTokenStorage::new()),
//! );
//!
//! store
//!     .handle_wallet_event(WalletEvent::connected("0xabc"))
//!     .await?;
//!
//! let workflow = SubmissionWorkflow::new(ToolKind::Synopsis, store.client(), store.view());
//! let request = SubmissionRequest::new(3, "The case text", "My theory");
//! let outcome = workflow.submit(request).await?;
//! println!("rank: {}", outcome.rank());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod config;
pub mod log;
pub mod presenter;
pub mod query;
pub mod request;
pub mod session;
pub mod transport;
pub mod workflow;

pub use catalog::{Case, CaseCatalog, CatalogError};
pub use config::{ClientConfig, ConfigError};
pub use request::{RequestClient, RequestError};
pub use session::{Session, SessionStatus, SessionStore, SessionView, WalletEvent};
pub use workflow::{SubmissionOutcome, SubmissionRequest, SubmissionWorkflow, ToolKind};
