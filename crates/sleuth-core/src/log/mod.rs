//! Log hygiene helpers.
//!
//! Response bodies from the backend are logged at `debug` level when a call
//! is rejected. The authentication endpoint returns bearer tokens in its
//! body, so everything that reaches a log line goes through [`redact`]
//! first.

mod redact;

pub use redact::{SecretRedactor, redact, truncate_for_log};
