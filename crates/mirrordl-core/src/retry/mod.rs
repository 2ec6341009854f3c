//! Failure classification and backoff between rounds over the mirror set.
//!
//! The fetcher never retries inside one attempt; a chooser uses this module to
//! decide whether a failed round over all mirrors is worth repeating.

mod classify;
mod policy;

pub use classify::classify;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
