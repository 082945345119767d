//! Progress reporting for feed retrieval.
//!
//! [`ProgressCallback`] keeps the pagination driver independent of how
//! progress is shown. The CLI plugs in an `indicatif` spinner; tests and
//! library callers use [`NullProgress`].

/// Receives progress updates while pages are fetched.
pub trait ProgressCallback: Send + Sync {
    /// Advance by `delta` features.
    fn inc(&self, delta: u64);

    /// Update the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Mark the work as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

