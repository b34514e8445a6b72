//! Errors surfaced by the hub at configuration time.
//!
//! Delivery itself never fails from the producer's point of view: handler
//! faults are contained by the dispatcher and unknown unsubscribes are
//! no-ops. Only misconfiguration reaches the caller.

/// Errors returned by hub and configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// A subscription was requested on a hub that has already been disposed.
    #[error("event hub has been disposed")]
    Disposed,
    /// The configuration file could not be read, parsed or written.
    #[error("configuration error: {0}")]
    Config(String),
}
