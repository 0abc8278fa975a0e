//! Error taxonomy for upload orchestration
//!
//! Every phase failure maps to exactly one of these kinds. The whole
//! batch aborts on the first failure; the only graceful degradation is
//! a missing content-type tag during result resolution, which is
//! reported as an absent classification rather than an error.

/// Errors surfaced by the upload pipeline and its boundaries
#[derive(Debug, Clone, thiserror::Error)]
pub enum UploadError {
    /// Empty batch, empty identifier, or empty payload
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Registration ticket out of bounds (epochs, owner address)
    #[error("invalid ticket: {0}")]
    InvalidTicket(String),

    /// The user declined the signature request
    #[error("signature request rejected by user")]
    UserRejected,

    /// No wallet connected or the signer is unreachable
    #[error("signer unavailable: {0}")]
    SignerUnavailable(String),

    /// A phase was invoked out of order
    #[error("not ready: {0}")]
    NotReady(String),

    /// A storage node or the publisher refused the upload
    #[error("upload rejected: {0}")]
    UploadRejected(String),

    /// Transient network failure or timeout
    #[error("network error: {0}")]
    NetworkError(String),

    /// Malformed publisher or bundle response
    #[error("unexpected response format: {0}")]
    UnexpectedResponseFormat(String),
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, UploadError>;
