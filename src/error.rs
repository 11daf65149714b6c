//! Session- and reconciliation-level errors (§7), layered above the
//! frame-level [`crate::codec::Error`].

use crate::codec;

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// The authority violated the protocol: wrong handshake, unexpected
    /// message kind, a site mismatch in `TargetPopulations`, or a decode
    /// failure on its side of the wire.
    #[error("authority protocol error: {0}")]
    AuthorityProtocolError(String),

    /// The authority answered a request with `Error(msg)`.
    #[error("authority refused: {0}")]
    AuthorityRefused(String),

    /// A `SiteVisit` carried the same species twice with different counts.
    #[error("conflicting counts for a species in the same site visit")]
    ConflictingCounts,

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

impl From<codec::Error> for CoordinatorError {
    fn from(err: codec::Error) -> Self {
        match err {
            codec::Error::Io(err) => CoordinatorError::IOError(err),
            other => CoordinatorError::AuthorityProtocolError(other.to_string()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for CoordinatorError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        CoordinatorError::AuthorityProtocolError("authority request timed out".to_string())
    }
}
