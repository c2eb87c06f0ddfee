//! Error taxonomy for the link layer.
//!
//! Every failure mode resolves locally into a state transition; none of
//! these variants is fatal to the collaborator. Cancellation of a worker
//! is not an error and never appears here.

use std::io;
use thiserror::Error;

/// Errors raised at the transport boundary or inside a session.
#[derive(Error, Debug)]
pub enum LinkError {
    /// The listening endpoint could not be created. Fatal to that
    /// listener instance; reported, not retried automatically.
    #[error("Failed to bind listening endpoint: {0}")]
    Bind(#[source] io::Error),

    /// An accept call failed for a reason other than endpoint closure.
    #[error("Failed to accept inbound connection: {0}")]
    Accept(#[source] io::Error),

    /// A single outbound connect attempt failed. Recovered by falling
    /// back to listening; the same peer is never redialed automatically.
    #[error("Dial failed: {0}")]
    Dial(#[source] io::Error),

    /// The session stream broke while reading.
    #[error("Session read failed: {0}")]
    Read(#[source] io::Error),

    /// The session stream broke while writing. Reported but non-fatal;
    /// the session stays up until a read observes the breakage.
    #[error("Session write failed: {0}")]
    Write(#[source] io::Error),
}

impl LinkError {
    /// The underlying I/O error kind, for callers that branch on it.
    pub fn io_kind(&self) -> io::ErrorKind {
        match self {
            LinkError::Bind(e)
            | LinkError::Accept(e)
            | LinkError::Dial(e)
            | LinkError::Read(e)
            | LinkError::Write(e) => e.kind(),
        }
    }
}
