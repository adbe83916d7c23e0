//! Error types for tessera-node.

use tessera_protocols::ResponseError;
use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in node operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Chain storage or structure error
    #[error(transparent)]
    Chain(#[from] tessera_chain::Error),

    /// Nucleus lookup, call or validation error
    #[error(transparent)]
    Nucleus(#[from] tessera_nucleus::Error),

    /// DHT replica error
    #[error(transparent)]
    Dht(#[from] tessera_dht::Error),

    /// Local framing or decode error
    #[error(transparent)]
    Protocol(#[from] tessera_protocols::Error),

    /// A peer answered with ERROR_RESPONSE
    #[error(transparent)]
    Response(ResponseError),

    /// A peer answered with something other than a response
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// Stream could not be opened
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request did not complete in time
    #[error("request to {0} timed out")]
    Timeout(String),

    /// The node is shutting down
    #[error("node closed")]
    Closed,

    /// Genesis was already performed
    #[error("chain already generated")]
    AlreadyGenerated,

    /// Cell was started twice
    #[error("cell already started")]
    AlreadyStarted,

    /// Transport identity differs from the agent
    #[error("transport peer {transport} does not match agent {agent}")]
    PeerMismatch { transport: String, agent: String },

    /// Commit attempted on a node that is not an author
    #[error("peer is not in author mode")]
    NotAuthor,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Downgrade to the error a remote caller sees.
    pub fn to_response_error(&self) -> ResponseError {
        match self {
            Self::Dht(e) => ResponseError::from(e),
            Self::Response(e) => e.clone(),
            Self::Nucleus(tessera_nucleus::Error::ValidationFailed(reason)) => {
                ResponseError::ValidationFailed(reason.clone())
            }
            other => ResponseError::Unknown(other.to_string()),
        }
    }
}

impl From<ResponseError> for Error {
    fn from(e: ResponseError) -> Self {
        Self::Response(e)
    }
}
