use crate::SessionId;
use tryst_net_codec::CodecError;

/// Errors ending a session, or raised when talking to one.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Framing or I/O failure on the stream.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The session is gone or no longer accepts input.
    #[error("session {0} is closed")]
    Closed(SessionId),

    /// A session loop ended without reporting, i.e. it panicked.
    #[error("session loop aborted")]
    Aborted,
}
