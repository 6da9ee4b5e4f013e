//! Error types for the discovery server.
//!
//! The per-stream loop returns the first fatal error as the RPC status.
//! Transport failures are split into expected terminations (peer closed,
//! context cancelled), which end the stream silently, and unexpected ones,
//! which are logged and propagated.

use helmsman_model::{BoxError, NodeError};
use tonic::{Code, Status};

/// Fatal error raised inside a discovery stream.
#[derive(Debug, thiserror::Error)]
pub enum AdsError {
    /// The first request carried no usable node identity.
    #[error("missing node information")]
    MissingNode,

    /// The node identity could not be parsed.
    #[error(transparent)]
    InvalidNode(#[from] NodeError),

    /// A generator failed while computing a payload.
    #[error("generator failure for {type_url}: {source}")]
    Generator {
        /// Type URL the generator was invoked for.
        type_url: String,
        /// The underlying generator error.
        source: BoxError,
    },

    /// The transport failed while sending or receiving.
    #[error(transparent)]
    Transport(#[from] Status),
}

impl From<AdsError> for Status {
    fn from(err: AdsError) -> Self {
        match err {
            AdsError::MissingNode => Status::invalid_argument("missing node information"),
            AdsError::InvalidNode(e) => Status::invalid_argument(e.to_string()),
            AdsError::Generator { .. } => Status::internal(err.to_string()),
            AdsError::Transport(status) => status,
        }
    }
}

/// Whether a transport error is an ordinary stream termination rather than a
/// failure worth surfacing.
pub fn is_expected_termination(status: &Status) -> bool {
    match status.code() {
        Code::Cancelled | Code::DeadlineExceeded => true,
        Code::Unavailable => {
            let message = status.message();
            message.contains("client disconnected")
                || message.contains("transport is closing")
                || message.contains("connection reset")
                || message.contains("broken pipe")
        }
        _ => false,
    }
}
