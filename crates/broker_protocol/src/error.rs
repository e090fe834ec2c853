//! Error kinds surfaced by the wire codec.

use thiserror::Error;

/// Failure modes for framing, encrypting, authenticating and parsing a
/// single wire message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The ciphertext failed to decrypt under the configured key (corrupt
    /// data, wrong key, or truncated frame).
    #[error("decryption failed")]
    Decryption,

    /// The decrypted bytes did not parse as the expected structured form.
    #[error("malformed message: {0}")]
    Format(String),

    /// The recomputed authentication tag did not match the one on the wire.
    #[error("authentication tag mismatch")]
    Auth,

    /// `type` did not match any recognized verb.
    #[error("unknown message type: {0}")]
    UnknownVerb(String),

    /// A required field for this verb was absent.
    #[error("missing required field `{field}` for `{verb}`")]
    MissingField { verb: &'static str, field: &'static str },

    /// A frame exceeded the single-read cap.
    #[error("frame of {size} bytes exceeds the {cap}-byte cap")]
    FrameTooLarge { size: usize, cap: usize },

    #[error("transport error")]
    Transport(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
