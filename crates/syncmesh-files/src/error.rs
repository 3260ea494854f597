//! File layer errors.
//!
//! # Error Code Convention
//!
//! All file layer errors use the `FILE_` prefix:
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`IllegalArgument`](FileError::IllegalArgument) | `FILE_ILLEGAL_ARGUMENT` | No |
//! | [`IllegalLocation`](FileError::IllegalLocation) | `FILE_ILLEGAL_LOCATION` | No |
//! | [`NotFound`](FileError::NotFound) | `FILE_NOT_FOUND` | No |
//! | [`NoSession`](FileError::NoSession) | `FILE_NO_SESSION` | Yes |
//! | [`NoPeerConnection`](FileError::NoPeerConnection) | `FILE_NO_PEER_CONNECTION` | Yes |
//! | [`Network`](FileError::Network) | `FILE_NETWORK` | Inherited |
//! | [`Codec`](FileError::Codec) | `FILE_CODEC` | No |
//! | [`Cipher`](FileError::Cipher) | `FILE_CIPHER` | No |
//! | [`Io`](FileError::Io) | `FILE_IO` | Yes |
//! | [`Internal`](FileError::Internal) | `FILE_INTERNAL` | No |
//!
//! Precondition errors (`IllegalArgument`, `IllegalLocation`,
//! `NotFound`, `NoSession`, `NoPeerConnection`) are raised
//! synchronously at the façade and never enter the process framework.
//! Everything else surfaces through a failed process as the rollback
//! reason's causal error.

use syncmesh_dht::DhtError;
use syncmesh_types::ErrorCode;
use thiserror::Error;

/// File layer error.
#[derive(Debug, Clone, Error)]
pub enum FileError {
    /// Null, nonexistent or wrong-kind argument.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// Path outside the synchronized root, or the root itself.
    #[error("illegal file location: {0}")]
    IllegalLocation(String),

    /// The file is not known (locally or in the profile).
    #[error("file not found: {0}")]
    NotFound(String),

    /// No user session is open.
    #[error("no session")]
    NoSession,

    /// The overlay is not reachable.
    #[error("no peer connection")]
    NoPeerConnection,

    /// An overlay operation failed.
    #[error("overlay: {0}")]
    Network(#[from] DhtError),

    /// A stored document could not be decoded.
    #[error("codec: {0}")]
    Codec(String),

    /// Chunk encryption or decryption failed.
    #[error("cipher: {0}")]
    Cipher(String),

    /// Local file system failure.
    #[error("io: {0}")]
    Io(String),

    /// Framework-level failure that should not occur in normal use.
    #[error("internal: {0}")]
    Internal(String),
}

impl From<std::io::Error> for FileError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for FileError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<syncmesh_process::ProcessError> for FileError {
    fn from(err: syncmesh_process::ProcessError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl ErrorCode for FileError {
    fn code(&self) -> &'static str {
        match self {
            Self::IllegalArgument(_) => "FILE_ILLEGAL_ARGUMENT",
            Self::IllegalLocation(_) => "FILE_ILLEGAL_LOCATION",
            Self::NotFound(_) => "FILE_NOT_FOUND",
            Self::NoSession => "FILE_NO_SESSION",
            Self::NoPeerConnection => "FILE_NO_PEER_CONNECTION",
            Self::Network(_) => "FILE_NETWORK",
            Self::Codec(_) => "FILE_CODEC",
            Self::Cipher(_) => "FILE_CIPHER",
            Self::Io(_) => "FILE_IO",
            Self::Internal(_) => "FILE_INTERNAL",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::NoSession | Self::NoPeerConnection | Self::Io(_) => true,
            Self::Network(inner) => inner.is_recoverable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncmesh_types::assert_error_codes;

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(
            &[
                FileError::IllegalArgument("x".into()),
                FileError::IllegalLocation("x".into()),
                FileError::NotFound("x".into()),
                FileError::NoSession,
                FileError::NoPeerConnection,
                FileError::Network(DhtError::Unreachable),
                FileError::Codec("x".into()),
                FileError::Cipher("x".into()),
                FileError::Io("x".into()),
                FileError::Internal("x".into()),
            ],
            "FILE_",
        );
    }

    #[test]
    fn network_recoverability_is_inherited() {
        assert!(FileError::Network(DhtError::Unreachable).is_recoverable());
        assert!(!FileError::Network(DhtError::Rejected("x".into())).is_recoverable());
    }

    #[test]
    fn io_errors_convert() {
        let err: FileError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.code(), "FILE_IO");
        assert!(err.to_string().contains("gone"));
    }
}
