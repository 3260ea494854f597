//! DHT layer errors.
//!
//! # Error Code Convention
//!
//! All DHT errors use the `DHT_` prefix:
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`Rejected`](DhtError::Rejected) | `DHT_REJECTED` | No |
//! | [`SignatureInvalid`](DhtError::SignatureInvalid) | `DHT_SIGNATURE_INVALID` | No |
//! | [`NotFound`](DhtError::NotFound) | `DHT_NOT_FOUND` | No |
//! | [`Unreachable`](DhtError::Unreachable) | `DHT_UNREACHABLE` | Yes |
//! | [`Timeout`](DhtError::Timeout) | `DHT_TIMEOUT` | Yes |
//!
//! A rejected mutation leaves the stored value unchanged - peers
//! converge on the pre-existing entry.

use syncmesh_types::ErrorCode;
use thiserror::Error;

/// Error from the overlay or the protected-entry client.
#[derive(Debug, Clone, Error)]
pub enum DhtError {
    /// A mutation was refused by the receiver's protection check.
    ///
    /// The stored value is unchanged.
    ///
    /// **Not recoverable** - requires the right protection key.
    #[error("rejected by overlay: {0}")]
    Rejected(String),

    /// A stored entry failed signature verification on read.
    ///
    /// **Not recoverable** - the value is not trustworthy.
    #[error("signature verification failed")]
    SignatureInvalid,

    /// No entry exists at the requested address.
    ///
    /// **Not recoverable** by retry alone.
    #[error("entry not found")]
    NotFound,

    /// The overlay cannot be reached.
    ///
    /// **Recoverable** - transient connectivity.
    #[error("overlay unreachable")]
    Unreachable,

    /// An overlay operation timed out.
    ///
    /// **Recoverable** - transient.
    #[error("overlay operation timed out")]
    Timeout,
}

impl ErrorCode for DhtError {
    fn code(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "DHT_REJECTED",
            Self::SignatureInvalid => "DHT_SIGNATURE_INVALID",
            Self::NotFound => "DHT_NOT_FOUND",
            Self::Unreachable => "DHT_UNREACHABLE",
            Self::Timeout => "DHT_TIMEOUT",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unreachable | Self::Timeout)
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
                DhtError::Rejected("x".into()),
                DhtError::SignatureInvalid,
                DhtError::NotFound,
                DhtError::Unreachable,
                DhtError::Timeout,
            ],
            "DHT_",
        );
    }

    #[test]
    fn transient_errors_are_recoverable() {
        assert!(DhtError::Unreachable.is_recoverable());
        assert!(DhtError::Timeout.is_recoverable());
        assert!(!DhtError::Rejected("x".into()).is_recoverable());
        assert!(!DhtError::SignatureInvalid.is_recoverable());
    }
}
