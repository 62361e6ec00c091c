use std::path::PathBuf;

use crate::evaluation::{ErrorCode, ResolutionError};

/// Represents a result type for operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors returned by services and provider construction.
///
/// Only [`Error::FlagNotFound`], [`Error::InvalidContext`] and [`Error::TargetingKeyMissing`]
/// carry a specific classification. Everything else resolves as [`ErrorCode::General`].
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The backend reported that the flag does not exist.
    #[error("flag {flag_key:?} not found")]
    FlagNotFound {
        /// Key of the missing flag.
        flag_key: String,
    },

    /// Evaluation context is absent.
    #[error("evaluation context is missing")]
    InvalidContext,

    /// Evaluation context has no non-empty targeting key.
    #[error("targetingKey is missing")]
    TargetingKeyMissing,

    /// Configured address is not a valid URL.
    #[error("invalid address {address:?}")]
    InvalidAddress {
        /// The rejected address.
        address: String,
        /// Why the address was rejected.
        #[source]
        source: url::ParseError,
    },

    /// Configured address uses a scheme no transport handles.
    #[error("unsupported address scheme {0:?}")]
    UnsupportedScheme(String),

    /// Configured address cannot be used as a gRPC endpoint.
    #[error("invalid gRPC endpoint")]
    InvalidEndpoint(#[source] tonic::transport::Error),

    /// The TLS certificate could not be read.
    #[error("reading certificate {path:?}")]
    Certificate {
        /// Path the certificate was read from.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP request could not be sent.
    #[error("making request: {0}")]
    Request(#[source] reqwest::Error),

    /// The response body could not be read.
    #[error("reading response body: {0}")]
    ReadBody(#[source] reqwest::Error),

    /// The response body is not valid JSON for the expected entity.
    #[error("unmarshalling response body: {0}")]
    Decode(#[source] serde_json::Error),

    /// The backend answered with a status that is neither success nor a recognized not-found.
    #[error("{operation}: status={status} {body}")]
    #[allow(missing_docs)]
    UnexpectedStatus {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The gRPC channel could not be established.
    #[error("connecting: {0}")]
    Connect(#[source] tonic::transport::Error),

    /// The gRPC call failed with a non-classified status.
    #[error("{operation}: code = {code:?} desc = {message}")]
    #[allow(missing_docs)]
    Rpc {
        operation: &'static str,
        code: tonic::Code,
        message: String,
    },

    /// The call was cancelled by the caller.
    #[error("request cancelled")]
    Cancelled,

    /// The call did not complete before its deadline.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    /// Classification of this error at the evaluation API level.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::FlagNotFound { .. } => ErrorCode::FlagNotFound,
            Error::InvalidContext => ErrorCode::InvalidContext,
            Error::TargetingKeyMissing => ErrorCode::TargetingKeyMissing,
            _ => ErrorCode::General,
        }
    }

    /// Convert into the error reported alongside a resolved default value.
    pub fn to_resolution_error(&self) -> ResolutionError {
        ResolutionError::new(self.code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::evaluation::ErrorCode;

    use super::Error;

    #[test]
    fn classified_errors_keep_their_code() {
        let err = Error::FlagNotFound {
            flag_key: "foo".to_owned(),
        };
        assert_eq!(err.code(), ErrorCode::FlagNotFound);
        assert_eq!(err.to_string(), r#"flag "foo" not found"#);

        assert_eq!(Error::InvalidContext.code(), ErrorCode::InvalidContext);
        assert_eq!(
            Error::TargetingKeyMissing.code(),
            ErrorCode::TargetingKeyMissing
        );
    }

    #[test]
    fn transport_errors_are_general() {
        let err = Error::UnexpectedStatus {
            operation: "getting flag",
            status: 500,
            body: "internal error".to_owned(),
        };
        let resolution = err.to_resolution_error();
        assert_eq!(resolution.code, ErrorCode::General);
        assert_eq!(resolution.message, "getting flag: status=500 internal error");

        assert_eq!(Error::Cancelled.code(), ErrorCode::General);
        assert_eq!(
            Error::Rpc {
                operation: "evaluating",
                code: tonic::Code::Internal,
                message: "internal error".to_owned(),
            }
            .to_string(),
            "evaluating: code = Internal desc = internal error"
        );
    }
}
