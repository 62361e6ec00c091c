//! The flag-evaluation API implemented by [`Provider`](crate::Provider).
//!
//! These types mirror the shape a generic evaluation SDK expects from a provider: one entry point
//! per value type, each returning a [`ResolutionDetail`] that always carries a usable value.
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{call::CallContext, context::FlattenedContext};

/// Why a value was resolved the way it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    /// The caller-supplied default was returned.
    Default,
    /// The flag is disabled in the backend.
    Disabled,
    /// The backend matched the evaluation context against the flag's rules.
    TargetingMatch,
    /// The value could not be resolved.
    Error,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Reason::Default => "DEFAULT",
            Reason::Disabled => "DISABLED",
            Reason::TargetingMatch => "TARGETING_MATCH",
            Reason::Error => "ERROR",
        })
    }
}

/// Classification of a resolution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The flag does not exist in the backend.
    FlagNotFound,
    /// The evaluation context is absent.
    InvalidContext,
    /// The evaluation context has no non-empty `targetingKey`.
    TargetingKeyMissing,
    /// The backend value cannot be converted to the requested type.
    TypeMismatch,
    /// Any other failure: transport, decoding, unexpected backend response, cancellation.
    General,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorCode::FlagNotFound => "FLAG_NOT_FOUND",
            ErrorCode::InvalidContext => "INVALID_CONTEXT",
            ErrorCode::TargetingKeyMissing => "TARGETING_KEY_MISSING",
            ErrorCode::TypeMismatch => "TYPE_MISMATCH",
            ErrorCode::General => "GENERAL",
        })
    }
}

/// A classified error attached to a [`ResolutionDetail`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ResolutionError {
    /// Error classification.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
}

impl ResolutionError {
    /// Create a new error with the given classification.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ResolutionError {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TypeMismatch, message)
    }
}

/// Result of resolving a flag to a value of type `T`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionDetail<T> {
    /// Resolved value. Equals the caller-supplied default whenever resolution did not succeed.
    pub value: T,
    /// Why this value was returned.
    pub reason: Reason,
    /// Raw variant value reported by the backend, when one matched.
    pub variant: Option<String>,
    /// Set when resolution failed.
    pub error: Option<ResolutionError>,
}

impl<T> ResolutionDetail<T> {
    pub(crate) fn new(value: T, reason: Reason) -> Self {
        ResolutionDetail {
            value,
            reason,
            variant: None,
            error: None,
        }
    }

    pub(crate) fn failed(value: T, reason: Reason, error: ResolutionError) -> Self {
        ResolutionDetail {
            value,
            reason,
            variant: None,
            error: Some(error),
        }
    }

    pub(crate) fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// Classification of the error, if resolution failed.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|err| err.code)
    }
}

/// Static description of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Provider name reported to the SDK.
    pub name: String,
}

/// The evaluation surface a flag SDK calls into.
///
/// Every method returns a detail carrying `default_value` when the flag could not be resolved, so
/// callers can always use `detail.value`. Passing `None` as the evaluation context resolves with
/// [`ErrorCode::InvalidContext`].
#[async_trait]
pub trait FeatureProvider: Send + Sync {
    /// Describe this provider.
    fn metadata(&self) -> ProviderMetadata;

    /// Resolve a boolean flag.
    async fn boolean_evaluation(
        &self,
        cx: &CallContext,
        flag: &str,
        default_value: bool,
        evaluation_context: Option<&FlattenedContext>,
    ) -> ResolutionDetail<bool>;

    /// Resolve a string flag.
    async fn string_evaluation(
        &self,
        cx: &CallContext,
        flag: &str,
        default_value: String,
        evaluation_context: Option<&FlattenedContext>,
    ) -> ResolutionDetail<String>;

    /// Resolve a floating point flag.
    async fn float_evaluation(
        &self,
        cx: &CallContext,
        flag: &str,
        default_value: f64,
        evaluation_context: Option<&FlattenedContext>,
    ) -> ResolutionDetail<f64>;

    /// Resolve an integer flag.
    async fn int_evaluation(
        &self,
        cx: &CallContext,
        flag: &str,
        default_value: i64,
        evaluation_context: Option<&FlattenedContext>,
    ) -> ResolutionDetail<i64>;

    /// Resolve a structured flag from the variant attachment.
    async fn object_evaluation(
        &self,
        cx: &CallContext,
        flag: &str,
        default_value: serde_json::Value,
        evaluation_context: Option<&FlattenedContext>,
    ) -> ResolutionDetail<serde_json::Value>;
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, Reason, ResolutionDetail, ResolutionError};

    #[test]
    fn resolution_error_display_includes_code() {
        let err = ResolutionError::new(ErrorCode::FlagNotFound, r#"flag "foo" not found"#);
        assert_eq!(err.to_string(), r#"FLAG_NOT_FOUND: flag "foo" not found"#);
    }

    #[test]
    fn reason_serializes_as_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&Reason::TargetingMatch).unwrap(),
            r#""TARGETING_MATCH""#
        );
        assert_eq!(Reason::Disabled.to_string(), "DISABLED");
    }

    #[test]
    fn error_code_is_exposed_on_detail() {
        let detail = ResolutionDetail::failed(
            false,
            Reason::Default,
            ResolutionError::type_mismatch("value is not a boolean"),
        );
        assert_eq!(detail.error_code(), Some(ErrorCode::TypeMismatch));
        assert_eq!(ResolutionDetail::new(1, Reason::Default).error_code(), None);
    }
}
