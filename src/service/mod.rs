//! Transports that reach a Flipt backend.
//!
//! A [`Service`] knows how to fetch flag metadata and request an evaluation from exactly one
//! backend instance. Transport-specific error encodings (HTTP error bodies, gRPC status codes) are
//! translated into [`Error`] here, so the provider never inspects them.
use async_trait::async_trait;

use crate::{
    call::CallContext,
    context::{self, FlattenedContext, REQUEST_ID_KEY},
    models::{EvaluationRequest, EvaluationResponse, Flag},
    Error, Result,
};

pub mod http;
pub mod rpc;

pub use self::http::HttpService;
pub use self::rpc::RpcService;

/// Namespace used when a flag identifier carries none.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Contract every backend transport fulfils.
///
/// Implementations must report a missing flag as [`Error::FlagNotFound`], a context without a
/// targeting key as [`Error::TargetingKeyMissing`], and must abort in-flight requests when `cx`
/// is cancelled or expires.
#[async_trait]
pub trait Service: Send + Sync {
    /// Fetch metadata of `flag_key` in `namespace_key`.
    async fn get_flag(&self, cx: &CallContext, namespace_key: &str, flag_key: &str)
        -> Result<Flag>;

    /// Ask the backend to evaluate `flag_key` for the entity described by `evaluation_context`.
    async fn evaluate(
        &self,
        cx: &CallContext,
        namespace_key: &str,
        flag_key: &str,
        evaluation_context: &FlattenedContext,
    ) -> Result<EvaluationResponse>;
}

impl EvaluationRequest {
    /// Build the backend's flat request out of a loosely-typed context.
    ///
    /// Every context entry is stringified and forwarded; `targetingKey` also becomes the entity id
    /// and `requestID` the request id.
    pub fn from_context(
        namespace_key: &str,
        flag_key: &str,
        evaluation_context: &FlattenedContext,
    ) -> Result<Self> {
        let entity_id =
            context::targeting_key(evaluation_context).ok_or(Error::TargetingKeyMissing)?;
        let context = context::stringify(evaluation_context);
        let request_id = context.get(REQUEST_ID_KEY).cloned().unwrap_or_default();

        Ok(EvaluationRequest {
            request_id,
            flag_key: flag_key.to_owned(),
            entity_id,
            context,
            namespace_key: namespace_key.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        context::{FlattenedContext, REQUEST_ID_KEY, TARGETING_KEY},
        models::EvaluationRequest,
        Error,
    };

    #[test]
    fn request_from_context_maps_reserved_keys() {
        let context: FlattenedContext = [
            (TARGETING_KEY.to_owned(), "123456789".into()),
            (REQUEST_ID_KEY.to_owned(), "987654321".into()),
            ("plan".to_owned(), "pro".into()),
        ]
        .into_iter()
        .collect();

        let request = EvaluationRequest::from_context("foo-namespace", "foo", &context).unwrap();

        assert_eq!(request.entity_id, "123456789");
        assert_eq!(request.request_id, "987654321");
        assert_eq!(request.flag_key, "foo");
        assert_eq!(request.namespace_key, "foo-namespace");
        assert_eq!(request.context.len(), 3);
        assert_eq!(request.context[TARGETING_KEY], "123456789");
        assert_eq!(request.context["plan"], "pro");
    }

    #[test]
    fn request_id_is_optional() {
        let context: FlattenedContext = [(TARGETING_KEY.to_owned(), "entity".into())]
            .into_iter()
            .collect();

        let request = EvaluationRequest::from_context("default", "foo", &context).unwrap();
        assert_eq!(request.request_id, "");
    }

    #[test]
    fn missing_targeting_key_is_rejected() {
        let context: FlattenedContext = [("plan".to_owned(), "pro".into())].into_iter().collect();

        let err = EvaluationRequest::from_context("default", "foo", &context).unwrap_err();
        assert!(matches!(err, Error::TargetingKeyMissing));
    }
}
