use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    call::CallContext,
    context::{self, FlattenedContext},
    evaluation::{FeatureProvider, ProviderMetadata, Reason, ResolutionDetail, ResolutionError},
    models::EvaluationResponse,
    service::{Service, DEFAULT_NAMESPACE},
    Error, ProviderConfig, Result,
};

/// Name reported by [`Provider::metadata`].
pub const PROVIDER_NAME: &str = "flipt-provider";

/// Resolves flags against a Flipt backend.
///
/// Every evaluation fetches the flag first and only asks the backend to evaluate it if the flag is
/// enabled. Nothing is cached between calls, and failures are never retried.
///
/// # Examples
/// ```no_run
/// # use flipt_provider::{CallContext, FeatureProvider, FlattenedContext, ProviderConfig};
/// # async fn run() -> flipt_provider::Result<()> {
/// let provider = ProviderConfig::new()
///     .address("http://localhost:8080")
///     .to_provider()?;
///
/// let context = FlattenedContext::from([("targetingKey".to_owned(), "user-1".into())]);
/// let detail = provider
///     .boolean_evaluation(&CallContext::new(), "new-checkout", false, Some(&context))
///     .await;
/// println!("{} ({})", detail.value, detail.reason);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Provider {
    service: Arc<dyn Service>,
}

impl Provider {
    /// Create a provider resolving flags through `service`.
    pub fn new(service: impl Service + 'static) -> Self {
        Self::from_shared(Arc::new(service))
    }

    pub(crate) fn from_shared(service: Arc<dyn Service>) -> Self {
        Provider { service }
    }

    /// Create a provider from `config`, choosing the transport by address scheme.
    ///
    /// # Errors
    ///
    /// See [`ProviderConfig::to_provider`].
    pub fn from_config(config: ProviderConfig) -> Result<Self> {
        config.to_provider()
    }

    /// Run the shared get-flag/evaluate protocol and hand a matched response to `coerce`.
    async fn resolve<T>(
        &self,
        cx: &CallContext,
        flag: &str,
        default_value: T,
        evaluation_context: Option<&FlattenedContext>,
        coerce: impl FnOnce(EvaluationResponse, T) -> ResolutionDetail<T>,
    ) -> ResolutionDetail<T> {
        let (namespace_key, flag_key) = split_namespace_and_flag(flag);

        let Some(evaluation_context) = evaluation_context else {
            return self.failed(flag, default_value, &Error::InvalidContext);
        };
        if context::targeting_key(evaluation_context).is_none() {
            return self.failed(flag, default_value, &Error::TargetingKeyMissing);
        }

        let flag_meta = match self.service.get_flag(cx, namespace_key, flag_key).await {
            Ok(flag_meta) => flag_meta,
            Err(err) => return self.failed(flag, default_value, &err),
        };

        if !flag_meta.enabled {
            log::debug!(target: "flipt", flag_key, namespace_key; "flag is disabled");
            return ResolutionDetail::new(default_value, Reason::Disabled);
        }

        let response = match self
            .service
            .evaluate(cx, namespace_key, flag_key, evaluation_context)
            .await
        {
            Ok(response) => response,
            Err(err) => return self.failed(flag, default_value, &err),
        };

        if !response.matched {
            return ResolutionDetail::new(default_value, Reason::Default);
        }

        let detail = coerce(response, default_value);
        log::trace!(target: "flipt",
                    flag_key,
                    namespace_key,
                    reason:serde = detail.reason,
                    variant:serde = detail.variant;
                    "evaluated a flag");
        detail
    }

    fn failed<T>(&self, flag: &str, default_value: T, err: &Error) -> ResolutionDetail<T> {
        log::warn!(target: "flipt", flag; "error occurred while evaluating a flag: {}", err);
        ResolutionDetail::failed(default_value, Reason::Default, err.to_resolution_error())
    }
}

#[async_trait]
impl FeatureProvider for Provider {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: PROVIDER_NAME.to_owned(),
        }
    }

    async fn boolean_evaluation(
        &self,
        cx: &CallContext,
        flag: &str,
        default_value: bool,
        evaluation_context: Option<&FlattenedContext>,
    ) -> ResolutionDetail<bool> {
        self.resolve(cx, flag, default_value, evaluation_context, coerce_bool)
            .await
    }

    async fn string_evaluation(
        &self,
        cx: &CallContext,
        flag: &str,
        default_value: String,
        evaluation_context: Option<&FlattenedContext>,
    ) -> ResolutionDetail<String> {
        self.resolve(cx, flag, default_value, evaluation_context, |response, _| {
            ResolutionDetail::new(response.value, Reason::TargetingMatch)
        })
        .await
    }

    async fn float_evaluation(
        &self,
        cx: &CallContext,
        flag: &str,
        default_value: f64,
        evaluation_context: Option<&FlattenedContext>,
    ) -> ResolutionDetail<f64> {
        self.resolve(cx, flag, default_value, evaluation_context, |response, default| {
            coerce_number(response, default, parse_float, "value is not a float")
        })
        .await
    }

    async fn int_evaluation(
        &self,
        cx: &CallContext,
        flag: &str,
        default_value: i64,
        evaluation_context: Option<&FlattenedContext>,
    ) -> ResolutionDetail<i64> {
        self.resolve(cx, flag, default_value, evaluation_context, |response, default| {
            coerce_number(response, default, |raw| raw.parse::<i64>().ok(), "value is not an integer")
        })
        .await
    }

    async fn object_evaluation(
        &self,
        cx: &CallContext,
        flag: &str,
        default_value: serde_json::Value,
        evaluation_context: Option<&FlattenedContext>,
    ) -> ResolutionDetail<serde_json::Value> {
        self.resolve(cx, flag, default_value, evaluation_context, coerce_object)
            .await
    }
}

/// Split `namespace/key` into its parts. Identifiers without a separator live in the default
/// namespace.
pub fn split_namespace_and_flag(flag: &str) -> (&str, &str) {
    flag.split_once('/').unwrap_or((DEFAULT_NAMESPACE, flag))
}

/// A matched response without a value means "on" for boolean flags.
fn coerce_bool(response: EvaluationResponse, default_value: bool) -> ResolutionDetail<bool> {
    if response.value.is_empty() {
        return ResolutionDetail::new(true, Reason::Default);
    }

    match parse_bool(&response.value) {
        Some(value) => ResolutionDetail::new(value, Reason::TargetingMatch),
        None => ResolutionDetail::failed(
            default_value,
            Reason::Default,
            ResolutionError::type_mismatch("value is not a boolean"),
        ),
    }
}

/// Numeric mismatches report [`Reason::Error`], unlike boolean mismatches which report
/// [`Reason::Default`].
fn coerce_number<T>(
    response: EvaluationResponse,
    default_value: T,
    parse: impl FnOnce(&str) -> Option<T>,
    mismatch: &str,
) -> ResolutionDetail<T> {
    match parse(&response.value) {
        Some(value) => ResolutionDetail::new(value, Reason::TargetingMatch),
        None => ResolutionDetail::failed(
            default_value,
            Reason::Error,
            ResolutionError::type_mismatch(mismatch),
        ),
    }
}

fn coerce_object(
    response: EvaluationResponse,
    default_value: serde_json::Value,
) -> ResolutionDetail<serde_json::Value> {
    if response.attachment.is_empty() {
        return ResolutionDetail::new(default_value, Reason::Default).with_variant(response.value);
    }

    let parsed: serde_json::Result<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_str(&response.attachment);
    match parsed {
        Ok(object) => {
            ResolutionDetail::new(serde_json::Value::Object(object), Reason::TargetingMatch)
                .with_variant(response.value)
        }
        Err(_) => ResolutionDetail::failed(
            default_value,
            Reason::Error,
            ResolutionError::type_mismatch(format!(
                "value is not an object: {:?}",
                response.attachment
            )),
        ),
    }
}

/// Parses a float, rejecting magnitudes too large to represent. Explicit `inf` and `nan` literals
/// are accepted.
fn parse_float(value: &str) -> Option<f64> {
    let parsed: f64 = value.parse().ok()?;
    if parsed.is_infinite() && value.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(parsed)
}

/// Boolean literals as accepted by Flipt clients.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
