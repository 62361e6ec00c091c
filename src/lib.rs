//! A feature flag provider resolving flags against [Flipt](https://www.flipt.io).
//!
//! # Overview
//!
//! The crate revolves around a [`Provider`] implementing [`FeatureProvider`], the evaluation surface
//! flag SDKs call into. Each typed entry point takes a flag identifier (`key` or `namespace/key`),
//! a default value and an evaluation context, and returns a [`ResolutionDetail`] carrying the
//! resolved value, a [`Reason`] and, on failure, a classified [`ResolutionError`].
//!
//! For every call the provider fetches the flag from Flipt, returns early when it is disabled, and
//! otherwise asks Flipt to evaluate it for the context's `targetingKey`. The raw variant value is
//! then converted into the requested type.
//!
//! # Transports
//!
//! Flipt is reached through a [`Service`]. Two are provided: [`HttpService`] for the REST API and
//! [`RpcService`] for gRPC. [`ProviderConfig`] picks one from the configured address.
//!
//! # Error Handling
//!
//! Evaluation never fails outright: the caller's default value is returned alongside a
//! [`ResolutionError`]. Services and configuration report failures with the [`Error`] enum.
//!
//! # Cancellation
//!
//! Every call takes a [`CallContext`] carrying a cancellation token and an optional deadline,
//! which bound all network requests made on behalf of the call.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging messages under
//! the `flipt` target. Consider integrating a `log`-compatible logger implementation for better
//! visibility into provider operations.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod call;
mod config;
mod context;
mod error;
mod evaluation;
pub mod models;
mod provider;
pub mod service;

pub use call::CallContext;
pub use config::ProviderConfig;
pub use context::{ContextValue, FlattenedContext, REQUEST_ID_KEY, TARGETING_KEY};
pub use error::{Error, Result};
pub use evaluation::{
    ErrorCode, FeatureProvider, ProviderMetadata, Reason, ResolutionDetail, ResolutionError,
};
pub use provider::{split_namespace_and_flag, Provider, PROVIDER_NAME};
pub use service::{HttpService, RpcService, Service, DEFAULT_NAMESPACE};
