use std::{path::PathBuf, sync::Arc};

use tonic::transport::Channel;
use url::Url;

use crate::{
    service::{HttpService, RpcService, Service},
    Error, Provider, Result,
};

/// Configuration for [`Provider`].
///
/// The transport is picked from the address scheme: `http://` and `https://` use the REST API,
/// `grpc://host:port` or a bare `host:port` use gRPC.
///
/// # Examples
/// ```
/// # use flipt_provider::ProviderConfig;
/// let provider = ProviderConfig::new()
///     .address("grpc://flipt.internal:9000")
///     .certificate_path("/etc/flipt/ca.pem")
///     .to_provider()
///     .unwrap();
/// ```
pub struct ProviderConfig {
    pub(crate) address: String,
    pub(crate) certificate_path: Option<PathBuf>,
    pub(crate) http_client: Option<reqwest::Client>,
    pub(crate) rpc_channel: Option<Channel>,
    pub(crate) service: Option<Arc<dyn Service>>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderConfig {
    /// Default backend address.
    pub const DEFAULT_ADDRESS: &'static str = "http://localhost:8080";

    /// Create a configuration pointing at [`ProviderConfig::DEFAULT_ADDRESS`].
    pub fn new() -> Self {
        ProviderConfig {
            address: Self::DEFAULT_ADDRESS.to_owned(),
            certificate_path: None,
            http_client: None,
            rpc_channel: None,
            service: None,
        }
    }

    /// Address of the Flipt HTTP or gRPC API.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// PEM-encoded CA certificate used to connect over TLS. gRPC only.
    pub fn certificate_path(mut self, certificate_path: impl Into<PathBuf>) -> Self {
        self.certificate_path = Some(certificate_path.into());
        self
    }

    /// Send HTTP requests through a pre-built client instead of a default one.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Send gRPC requests through a pre-built channel instead of dialing the address.
    pub fn rpc_channel(mut self, channel: Channel) -> Self {
        self.rpc_channel = Some(channel);
        self
    }

    /// Resolve flags through `service`, ignoring address and transport settings.
    pub fn service(mut self, service: impl Service + 'static) -> Self {
        self.service = Some(Arc::new(service));
        self
    }

    /// Create a new [`Provider`] using the specified configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidAddress`] if the address is not a valid URL.
    /// - [`Error::UnsupportedScheme`] if the address scheme is neither HTTP(S) nor gRPC.
    pub fn to_provider(self) -> Result<Provider> {
        let service = match self.service {
            Some(service) => service,
            None => transport(
                &self.address,
                self.certificate_path,
                self.http_client,
                self.rpc_channel,
            )?,
        };

        Ok(Provider::from_shared(service))
    }
}

fn transport(
    address: &str,
    certificate_path: Option<PathBuf>,
    http_client: Option<reqwest::Client>,
    rpc_channel: Option<Channel>,
) -> Result<Arc<dyn Service>> {
    let (scheme, authority) = match address.split_once("://") {
        Some((scheme, authority)) => (scheme, authority),
        None => ("grpc", address),
    };

    match scheme {
        "http" | "https" => {
            let base_url = Url::parse(address).map_err(|source| Error::InvalidAddress {
                address: address.to_owned(),
                source,
            })?;
            if certificate_path.is_some() {
                log::warn!(target: "flipt",
                           address;
                           "certificate path is ignored by the HTTP transport");
            }
            if rpc_channel.is_some() {
                log::warn!(target: "flipt",
                           address;
                           "gRPC channel is ignored by the HTTP transport");
            }
            let service = match http_client {
                Some(client) => HttpService::with_client(base_url, client),
                None => HttpService::new(base_url),
            };
            Ok(Arc::new(service))
        }
        "grpc" => {
            if http_client.is_some() {
                log::warn!(target: "flipt",
                           address;
                           "HTTP client is ignored by the gRPC transport");
            }
            let service = match rpc_channel {
                Some(channel) => RpcService::with_channel(channel),
                None => RpcService::new(authority.trim_end_matches('/')),
            };
            let service = match certificate_path {
                Some(path) => service.certificate_path(path),
                None => service,
            };
            Ok(Arc::new(service))
        }
        other => Err(Error::UnsupportedScheme(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        call::CallContext,
        context::FlattenedContext,
        evaluation::{ErrorCode, FeatureProvider},
        models::{EvaluationResponse, Flag},
        service::Service,
        Error, Result,
    };

    use super::{transport, ProviderConfig};

    struct NotFound;

    #[async_trait::async_trait]
    impl Service for NotFound {
        async fn get_flag(&self, _cx: &CallContext, _ns: &str, flag_key: &str) -> Result<Flag> {
            Err(Error::FlagNotFound {
                flag_key: flag_key.to_owned(),
            })
        }

        async fn evaluate(
            &self,
            _cx: &CallContext,
            _ns: &str,
            _flag_key: &str,
            _evaluation_context: &FlattenedContext,
        ) -> Result<EvaluationResponse> {
            unreachable!()
        }
    }

    #[test]
    fn default_address_uses_http() {
        assert_eq!(ProviderConfig::new().address, "http://localhost:8080");
        assert!(ProviderConfig::default().to_provider().is_ok());
    }

    #[test]
    fn selects_transport_by_scheme() {
        assert!(transport("http://localhost:8080", None, None, None).is_ok());
        assert!(transport("https://flipt.example.com", None, None, None).is_ok());
        assert!(transport("grpc://localhost:9000", None, None, None).is_ok());
        assert!(transport("localhost:9000", Some("ca.pem".into()), None, None).is_ok());
    }

    #[tokio::test]
    async fn ignores_options_of_the_other_transport() {
        let channel = tonic::transport::Channel::from_static("http://localhost:9000").connect_lazy();

        assert!(transport("http://localhost:8080", None, None, Some(channel)).is_ok());
        assert!(transport("grpc://localhost:9000", None, Some(reqwest::Client::new()), None).is_ok());
    }

    #[test]
    fn rejects_unknown_scheme() {
        let err = ProviderConfig::new()
            .address("ftp://localhost")
            .to_provider()
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnsupportedScheme(ref scheme) if scheme == "ftp"));
    }

    #[test]
    fn rejects_malformed_http_address() {
        let err = ProviderConfig::new()
            .address("http://")
            .to_provider()
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn injected_service_bypasses_transport() {
        let provider = ProviderConfig::new()
            .address("ftp://ignored")
            .service(NotFound)
            .to_provider()
            .unwrap();

        let context = FlattenedContext::from([("targetingKey".to_owned(), "user".into())]);
        let detail = provider
            .string_evaluation(&CallContext::new(), "foo", "x".to_owned(), Some(&context))
            .await;

        assert_eq!(detail.value, "x");
        assert_eq!(detail.error_code(), Some(ErrorCode::FlagNotFound));
    }
}
