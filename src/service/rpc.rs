//! gRPC transport for the Flipt API.
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};

use crate::{
    call::CallContext,
    context::FlattenedContext,
    models::{EvaluationRequest, EvaluationResponse, Flag},
    service::Service,
    Error, Result,
};

const GET_FLAG_PATH: &str = "/flipt.Flipt/GetFlag";
const EVALUATE_PATH: &str = "/flipt.Flipt/Evaluate";

/// Subset of the `flipt` protobuf package used by this crate. Fields not listed here are skipped
/// when decoding.
mod proto {
    use std::collections::HashMap;

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct GetFlagRequest {
        #[prost(string, tag = "1")]
        pub key: String,
        #[prost(string, tag = "2")]
        pub namespace_key: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Flag {
        #[prost(string, tag = "1")]
        pub key: String,
        #[prost(string, tag = "2")]
        pub name: String,
        #[prost(string, tag = "3")]
        pub description: String,
        #[prost(bool, tag = "4")]
        pub enabled: bool,
        #[prost(message, optional, tag = "5")]
        pub created_at: Option<prost_types::Timestamp>,
        #[prost(message, optional, tag = "6")]
        pub updated_at: Option<prost_types::Timestamp>,
        #[prost(string, tag = "8")]
        pub namespace_key: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct EvaluationRequest {
        #[prost(string, tag = "1")]
        pub request_id: String,
        #[prost(string, tag = "2")]
        pub flag_key: String,
        #[prost(string, tag = "3")]
        pub entity_id: String,
        #[prost(map = "string, string", tag = "4")]
        pub context: HashMap<String, String>,
        #[prost(string, tag = "5")]
        pub namespace_key: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct EvaluationResponse {
        #[prost(string, tag = "1")]
        pub request_id: String,
        #[prost(string, tag = "2")]
        pub entity_id: String,
        #[prost(map = "string, string", tag = "3")]
        pub request_context: HashMap<String, String>,
        #[prost(bool, tag = "4")]
        pub r#match: bool,
        #[prost(string, tag = "5")]
        pub flag_key: String,
        #[prost(string, tag = "6")]
        pub segment_key: String,
        #[prost(string, tag = "8")]
        pub value: String,
        #[prost(string, tag = "10")]
        pub attachment: String,
        #[prost(string, tag = "12")]
        pub namespace_key: String,
    }
}

fn to_datetime(timestamp: prost_types::Timestamp) -> Option<DateTime<Utc>> {
    let nanos = u32::try_from(timestamp.nanos).ok()?;
    DateTime::from_timestamp(timestamp.seconds, nanos)
}

impl From<proto::Flag> for Flag {
    fn from(flag: proto::Flag) -> Self {
        Flag {
            key: flag.key,
            name: flag.name,
            description: flag.description,
            enabled: flag.enabled,
            namespace_key: flag.namespace_key,
            created_at: flag.created_at.and_then(to_datetime),
            updated_at: flag.updated_at.and_then(to_datetime),
        }
    }
}

impl From<EvaluationRequest> for proto::EvaluationRequest {
    fn from(request: EvaluationRequest) -> Self {
        proto::EvaluationRequest {
            request_id: request.request_id,
            flag_key: request.flag_key,
            entity_id: request.entity_id,
            context: request.context,
            namespace_key: request.namespace_key,
        }
    }
}

impl From<proto::EvaluationResponse> for EvaluationResponse {
    fn from(response: proto::EvaluationResponse) -> Self {
        EvaluationResponse {
            request_id: response.request_id,
            entity_id: response.entity_id,
            request_context: response.request_context,
            matched: response.r#match,
            flag_key: response.flag_key,
            segment_key: response.segment_key,
            value: response.value,
            attachment: response.attachment,
            namespace_key: response.namespace_key,
        }
    }
}

/// Translate a gRPC status into a service error. Only `NotFound` is classified.
fn classify_status(status: tonic::Status, operation: &'static str, flag_key: &str) -> Error {
    match status.code() {
        tonic::Code::NotFound => Error::FlagNotFound {
            flag_key: flag_key.to_owned(),
        },
        code => Error::Rpc {
            operation,
            code,
            message: status.message().to_owned(),
        },
    }
}

/// A [`Service`] talking to Flipt over gRPC.
///
/// The channel is dialed on first use and shared by all subsequent calls. When a certificate path
/// is configured, the connection uses TLS with that PEM file as the trusted CA.
#[derive(Debug)]
pub struct RpcService {
    authority: String,
    certificate_path: Option<PathBuf>,
    channel: OnceCell<Channel>,
}

impl RpcService {
    /// Create a service for the backend at `authority` (`host:port`).
    pub fn new(authority: impl Into<String>) -> Self {
        RpcService {
            authority: authority.into(),
            certificate_path: None,
            channel: OnceCell::new(),
        }
    }

    /// Create a service that sends requests through a pre-built `channel`.
    pub fn with_channel(channel: Channel) -> Self {
        RpcService {
            authority: String::new(),
            certificate_path: None,
            channel: OnceCell::from(channel),
        }
    }

    /// Trust the PEM-encoded CA certificate at `path` and connect over TLS.
    pub fn certificate_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.certificate_path = Some(path.into());
        self
    }

    async fn channel(&self) -> Result<Channel> {
        self.channel
            .get_or_try_init(|| self.connect())
            .await
            .cloned()
    }

    async fn connect(&self) -> Result<Channel> {
        let scheme = if self.certificate_path.is_some() {
            "https"
        } else {
            "http"
        };
        let mut endpoint = Endpoint::from_shared(format!("{scheme}://{}", self.authority))
            .map_err(Error::InvalidEndpoint)?;

        if let Some(path) = &self.certificate_path {
            let pem = tokio::fs::read(path)
                .await
                .map_err(|source| Error::Certificate {
                    path: path.clone(),
                    source,
                })?;
            let tls = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(pem));
            endpoint = endpoint.tls_config(tls).map_err(Error::Connect)?;
        }

        log::debug!(target: "flipt", authority:display = self.authority; "connecting to Flipt");
        endpoint.connect().await.map_err(Error::Connect)
    }

    async fn unary<Req, Resp>(
        &self,
        cx: &CallContext,
        path: &'static str,
        operation: &'static str,
        flag_key: &str,
        message: Req,
    ) -> Result<Resp>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = tonic::client::Grpc::new(self.channel().await?);
        grpc.ready().await.map_err(Error::Connect)?;

        let mut request = tonic::Request::new(message);
        if let Some(remaining) = cx.remaining() {
            request.set_timeout(remaining);
        }

        log::debug!(target: "flipt", flag_key, path; "sending request");
        let response: tonic::Response<Resp> = grpc
            .unary(
                request,
                ::http::uri::PathAndQuery::from_static(path),
                tonic::codec::ProstCodec::default(),
            )
            .await
            .map_err(|status| classify_status(status, operation, flag_key))?;

        Ok(response.into_inner())
    }
}

#[async_trait]
impl Service for RpcService {
    async fn get_flag(
        &self,
        cx: &CallContext,
        namespace_key: &str,
        flag_key: &str,
    ) -> Result<Flag> {
        let request = proto::GetFlagRequest {
            key: flag_key.to_owned(),
            namespace_key: namespace_key.to_owned(),
        };

        cx.run(async {
            let flag: proto::Flag = self
                .unary(cx, GET_FLAG_PATH, "getting flag", flag_key, request)
                .await?;
            Ok(flag.into())
        })
        .await
    }

    async fn evaluate(
        &self,
        cx: &CallContext,
        namespace_key: &str,
        flag_key: &str,
        evaluation_context: &FlattenedContext,
    ) -> Result<EvaluationResponse> {
        let request: proto::EvaluationRequest =
            EvaluationRequest::from_context(namespace_key, flag_key, evaluation_context)?.into();

        cx.run(async {
            let response: proto::EvaluationResponse = self
                .unary(cx, EVALUATE_PATH, "evaluating", flag_key, request)
                .await?;
            Ok(response.into())
        })
        .await
    }
}
