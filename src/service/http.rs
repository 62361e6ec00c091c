//! HTTP+JSON transport for the Flipt REST API.
use async_trait::async_trait;
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    StatusCode, Url,
};
use serde::{de::DeserializeOwned, Deserialize};

use crate::{
    call::CallContext,
    context::FlattenedContext,
    models::{EvaluationRequest, EvaluationResponse, Flag},
    service::Service,
    Error, Result,
};

const FLAGS_ENDPOINT: &str = "/api/v1/flags";
const EVALUATE_ENDPOINT: &str = "/api/v1/evaluate";

const APPLICATION_JSON: &str = "application/json";

/// gRPC `NotFound` code as reported in gateway error bodies.
const NOT_FOUND_CODE: i32 = 5;

/// Error body returned by the Flipt HTTP gateway.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    code: i32,
}

/// A [`Service`] talking to Flipt over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpService {
    // Client holds a connection pool internally, so it is shared by all requests.
    client: reqwest::Client,
    base_url: Url,
}

impl HttpService {
    /// Create a service for the backend at `base_url` (`scheme://host:port`).
    pub fn new(base_url: Url) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a service that sends requests through a pre-built `client`.
    pub fn with_client(base_url: Url, client: reqwest::Client) -> Self {
        HttpService { client, base_url }
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let address = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&address).map_err(|source| Error::InvalidAddress { address, source })
    }

    fn request(
        &self,
        builder: reqwest::RequestBuilder,
        cx: &CallContext,
    ) -> reqwest::RequestBuilder {
        let builder = builder.header(ACCEPT, APPLICATION_JSON);
        match cx.remaining() {
            Some(remaining) => builder.timeout(remaining),
            None => builder,
        }
    }
}

#[async_trait]
impl Service for HttpService {
    async fn get_flag(
        &self,
        cx: &CallContext,
        namespace_key: &str,
        flag_key: &str,
    ) -> Result<Flag> {
        let mut url = self.endpoint(FLAGS_ENDPOINT)?;
        // The key is a single path segment; reserved characters are percent-encoded.
        url.path_segments_mut()
            .map_err(|()| Error::InvalidAddress {
                address: self.base_url.to_string(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?
            .push(flag_key);
        url.query_pairs_mut().append_pair("namespaceKey", namespace_key);

        cx.run(async {
            log::debug!(target: "flipt", flag_key, namespace_key; "fetching flag");
            let response = self
                .request(self.client.get(url), cx)
                .send()
                .await
                .map_err(Error::Request)?;

            read_response(response, "getting flag", flag_key).await
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
        let body = EvaluationRequest::from_context(namespace_key, flag_key, evaluation_context)?;
        let url = self.endpoint(EVALUATE_ENDPOINT)?;

        cx.run(async {
            log::debug!(target: "flipt",
                        flag_key,
                        namespace_key,
                        entity_id:display = body.entity_id;
                        "evaluating flag");
            let response = self
                .request(self.client.post(url), cx)
                .header(CONTENT_TYPE, APPLICATION_JSON)
                .json(&body)
                .send()
                .await
                .map_err(Error::Request)?;

            read_response(response, "evaluating", flag_key).await
        })
        .await
    }
}

/// Decode a successful response body, or classify the failure.
///
/// Only a 404 with a JSON error body whose code is `NotFound` is reported as
/// [`Error::FlagNotFound`]. Any other 404 likely means the address points at something that is not
/// Flipt, so it is reported as an unexpected status along with the raw body.
async fn read_response<T: DeserializeOwned>(
    response: reqwest::Response,
    operation: &'static str,
    flag_key: &str,
) -> Result<T> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(APPLICATION_JSON));

    let body = response.bytes().await.map_err(Error::ReadBody)?;
    log::debug!(target: "flipt", flag_key, status = status.as_u16(); "received response");

    if status == StatusCode::OK {
        return serde_json::from_slice(&body).map_err(Error::Decode);
    }

    if status == StatusCode::NOT_FOUND && is_json {
        let error_body: ErrorBody = serde_json::from_slice(&body).map_err(Error::Decode)?;
        if error_body.code == NOT_FOUND_CODE {
            log::debug!(target: "flipt",
                        flag_key,
                        error:display = error_body.error;
                        "backend reported flag not found");
            return Err(Error::FlagNotFound {
                flag_key: flag_key.to_owned(),
            });
        }
    }

    Err(Error::UnexpectedStatus {
        operation,
        status: status.as_u16(),
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use reqwest::Url;

    use super::HttpService;

    #[test]
    fn endpoint_joins_base_url_without_double_slash() {
        let service = HttpService::new(Url::parse("https://flipt.example.com:9090/").unwrap());

        assert_eq!(
            service.endpoint("/api/v1/evaluate").unwrap().as_str(),
            "https://flipt.example.com:9090/api/v1/evaluate"
        );
    }

    #[test]
    fn endpoint_appends_flag_path() {
        let service = HttpService::new(Url::parse("http://localhost:8080").unwrap());

        assert_eq!(
            service.endpoint("/api/v1/flags/foo-bar").unwrap().as_str(),
            "http://localhost:8080/api/v1/flags/foo-bar"
        );
    }
}
