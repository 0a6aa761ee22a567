//! reqwest-backed [`BulkBackend`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use pactum_api_models::{
    BulkRequestBody, BulkResultBody, ExportResponseBody, JobAcceptedBody, JobStatusBody, parse,
};
use pactum_bulk_core::{
    AsyncJobHandle, BulkBackend, BulkError, BulkOperationRequest, BulkResult, DispatchOutcome,
    JobStatusReport, OperationType,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::classify::{classify_response, classify_transport};
use crate::error::{ClientError, ClientResult};

/// Header carrying the logical submission key; identical on every retry.
pub const HEADER_IDEMPOTENCY_KEY: &str = "Idempotency-Key";
/// Header carrying a per-attempt correlation id.
pub const HEADER_REQUEST_ID: &str = "x-request-id";
/// Header carrying the API key when one is configured.
pub const HEADER_API_KEY: &str = "x-pactum-api-key";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`HttpBulkBackend`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// API root; bulk paths are resolved against it.
    pub base_url: Url,
    /// Resource segment of the bulk paths, for example `contracts`.
    pub resource: String,
    /// Optional API key.
    pub api_key: Option<String>,
    /// Per-request timeout; exceeding it is a transient failure.
    pub request_timeout: Duration,
}

impl ClientSettings {
    /// Settings for `base_url` and `resource` with the default timeout and no key.
    #[must_use]
    pub fn new(base_url: Url, resource: impl Into<String>) -> Self {
        Self {
            base_url,
            resource: resource.into(),
            api_key: None,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Sends bulk requests and status queries over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBulkBackend {
    client: Client,
    base_url: Url,
    resource: String,
}

impl HttpBulkBackend {
    /// Build a backend with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the URL, resource, or API key is unusable
    /// or the client cannot be constructed.
    pub fn new(settings: ClientSettings) -> ClientResult<Self> {
        let mut default_headers = HeaderMap::new();
        if let Some(key) = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
        {
            let mut value = HeaderValue::from_str(key).map_err(|_| ClientError::InvalidApiKey)?;
            value.set_sensitive(true);
            default_headers.insert(HEADER_API_KEY, value);
        }

        let client = Client::builder()
            .timeout(settings.request_timeout)
            .default_headers(default_headers)
            .build()
            .map_err(ClientError::Build)?;

        Self::with_client(client, settings.base_url, settings.resource)
    }

    /// Build a backend around an existing client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the URL or resource is unusable.
    pub fn with_client(
        client: Client,
        mut base_url: Url,
        resource: impl Into<String>,
    ) -> ClientResult<Self> {
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "URL cannot carry a path".into(),
            });
        }
        // Paths resolve under the base path, so it must read as a directory.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let resource = resource.into().trim().to_string();
        if resource.is_empty() || resource.contains('/') {
            return Err(ClientError::InvalidResource(resource));
        }

        Ok(Self {
            client,
            base_url,
            resource,
        })
    }

    /// Location a request for `operation` is posted to.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::MalformedResponse`] if the path cannot be joined.
    pub fn operation_url(&self, operation: OperationType) -> BulkResult<Url> {
        self.resolve(&format!("/bulk/{}/{}", self.resource, operation.as_str()))
    }

    /// Location of the status document for `handle`.
    ///
    /// Absolute poll URLs are used as given. Paths, with or without a leading
    /// `/`, resolve under the base URL's path.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::MalformedResponse`] if the location is not a URL.
    pub fn status_url(&self, handle: &AsyncJobHandle) -> BulkResult<Url> {
        self.resolve(&handle.poll_url_or_key)
    }

    fn resolve(&self, location: &str) -> BulkResult<Url> {
        self.base_url
            .join(location.trim_start_matches('/'))
            .map_err(|err| BulkError::malformed("url", format!("'{location}': {err}")))
    }

    fn tag(builder: RequestBuilder) -> RequestBuilder {
        builder.header(HEADER_REQUEST_ID, Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl BulkBackend for HttpBulkBackend {
    async fn dispatch(&self, request: &BulkOperationRequest) -> BulkResult<DispatchOutcome> {
        let operation = request.operation_type();
        let url = self.operation_url(operation)?;
        tracing::debug!(%url, operation = %operation, targets = request.target_ids().len(), "dispatching bulk request");

        let response = Self::tag(self.client.post(url))
            .header(HEADER_IDEMPOTENCY_KEY, request.idempotency_key())
            .json(&BulkRequestBody::from(request))
            .send()
            .await
            .map_err(|err| classify_transport(&err))?;

        match response.status() {
            StatusCode::ACCEPTED => {
                let body: JobAcceptedBody = read_json(response, "dispatch").await?;
                let handle = body.into_handle(request, Utc::now())?;
                Ok(DispatchOutcome::Accepted(handle))
            }
            status if status.is_success() => {
                let value: Value = read_json(response, "dispatch").await?;
                let result = match operation {
                    OperationType::Export => {
                        parse::<ExportResponseBody>("dispatch", value)?.into_result()?
                    }
                    OperationType::Update | OperationType::Delete => {
                        parse::<BulkResultBody>("dispatch", value)?.into_result(operation)
                    }
                };
                Ok(DispatchOutcome::Immediate(result))
            }
            _ => Err(classify_response(response).await),
        }
    }

    async fn job_status(&self, handle: &AsyncJobHandle) -> BulkResult<JobStatusReport> {
        let url = self.status_url(handle)?;
        let response = Self::tag(self.client.get(url))
            .send()
            .await
            .map_err(|err| classify_transport(&err))?;

        if !response.status().is_success() {
            return Err(classify_response(response).await);
        }
        let body: JobStatusBody = read_json(response, "job status").await?;
        body.into_report(handle)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, context: &'static str) -> BulkResult<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|err| classify_transport(&err))?;
    serde_json::from_slice(&bytes).map_err(|err| BulkError::malformed(context, err.to_string()))
}
