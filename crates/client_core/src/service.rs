//! The seam in front of the remote split service.
//!
//! Everything the controller knows about the service goes through
//! [`SplitService`]; [`HttpSplitService`] is the production implementation
//! and tests substitute their own.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{multipart, Client};
use serde::de::DeserializeOwned;
use shared::{
    domain::ProcessTarget,
    error::ServiceErrorReply,
    protocol::{ProcessRequest, ProcessResponse, SheetsUpdateResponse, UploadResponse},
};
use thiserror::Error;
use url::Url;

/// Explicit ceiling so a wedged service surfaces as "unreachable" instead of
/// hanging the session forever.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Well-formed reply carrying an `{error}` payload.
    #[error("{0}")]
    Rejected(String),
    /// Connection failure, timeout, or a reply that could not be decoded.
    #[error("{0}")]
    Unreachable(String),
}

/// Result of one processing request; which variant comes back is decided by
/// the [`ProcessTarget`] in the request.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    Archive(ProcessResponse),
    Sheets(SheetsUpdateResponse),
}

#[async_trait]
pub trait SplitService: Send + Sync {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadResponse, ServiceError>;
    async fn process(&self, request: ProcessRequest) -> Result<ProcessOutcome, ServiceError>;
    async fn download(&self, zip_filename: &str) -> Result<Vec<u8>, ServiceError>;
    async fn cleanup(&self) -> Result<(), ServiceError>;
}

pub struct HttpSplitService {
    http: Client,
    base_url: Url,
}

impl HttpSplitService {
    pub fn new(base_url: impl AsRef<str>) -> anyhow::Result<Self> {
        let base_url = base_url.as_ref();
        let mut base_url = Url::parse(base_url)
            .with_context(|| format!("invalid service url: {base_url}"))?;
        // A trailing slash keeps Url::join from eating the last path segment.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path)
            .map_err(|err| ServiceError::Unreachable(format!("invalid service endpoint: {err}")))
    }
}

#[async_trait]
impl SplitService for HttpSplitService {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadResponse, ServiceError> {
        let url = self.endpoint("upload")?;
        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        decode_reply(response).await
    }

    async fn process(&self, request: ProcessRequest) -> Result<ProcessOutcome, ServiceError> {
        let url = self.endpoint("process-data")?;
        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        match request.option {
            ProcessTarget::DownloadZip => Ok(ProcessOutcome::Archive(decode_reply(response).await?)),
            ProcessTarget::GoogleSheets => Ok(ProcessOutcome::Sheets(decode_reply(response).await?)),
        }
    }

    async fn download(&self, zip_filename: &str) -> Result<Vec<u8>, ServiceError> {
        let url = self.endpoint(&format!("download-zip/{zip_filename}"))?;
        let response = self.http.get(url).send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Rejected(format!(
                "archive retrieval failed: service returned {status}"
            )));
        }
        let mut stream = response.bytes_stream();
        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(transport_error)?;
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    async fn cleanup(&self) -> Result<(), ServiceError> {
        let url = self.endpoint("cleanup")?;
        // Best-effort: the reply body is ignored by contract.
        self.http.post(url).send().await.map_err(transport_error)?;
        Ok(())
    }
}

/// An `{error}` payload wins over the HTTP status; a body that is neither an
/// error nor the expected record is a transport-class failure.
async fn decode_reply<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ServiceError> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;
    if let Ok(reply) = serde_json::from_str::<ServiceErrorReply>(&body) {
        return Err(ServiceError::Rejected(reply.error));
    }
    if !status.is_success() {
        return Err(ServiceError::Rejected(format!("service returned {status}")));
    }
    serde_json::from_str(&body)
        .map_err(|err| ServiceError::Unreachable(format!("malformed service reply: {err}")))
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() || err.is_connect() {
        ServiceError::Unreachable(format!("service unreachable: {err}"))
    } else {
        ServiceError::Unreachable(err.to_string())
    }
}
