use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use shared::{
    domain::Reference,
    protocol::{
        ExportRequest, ReferenceResponse, TransformRequest, EXPORT_PATH, TRANSFORM_PATH,
        UPLOAD_FIELD, UPLOAD_PATH,
    },
};
use tracing::debug;
use url::Url;

use crate::{error::ServiceError, source::SourceImage};

/// The remote image processing service.
#[async_trait]
pub trait ProcessingService: Send + Sync {
    async fn upload(&self, source: &SourceImage) -> Result<Reference, ServiceError>;
    async fn transform(&self, request: &TransformRequest) -> Result<Reference, ServiceError>;
    async fn export(&self, request: &ExportRequest) -> Result<Vec<u8>, ServiceError>;
}

pub struct HttpProcessingService {
    http: Client,
    base_url: Url,
}

impl HttpProcessingService {
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        Self::with_timeout(base_url, None)
    }

    /// A `None` timeout lets calls wait indefinitely.
    pub fn with_timeout(base_url: &str, timeout: Option<Duration>) -> Result<Self, ServiceError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: normalize_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        Ok(self.base_url.join(path)?)
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, ServiceError> {
    let mut url = Url::parse(raw.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

async fn ensure_success(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::status(status.as_u16(), &body))
}

async fn read_reference(response: Response) -> Result<Reference, ServiceError> {
    let body = ensure_success(response).await?.bytes().await?;
    let parsed: ReferenceResponse = serde_json::from_slice(&body)
        .map_err(|err| ServiceError::unexpected(format!("response is not valid JSON: {err}")))?;
    parsed
        .into_reference()
        .ok_or_else(|| ServiceError::unexpected("response carries no filePath"))
}

#[async_trait]
impl ProcessingService for HttpProcessingService {
    async fn upload(&self, source: &SourceImage) -> Result<Reference, ServiceError> {
        let part = Part::bytes(source.bytes.clone())
            .file_name(source.file_name.clone())
            .mime_str(source.mime.as_str())?;
        let form = Form::new().part(UPLOAD_FIELD, part);
        debug!(file = %source.file_name, size = source.len(), "uploading source image");
        let response = self
            .http
            .post(self.endpoint(UPLOAD_PATH)?)
            .multipart(form)
            .send()
            .await?;
        read_reference(response).await
    }

    async fn transform(&self, request: &TransformRequest) -> Result<Reference, ServiceError> {
        debug!(reference = %request.reference, "requesting transform");
        let response = self
            .http
            .post(self.endpoint(TRANSFORM_PATH)?)
            .json(request)
            .send()
            .await?;
        read_reference(response).await
    }

    async fn export(&self, request: &ExportRequest) -> Result<Vec<u8>, ServiceError> {
        debug!(
            reference = %request.reference,
            format = %request.output_format,
            "requesting export"
        );
        let response = self
            .http
            .post(self.endpoint(EXPORT_PATH)?)
            .json(request)
            .send()
            .await?;
        let bytes = ensure_success(response).await?.bytes().await?;
        if bytes.is_empty() {
            return Err(ServiceError::unexpected("export returned an empty payload"));
        }
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
#[path = "tests/service_tests.rs"]
mod tests;
