use std::path::Path;

use shared::domain::ImageMime;

use crate::error::WorkflowError;

/// A local image chosen for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub file_name: String,
    pub mime: ImageMime,
    pub bytes: Vec<u8>,
}

impl SourceImage {
    pub fn new(
        file_name: impl Into<String>,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<Self, WorkflowError> {
        let mime = mime
            .parse::<ImageMime>()
            .map_err(|err| WorkflowError::validation(err.to_string()))?;
        Self::with_mime(file_name, mime, bytes)
    }

    pub fn with_mime(
        file_name: impl Into<String>,
        mime: ImageMime,
        bytes: Vec<u8>,
    ) -> Result<Self, WorkflowError> {
        let file_name = file_name.into();
        if file_name.trim().is_empty() {
            return Err(WorkflowError::validation("source file name is empty"));
        }
        if bytes.is_empty() {
            return Err(WorkflowError::validation(format!(
                "source file '{file_name}' is empty"
            )));
        }
        Ok(Self {
            file_name,
            mime,
            bytes,
        })
    }

    /// Reads a file, guessing its media type from the extension.
    ///
    /// The type is checked before the file is read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, WorkflowError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                WorkflowError::validation(format!("'{}' is not a file path", path.display()))
            })?
            .to_string();
        let mime = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream");
        let mime = mime
            .parse::<ImageMime>()
            .map_err(|err| WorkflowError::validation(err.to_string()))?;
        let bytes = tokio::fs::read(path).await.map_err(|err| {
            WorkflowError::validation(format!("failed to read '{}': {err}", path.display()))
        })?;
        Self::with_mime(file_name, mime, bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
