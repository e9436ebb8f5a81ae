use serde::{Deserialize, Serialize};

use crate::domain::{Adjustment, OutputFormat, Reference, PREVIEW_FORMAT};

pub const UPLOAD_PATH: &str = "upload";
pub const TRANSFORM_PATH: &str = "process";
pub const EXPORT_PATH: &str = "download";

/// Name of the multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "image";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRequest {
    #[serde(rename = "filePath")]
    pub reference: Reference,
    pub brightness: f32,
    pub contrast: f32,
    #[serde(rename = "rotation")]
    pub rotation_degrees: u16,
    #[serde(rename = "format")]
    pub output_format: OutputFormat,
}

impl TransformRequest {
    pub fn new(reference: Reference, adjustment: Adjustment) -> Self {
        Self {
            reference,
            brightness: adjustment.brightness,
            contrast: adjustment.contrast,
            rotation_degrees: adjustment.rotation_degrees,
            output_format: PREVIEW_FORMAT,
        }
    }

    pub fn adjustment(&self) -> Adjustment {
        Adjustment::new(self.brightness, self.contrast, self.rotation_degrees)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    #[serde(rename = "filePath")]
    pub reference: Reference,
    #[serde(rename = "format")]
    pub output_format: OutputFormat,
}

/// Body returned by both the upload and the transform call.
///
/// The field is optional on the wire so that a 2xx reply without it can be
/// told apart from a malformed body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceResponse {
    #[serde(rename = "filePath", default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl ReferenceResponse {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            file_path: Some(reference.into()),
        }
    }

    /// The returned reference, or `None` when absent or blank.
    pub fn into_reference(self) -> Option<Reference> {
        self.file_path
            .filter(|path| !path.trim().is_empty())
            .map(Reference)
    }
}

pub type UploadResponse = ReferenceResponse;
pub type TransformResponse = ReferenceResponse;
