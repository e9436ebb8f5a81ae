//! Events published by the workflow controller for the view layer.

use chrono::{DateTime, Utc};

use crate::{
    error::WorkflowError,
    session::{Operation, Phase},
};

pub const UPLOAD_SUCCEEDED: &str = "Image uploaded successfully!";
pub const UPLOAD_FAILED: &str = "Failed to upload image.";
pub const PROCESS_SUCCEEDED: &str = "Image processed successfully!";
pub const PROCESS_FAILED: &str = "Failed to process image.";
pub const PROCESS_WITHOUT_UPLOAD: &str = "Upload an image before applying changes.";
pub const EXPORT_SUCCEEDED: &str = "Image downloaded successfully!";
pub const EXPORT_FAILED: &str = "Failed to download image.";
pub const EXPORT_WITHOUT_RESULT: &str = "No processed image available for download.";

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    PhaseChanged { from: Phase, to: Phase },
    Notice(Notification),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub operation: Operation,
    pub message: String,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn success(operation: Operation) -> Self {
        let message = match operation {
            Operation::Upload => UPLOAD_SUCCEEDED,
            Operation::ApplyEdits => PROCESS_SUCCEEDED,
            Operation::Export => EXPORT_SUCCEEDED,
        };
        Self {
            level: NotificationLevel::Success,
            operation,
            message: message.to_string(),
            detail: None,
            at: Utc::now(),
        }
    }

    pub fn failure(operation: Operation, err: &WorkflowError) -> Self {
        let message = match (operation, err) {
            (Operation::ApplyEdits, WorkflowError::Validation(_)) => {
                PROCESS_WITHOUT_UPLOAD.to_string()
            }
            (Operation::Export, WorkflowError::Validation(_)) => EXPORT_WITHOUT_RESULT.to_string(),
            (Operation::Export, err) => match err.http_status() {
                Some(status) => format!("Failed to download image. Status: {status}"),
                None => EXPORT_FAILED.to_string(),
            },
            (Operation::Upload, _) => UPLOAD_FAILED.to_string(),
            (Operation::ApplyEdits, _) => PROCESS_FAILED.to_string(),
        };
        Self {
            level: NotificationLevel::Error,
            operation,
            message,
            detail: Some(err.to_string()),
            at: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}
