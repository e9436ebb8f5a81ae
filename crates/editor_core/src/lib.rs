//! Image editing workflow: session state machine, processing service client
//! and export sinks.

pub mod error;
pub mod events;
pub mod service;
pub mod session;
pub mod sink;
pub mod source;
mod workflow;

pub use error::{ServiceError, WorkflowError};
pub use events::{Notification, NotificationLevel, WorkflowEvent};
pub use service::{HttpProcessingService, ProcessingService};
pub use session::{Operation, Phase, Session};
pub use sink::{DirectorySink, ExportSink};
pub use source::SourceImage;
pub use workflow::WorkflowController;

pub use shared::domain::{Adjustment, ImageMime, OutputFormat, Reference};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
