//! Session state and the phase transition table.
//!
//! `Session` is a plain value with no I/O; the controller owns one and calls
//! an `enter_*` method before a remote call and the matching `complete_*`
//! method after it.

use std::fmt;

use shared::{
    domain::{Adjustment, OutputFormat, Reference},
    protocol::{ExportRequest, TransformRequest},
};

use crate::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Idle,
    Uploading,
    Ready,
    Processing,
    Processed,
    Exporting,
}

impl Phase {
    /// Transient phases last exactly as long as one outstanding remote call.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Uploading | Self::Processing | Self::Exporting)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Ready => "ready",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Exporting => "exporting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Upload,
    ApplyEdits,
    Export,
}

impl Operation {
    pub fn transient_phase(self) -> Phase {
        match self {
            Self::Upload => Phase::Uploading,
            Self::ApplyEdits => Phase::Processing,
            Self::Export => Phase::Exporting,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Upload => "upload",
            Self::ApplyEdits => "apply edits",
            Self::Export => "export",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    phase: Phase,
    source_selected: bool,
    source_name: Option<String>,
    uploaded_reference: Option<Reference>,
    processed_reference: Option<Reference>,
    adjustment: Adjustment,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn source_selected(&self) -> bool {
        self.source_selected
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    pub fn uploaded_reference(&self) -> Option<&Reference> {
        self.uploaded_reference.as_ref()
    }

    pub fn processed_reference(&self) -> Option<&Reference> {
        self.processed_reference.as_ref()
    }

    pub fn adjustment(&self) -> Adjustment {
        self.adjustment
    }

    /// Stores the adjustment clamped to slider ranges. Allowed in any phase.
    pub fn set_adjustment(&mut self, adjustment: Adjustment) -> Adjustment {
        self.adjustment = adjustment.clamped();
        self.adjustment
    }

    /// Whether `operation` would currently be accepted.
    pub fn can_start(&self, operation: Operation) -> bool {
        if self.ensure_stable(operation).is_err() {
            return false;
        }
        match operation {
            Operation::Upload => true,
            Operation::ApplyEdits => self.uploaded_reference.is_some(),
            Operation::Export => self.processed_reference.is_some(),
        }
    }

    fn ensure_stable(&self, operation: Operation) -> Result<(), WorkflowError> {
        if self.phase.is_transient() {
            return Err(WorkflowError::Busy {
                operation,
                phase: self.phase,
            });
        }
        Ok(())
    }

    /// Moves into the transient phase and returns the phase that was left.
    fn start(&mut self, operation: Operation) -> Phase {
        let previous = self.phase;
        self.phase = operation.transient_phase();
        previous
    }

    /// Marks `source_name` as the chosen file and enters `Uploading`.
    pub fn enter_upload(&mut self, source_name: impl Into<String>) -> Result<Phase, WorkflowError> {
        self.ensure_stable(Operation::Upload)?;
        self.source_selected = true;
        self.source_name = Some(source_name.into());
        Ok(self.start(Operation::Upload))
    }

    /// Builds the transform request from the uploaded reference and the
    /// current adjustment, and enters `Processing`.
    pub fn enter_transform(&mut self) -> Result<(Phase, TransformRequest), WorkflowError> {
        self.ensure_stable(Operation::ApplyEdits)?;
        let reference = self
            .uploaded_reference
            .clone()
            .ok_or_else(|| WorkflowError::validation("no uploaded image; upload an image first"))?;
        let request = TransformRequest::new(reference, self.adjustment);
        Ok((self.start(Operation::ApplyEdits), request))
    }

    pub fn enter_export(
        &mut self,
        format: OutputFormat,
    ) -> Result<(Phase, ExportRequest), WorkflowError> {
        self.ensure_stable(Operation::Export)?;
        let reference = self
            .processed_reference
            .clone()
            .ok_or_else(|| WorkflowError::validation("no processed image available for download"))?;
        let request = ExportRequest {
            reference,
            output_format: format,
        };
        Ok((self.start(Operation::Export), request))
    }

    pub fn complete_upload(&mut self, previous: Phase, outcome: Option<Reference>) {
        debug_assert_eq!(self.phase, Phase::Uploading);
        match outcome {
            Some(reference) => {
                self.uploaded_reference = Some(reference);
                self.processed_reference = None;
                self.phase = Phase::Ready;
            }
            None => self.phase = previous,
        }
    }

    pub fn complete_transform(&mut self, outcome: Option<Reference>) {
        debug_assert_eq!(self.phase, Phase::Processing);
        match outcome {
            Some(reference) => {
                self.processed_reference = Some(reference);
                self.phase = Phase::Processed;
            }
            None => self.phase = Phase::Ready,
        }
    }

    /// Export never changes the stable phase, whatever the outcome.
    pub fn complete_export(&mut self, previous: Phase) {
        debug_assert_eq!(self.phase, Phase::Exporting);
        self.phase = previous;
    }

    /// Leaves an operation that never produced an outcome, exactly as a
    /// failed call would. No-op unless the session is in that operation's
    /// transient phase.
    pub fn abandon(&mut self, operation: Operation, previous: Phase) {
        if self.phase != operation.transient_phase() {
            return;
        }
        match operation {
            Operation::Upload => self.complete_upload(previous, None),
            Operation::ApplyEdits => self.complete_transform(None),
            Operation::Export => self.complete_export(previous),
        }
    }
}
