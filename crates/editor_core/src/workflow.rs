use std::{
    fmt::Debug,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use shared::{
    domain::{Adjustment, OutputFormat, Reference},
    protocol::ExportRequest,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    error::WorkflowError,
    events::{Notification, WorkflowEvent},
    service::ProcessingService,
    session::{Operation, Phase, Session},
    sink::ExportSink,
    source::SourceImage,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Sequences upload, transform and export against one editing session.
///
/// The session lock is held only while checking or applying a transition,
/// never across a remote call; exclusivity between commands comes from the
/// transient phases, so a second command issued while one is outstanding is
/// rejected with [`WorkflowError::Busy`] without touching the network.
/// Dropping a command future mid-call (a timeout, `select!`, an aborted task)
/// returns the session to its stable phase.
pub struct WorkflowController {
    service: Arc<dyn ProcessingService>,
    sink: Arc<dyn ExportSink>,
    inner: Mutex<Session>,
    events: broadcast::Sender<WorkflowEvent>,
}

impl WorkflowController {
    pub fn new(service: Arc<dyn ProcessingService>, sink: Arc<dyn ExportSink>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            service,
            sink,
            inner: Mutex::new(Session::new()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> Session {
        self.inner.lock().clone()
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase()
    }

    pub fn set_adjustment(&self, adjustment: Adjustment) -> Adjustment {
        let stored = self.inner.lock().set_adjustment(adjustment);
        debug!(?stored, "adjustment updated");
        stored
    }

    pub fn can_upload(&self) -> bool {
        self.inner.lock().can_start(Operation::Upload)
    }

    pub fn can_apply_edits(&self) -> bool {
        self.inner.lock().can_start(Operation::ApplyEdits)
    }

    pub fn can_export(&self) -> bool {
        self.inner.lock().can_start(Operation::Export)
    }

    /// Loads `path` and uploads it; an unreadable or non-image file is
    /// reported without any remote call.
    pub async fn upload_file(&self, path: impl AsRef<Path>) -> Result<Reference, WorkflowError> {
        match SourceImage::from_path(path).await {
            Ok(source) => self.upload(source).await,
            Err(err) => {
                warn!(error = %err, "rejected source file");
                self.notify(Notification::failure(Operation::Upload, &err));
                Err(err)
            }
        }
    }

    pub async fn upload(&self, source: SourceImage) -> Result<Reference, WorkflowError> {
        let (flight, ()) = self.begin(Operation::Upload, |session| {
            session
                .enter_upload(source.file_name.clone())
                .map(|previous| (previous, ()))
        })?;

        let outcome = self
            .service
            .upload(&source)
            .await
            .map_err(|err| WorkflowError::from_service(Operation::Upload, err));

        let reference = outcome.as_ref().ok().cloned();
        flight.finish(|session, previous| session.complete_upload(previous, reference));
        self.report(Operation::Upload, outcome)
    }

    pub async fn apply_edits_with(
        &self,
        adjustment: Adjustment,
    ) -> Result<Reference, WorkflowError> {
        self.set_adjustment(adjustment);
        self.apply_edits().await
    }

    /// Requests a transform of the uploaded image with the current adjustment.
    pub async fn apply_edits(&self) -> Result<Reference, WorkflowError> {
        let (flight, request) = self.begin(Operation::ApplyEdits, Session::enter_transform)?;

        let outcome = self
            .service
            .transform(&request)
            .await
            .map_err(|err| WorkflowError::from_service(Operation::ApplyEdits, err));

        let reference = outcome.as_ref().ok().cloned();
        flight.finish(|session, _| session.complete_transform(reference));
        self.report(Operation::ApplyEdits, outcome)
    }

    /// Fetches the processed image re-encoded as `format` and saves it as
    /// `processed.<ext>`. Returns where the file was written.
    pub async fn export(&self, format: OutputFormat) -> Result<PathBuf, WorkflowError> {
        let (flight, request) =
            self.begin(Operation::Export, |session| session.enter_export(format))?;

        let outcome = self.fetch_and_save(&request).await;

        flight.finish(|session, previous| session.complete_export(previous));
        self.report(Operation::Export, outcome)
    }

    async fn fetch_and_save(&self, request: &ExportRequest) -> Result<PathBuf, WorkflowError> {
        let bytes = self
            .service
            .export(request)
            .await
            .map_err(|err| WorkflowError::from_service(Operation::Export, err))?;
        let file_name = request.output_format.export_file_name();
        self.sink
            .save(&file_name, &bytes)
            .await
            .map_err(|source| WorkflowError::Save { file_name, source })
    }

    /// Runs `enter` under the session lock and, on success, returns a guard
    /// for the transient phase it entered.
    ///
    /// Busy rejections are logged only; validation failures are also
    /// surfaced as notifications.
    fn begin<T>(
        &self,
        operation: Operation,
        enter: impl FnOnce(&mut Session) -> Result<(Phase, T), WorkflowError>,
    ) -> Result<(InFlight<'_>, T), WorkflowError> {
        let entered = {
            let mut session = self.inner.lock();
            enter(&mut *session).map_err(|err| (session.phase(), err))
        };
        match entered {
            Ok((previous, value)) => {
                self.publish_phase(previous, operation.transient_phase());
                let flight = InFlight {
                    controller: self,
                    operation,
                    previous,
                    armed: true,
                };
                Ok((flight, value))
            }
            Err((phase, err)) => {
                warn!(%operation, %phase, error = %err, "command rejected");
                if !err.is_busy() {
                    self.notify(Notification::failure(operation, &err));
                }
                Err(err)
            }
        }
    }

    fn report<T: Debug>(
        &self,
        operation: Operation,
        outcome: Result<T, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        match &outcome {
            Ok(value) => {
                info!(%operation, result = ?value, "command succeeded");
                self.notify(Notification::success(operation));
            }
            Err(err) => {
                warn!(%operation, error = %err, "command failed");
                self.notify(Notification::failure(operation, err));
            }
        }
        outcome
    }

    fn publish_phase(&self, from: Phase, to: Phase) {
        debug!(%from, %to, "phase changed");
        let _ = self.events.send(WorkflowEvent::PhaseChanged { from, to });
    }

    fn notify(&self, notification: Notification) {
        let _ = self.events.send(WorkflowEvent::Notice(notification));
    }
}

/// Holds a command's transient phase. If the command future is dropped
/// before `finish`, the session leaves the transient phase as if the remote
/// call had failed.
struct InFlight<'a> {
    controller: &'a WorkflowController,
    operation: Operation,
    previous: Phase,
    armed: bool,
}

impl InFlight<'_> {
    fn finish(mut self, complete: impl FnOnce(&mut Session, Phase)) {
        self.armed = false;
        let to = {
            let mut session = self.controller.inner.lock();
            complete(&mut *session, self.previous);
            session.phase()
        };
        self.controller.publish_phase(self.operation.transient_phase(), to);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let to = {
            let mut session = self.controller.inner.lock();
            session.abandon(self.operation, self.previous);
            session.phase()
        };
        warn!(operation = %self.operation, phase = %to, "command dropped before completion");
        self.controller.publish_phase(self.operation.transient_phase(), to);
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
