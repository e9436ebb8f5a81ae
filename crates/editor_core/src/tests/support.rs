//! Fakes shared by the controller and HTTP client tests.

use std::{collections::VecDeque, io, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use shared::{
    domain::{ImageMime, Reference},
    protocol::{ExportRequest, TransformRequest},
};
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
};

use crate::{
    error::ServiceError,
    service::ProcessingService,
    session::Operation,
    sink::ExportSink,
    source::SourceImage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reply {
    Ok,
    Status(u16),
    MissingReference,
    NotJson,
    Empty,
}

/// Parks the next call until released, reporting when it has arrived.
struct Hold {
    operation: Option<Operation>,
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

pub(crate) struct HoldHandle {
    entered: oneshot::Receiver<()>,
    release: oneshot::Sender<()>,
}

impl HoldHandle {
    pub(crate) async fn wait_entered(&mut self) {
        (&mut self.entered).await.expect("held call never arrived");
    }

    pub(crate) fn release(self) {
        let _ = self.release.send(());
    }
}

fn new_hold(operation: Option<Operation>) -> (Hold, HoldHandle) {
    let (entered_tx, entered_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    (
        Hold {
            operation,
            entered: entered_tx,
            release: release_rx,
        },
        HoldHandle {
            entered: entered_rx,
            release: release_tx,
        },
    )
}

async fn wait_if_held(hold: &Mutex<Option<Hold>>, operation: Operation) {
    let taken = {
        let mut guard = hold.lock().await;
        match guard.as_ref() {
            Some(h) if h.operation.map_or(true, |op| op == operation) => guard.take(),
            _ => None,
        }
    };
    if let Some(hold) = taken {
        let _ = hold.entered.send(());
        let _ = hold.release.await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Upload { file_name: String, mime: ImageMime },
    Transform(TransformRequest),
    Export(ExportRequest),
}

/// In-process service returning `R1`, `R2`, ... unless a reply is scripted.
#[derive(Default)]
pub(crate) struct ScriptedService {
    calls: Mutex<Vec<Call>>,
    scripted: Mutex<VecDeque<(Operation, Reply)>>,
    issued: Mutex<u32>,
    hold: Mutex<Option<Hold>>,
}

impl ScriptedService {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) async fn script(&self, operation: Operation, reply: Reply) {
        self.scripted.lock().await.push_back((operation, reply));
    }

    pub(crate) async fn hold_next(&self) -> HoldHandle {
        let (hold, handle) = new_hold(None);
        *self.hold.lock().await = Some(hold);
        handle
    }

    pub(crate) async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    async fn reply_for(&self, operation: Operation) -> Reply {
        let mut scripted = self.scripted.lock().await;
        match scripted.iter().position(|(op, _)| *op == operation) {
            Some(index) => scripted.remove(index).map(|(_, reply)| reply).unwrap_or(Reply::Ok),
            None => Reply::Ok,
        }
    }

    async fn next_reference(&self) -> Reference {
        let mut issued = self.issued.lock().await;
        *issued += 1;
        Reference(format!("R{issued}"))
    }

    async fn respond(&self, operation: Operation) -> Result<Reference, ServiceError> {
        wait_if_held(&self.hold, operation).await;
        match self.reply_for(operation).await {
            Reply::Ok => Ok(self.next_reference().await),
            Reply::Status(status) => Err(ServiceError::status(status, "scripted failure")),
            Reply::MissingReference | Reply::NotJson | Reply::Empty => {
                Err(ServiceError::unexpected("scripted malformed response"))
            }
        }
    }
}

#[async_trait]
impl ProcessingService for ScriptedService {
    async fn upload(&self, source: &SourceImage) -> Result<Reference, ServiceError> {
        self.calls.lock().await.push(Call::Upload {
            file_name: source.file_name.clone(),
            mime: source.mime,
        });
        self.respond(Operation::Upload).await
    }

    async fn transform(&self, request: &TransformRequest) -> Result<Reference, ServiceError> {
        self.calls.lock().await.push(Call::Transform(request.clone()));
        self.respond(Operation::ApplyEdits).await
    }

    async fn export(&self, request: &ExportRequest) -> Result<Vec<u8>, ServiceError> {
        self.calls.lock().await.push(Call::Export(request.clone()));
        self.respond(Operation::Export).await?;
        Ok(format!("{}:{}", request.reference, request.output_format).into_bytes())
    }
}

#[derive(Default)]
pub(crate) struct MemorySink {
    saved: Mutex<Vec<(String, Vec<u8>)>>,
    fail: bool,
}

impl MemorySink {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self {
            saved: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub(crate) async fn saved(&self) -> Vec<(String, Vec<u8>)> {
        self.saved.lock().await.clone()
    }
}

#[async_trait]
impl ExportSink for MemorySink {
    async fn save(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
        }
        self.saved
            .lock()
            .await
            .push((file_name.to_string(), bytes.to_vec()));
        Ok(PathBuf::from("/memory").join(file_name))
    }
}

pub(crate) fn png_source(name: &str) -> SourceImage {
    SourceImage::with_mime(name, ImageMime::Png, b"\x89PNG fake".to_vec()).expect("source")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedUpload {
    pub(crate) field: String,
    pub(crate) file_name: Option<String>,
    pub(crate) content_type: Option<String>,
    pub(crate) bytes: Vec<u8>,
}

/// HTTP fake of the processing service, recording every request it sees.
#[derive(Clone, Default)]
pub(crate) struct FakeServer {
    pub(crate) uploads: Arc<Mutex<Vec<RecordedUpload>>>,
    pub(crate) transforms: Arc<Mutex<Vec<serde_json::Value>>>,
    pub(crate) exports: Arc<Mutex<Vec<serde_json::Value>>>,
    replies: Arc<Mutex<Vec<(Operation, Reply)>>>,
    hold: Arc<Mutex<Option<Hold>>>,
}

impl FakeServer {
    pub(crate) async fn reply_with(&self, operation: Operation, reply: Reply) {
        let mut replies = self.replies.lock().await;
        replies.retain(|(op, _)| *op != operation);
        replies.push((operation, reply));
    }

    pub(crate) async fn hold_next(&self, operation: Operation) -> HoldHandle {
        let (hold, handle) = new_hold(Some(operation));
        *self.hold.lock().await = Some(hold);
        handle
    }

    async fn reply_for(&self, operation: Operation) -> Reply {
        self.replies
            .lock()
            .await
            .iter()
            .find(|(op, _)| *op == operation)
            .map(|(_, reply)| *reply)
            .unwrap_or(Reply::Ok)
    }

    async fn reference_reply(&self, operation: Operation, reference: String) -> Response {
        match self.reply_for(operation).await {
            Reply::Ok => Json(json!({ "filePath": reference })).into_response(),
            Reply::Status(status) => status_reply(status),
            Reply::MissingReference => Json(json!({ "ok": true })).into_response(),
            Reply::NotJson => "<html>not json</html>".into_response(),
            Reply::Empty => StatusCode::OK.into_response(),
        }
    }
}

fn status_reply(status: u16) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, "processing service failure").into_response()
}

async fn handle_upload(State(state): State<FakeServer>, mut multipart: Multipart) -> Response {
    wait_if_held(&state.hold, Operation::Upload).await;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        state.uploads.lock().await.push(RecordedUpload {
            field: name,
            file_name,
            content_type,
            bytes,
        });
    }
    let count = state.uploads.lock().await.len();
    state
        .reference_reply(Operation::Upload, format!("uploads/{count}"))
        .await
}

async fn handle_process(
    State(state): State<FakeServer>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    wait_if_held(&state.hold, Operation::ApplyEdits).await;
    let count = {
        let mut transforms = state.transforms.lock().await;
        transforms.push(body);
        transforms.len()
    };
    state
        .reference_reply(Operation::ApplyEdits, format!("processed/{count}.jpeg"))
        .await
}

async fn handle_download(
    State(state): State<FakeServer>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    wait_if_held(&state.hold, Operation::Export).await;
    let payload = format!(
        "image:{}:{}",
        body["filePath"].as_str().unwrap_or_default(),
        body["format"].as_str().unwrap_or_default()
    );
    state.exports.lock().await.push(body);
    match state.reply_for(Operation::Export).await {
        Reply::Ok => payload.into_response(),
        Reply::Status(status) => status_reply(status),
        Reply::Empty | Reply::MissingReference | Reply::NotJson => {
            StatusCode::OK.into_response()
        }
    }
}

/// Serves the fake on an ephemeral port and returns its base url.
pub(crate) async fn spawn_fake_server() -> (String, FakeServer) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = FakeServer::default();
    let app = Router::new()
        .route("/upload", post(handle_upload))
        .route("/process", post(handle_process))
        .route("/download", post(handle_download))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}
