use facebridge_core::{
    Credentials, DetectedFace, ExtractPurpose, FaceError, FaceFacade, FacadeStatus, Gender,
};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Rejection code for requests the engine thread can no longer answer.
pub const ENGINE_GONE: &str = "ENGINE_GONE";

/// Pending requests buffered ahead of the engine thread.
const QUEUE_DEPTH: usize = 4;

/// A failed request, as seen by the host.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct Rejection {
    pub code: &'static str,
    pub message: String,
}

impl Rejection {
    fn engine_gone() -> Self {
        Self {
            code: ENGINE_GONE,
            message: "engine thread exited".into(),
        }
    }
}

impl From<FaceError> for Rejection {
    fn from(err: FaceError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, Rejection>>;

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    Initialize {
        credentials: Credentials,
        reply: Reply<bool>,
    },
    Shutdown {
        reply: Reply<bool>,
    },
    Detect {
        path: PathBuf,
        reply: Reply<Vec<DetectedFace>>,
    },
    Extract {
        path: PathBuf,
        purpose: ExtractPurpose,
        reply: Reply<String>,
    },
    Compare {
        first: String,
        second: String,
        reply: Reply<f32>,
    },
    Liveness {
        path: PathBuf,
        reply: Reply<bool>,
    },
    Age {
        path: PathBuf,
        reply: Reply<i32>,
    },
    Gender {
        path: PathBuf,
        reply: Reply<Gender>,
    },
    Status {
        reply: oneshot::Sender<FacadeStatus>,
    },
    /// Release the engine and stop the thread.
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn call<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> EngineRequest,
    ) -> Result<T, Rejection> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| Rejection::engine_gone())?;
        reply_rx.await.map_err(|_| Rejection::engine_gone())?
    }

    pub async fn initialize(&self, credentials: Credentials) -> Result<bool, Rejection> {
        self.call(|reply| EngineRequest::Initialize { credentials, reply })
            .await
    }

    pub async fn shutdown(&self) -> Result<bool, Rejection> {
        self.call(|reply| EngineRequest::Shutdown { reply }).await
    }

    pub async fn detect_faces(&self, path: PathBuf) -> Result<Vec<DetectedFace>, Rejection> {
        self.call(|reply| EngineRequest::Detect { path, reply }).await
    }

    pub async fn extract_feature(
        &self,
        path: PathBuf,
        purpose: ExtractPurpose,
    ) -> Result<String, Rejection> {
        self.call(|reply| EngineRequest::Extract {
            path,
            purpose,
            reply,
        })
        .await
    }

    pub async fn compare_features(&self, first: String, second: String) -> Result<f32, Rejection> {
        self.call(|reply| EngineRequest::Compare {
            first,
            second,
            reply,
        })
        .await
    }

    pub async fn check_liveness(&self, path: PathBuf) -> Result<bool, Rejection> {
        self.call(|reply| EngineRequest::Liveness { path, reply }).await
    }

    pub async fn estimate_age(&self, path: PathBuf) -> Result<i32, Rejection> {
        self.call(|reply| EngineRequest::Age { path, reply }).await
    }

    pub async fn estimate_gender(&self, path: PathBuf) -> Result<Gender, Rejection> {
        self.call(|reply| EngineRequest::Gender { path, reply }).await
    }

    pub async fn status(&self) -> Result<FacadeStatus, Rejection> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Status { reply: reply_tx })
            .await
            .map_err(|_| Rejection::engine_gone())?;
        reply_rx.await.map_err(|_| Rejection::engine_gone())
    }

    /// Release the engine and stop the thread. Later requests are rejected
    /// with [`ENGINE_GONE`].
    pub async fn close(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(EngineRequest::Close { reply: reply_tx }).await.is_ok() {
            let _ = reply_rx.await;
        }
    }
}

/// Spawn the facade on a dedicated OS thread.
///
/// The facade blocks on decoding and inference, so it never runs on the
/// async runtime. The thread exits on [`EngineHandle::close`] or when every
/// handle is dropped, releasing the engine either way.
pub fn spawn_engine(facade: FaceFacade) -> std::io::Result<EngineHandle> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(QUEUE_DEPTH);

    std::thread::Builder::new()
        .name("facebridge-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                if let ControlFlow::Stop = handle_request(&facade, req) {
                    break;
                }
            }
            if let Err(err) = facade.shutdown() {
                tracing::warn!(error = %err, "engine release on exit failed");
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

enum ControlFlow {
    Continue,
    Stop,
}

fn handle_request(facade: &FaceFacade, req: EngineRequest) -> ControlFlow {
    match req {
        EngineRequest::Initialize { credentials, reply } => {
            let result = facade.initialize(&credentials).map(|()| true);
            respond("initialize", reply, result);
        }
        EngineRequest::Shutdown { reply } => {
            respond("shutdown", reply, facade.shutdown().map(|()| true));
        }
        EngineRequest::Detect { path, reply } => {
            respond("detect_faces", reply, facade.detect_faces(&path));
        }
        EngineRequest::Extract {
            path,
            purpose,
            reply,
        } => {
            respond("extract_feature", reply, facade.extract_feature(&path, purpose));
        }
        EngineRequest::Compare {
            first,
            second,
            reply,
        } => {
            respond("compare_features", reply, facade.compare_features(&first, &second));
        }
        EngineRequest::Liveness { path, reply } => {
            respond("check_liveness", reply, facade.check_liveness(&path));
        }
        EngineRequest::Age { path, reply } => {
            respond("estimate_age", reply, facade.estimate_age(&path));
        }
        EngineRequest::Gender { path, reply } => {
            respond("estimate_gender", reply, facade.estimate_gender(&path));
        }
        EngineRequest::Status { reply } => {
            let _ = reply.send(facade.status());
        }
        EngineRequest::Close { reply } => {
            if let Err(err) = facade.shutdown() {
                tracing::warn!(error = %err, "engine release on close failed");
            }
            let _ = reply.send(());
            return ControlFlow::Stop;
        }
    }
    ControlFlow::Continue
}

fn respond<T>(operation: &'static str, reply: Reply<T>, result: Result<T, FaceError>) {
    let result = result.map_err(|err| {
        tracing::warn!(operation, code = err.code(), error = %err, "request rejected");
        Rejection::from(err)
    });
    if reply.send(result).is_err() {
        tracing::debug!(operation, "caller went away before the reply");
    }
}
