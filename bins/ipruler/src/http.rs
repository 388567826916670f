//! HTTP driver: `GET /health` and `POST /update`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ipruler::{Engine, Kernel};
use serde::Serialize;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared handler state.
pub struct AppState<K> {
    pub engine: Arc<Engine<K>>,
    /// Fatal errors are reported here; the process ends when one arrives.
    pub fatal: mpsc::Sender<anyhow::Error>,
}

impl<K> Clone for AppState<K> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            fatal: self.fatal.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Health {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct UpdateStatus {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl UpdateStatus {
    fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    fn failed(message: impl ToString) -> Self {
        Self {
            status: "failed",
            message: Some(message.to_string()),
        }
    }
}

pub fn router<K: Kernel + 'static>(state: AppState<K>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/update", post(update::<K>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Health> {
    Json(Health {
        message: "good, thank you for asking",
    })
}

async fn update<K: Kernel + 'static>(State(state): State<AppState<K>>, body: Bytes) -> Response {
    match state.engine.apply(body).await {
        Ok(report) => {
            info!(%report, "update applied");
            (StatusCode::OK, Json(UpdateStatus::ok())).into_response()
        }
        Err(e) if e.is_fatal() => {
            error!(error = %e, "update failed");
            let body = UpdateStatus::failed(&e);
            // The receiver only goes away while shutting down.
            let _ = state.fatal.send(e.into()).await;
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "update rejected");
            (StatusCode::BAD_REQUEST, Json(UpdateStatus::failed(e))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use ipruler::MemoryKernel;
    use ipruler::kernel::Op;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<Engine<MemoryKernel>>, mpsc::Receiver<anyhow::Error>) {
        let engine = Arc::new(Engine::new(MemoryKernel::new()));
        let (fatal, rx) = mpsc::channel(1);
        let router = router(AppState {
            engine: Arc::clone(&engine),
            fatal,
        });
        (router, engine, rx)
    }

    async fn post_update(router: Router, body: &'static str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::post("/update")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _, _) = app();
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["message"], "good, thank you for asking");
    }

    #[tokio::test]
    async fn test_update_ok() {
        let (router, engine, _) = app();
        let (status, json) =
            post_update(router, "rules:\n  - from: 10.0.0.1/32\n    table: 101\n").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({"status": "ok"}));
        assert_eq!(engine.kernel().current_rules().len(), 1);
    }

    #[tokio::test]
    async fn test_update_empty_is_rejected() {
        let (router, engine, _) = app();
        let (status, json) = post_update(router, "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], "failed");
        assert_eq!(
            json["message"],
            "The given config is parsed as an empty config. skipped"
        );
        assert!(engine.current().await.is_none());
    }

    #[tokio::test]
    async fn test_update_unresolvable_is_rejected() {
        let (router, _, mut rx) = app();
        let (status, json) = post_update(router, "rules:\n  - from: nope\n    table: 1\n").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], "failed");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_update_kernel_failure_signals_shutdown() {
        let (router, engine, mut rx) = app();
        engine.kernel().fail(Op::AddRule, libc::EPERM);
        let (status, json) =
            post_update(router, "rules:\n  - from: 10.0.0.1/32\n    table: 101\n").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["status"], "failed");
        assert!(rx.try_recv().is_ok());
    }
}
