use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone)]
struct HealthState {
    consumers: usize,
    failed: Arc<AtomicUsize>,
}

/// Simple health check endpoint
///
/// Returns 503 once any consumer has stopped with an error
async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    let failed = state.failed.load(Ordering::SeqCst);
    let (status, label) = if failed == 0 {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status,
        Json(json!({
            "status": label,
            "service": "consumer-worker",
            "consumers": state.consumers,
            "failed_consumers": failed,
        })),
    )
}

fn router(consumers: usize, failed: Arc<AtomicUsize>) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(HealthState { consumers, failed })
}

/// Start the health check HTTP server on `PORT` (default 8001)
///
/// # Errors
///
/// Returns an error if `PORT` is not a number or the server fails to bind
pub async fn start_health_server(
    consumers: usize,
    failed: Arc<AtomicUsize>,
    shutdown_token: CancellationToken,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from((
        [0, 0, 0, 0],
        std::env::var("PORT").map_or(Ok(8001), |p| p.parse())?,
    ));
    let listener = TcpListener::bind(addr).await?;
    info!("Health check server listening on {}", addr);

    axum::serve(listener, router(consumers, failed))
        .with_graceful_shutdown(async move {
            shutdown_token.cancelled().await;
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    async fn check(state: HealthState) -> (StatusCode, serde_json::Value) {
        let response = health(State(state)).await.into_response();
        let status = response.status();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = serde_json::from_slice(&body).expect("Body is not JSON");
        (status, body)
    }

    #[tokio::test]
    async fn test_health_reports_consumers() {
        let (status, body) = check(HealthState {
            consumers: 3,
            failed: Arc::new(AtomicUsize::new(0)),
        })
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "status": "healthy",
                "service": "consumer-worker",
                "consumers": 3,
                "failed_consumers": 0,
            })
        );
    }

    #[tokio::test]
    async fn test_failed_consumer_makes_health_unavailable() {
        let failed = Arc::new(AtomicUsize::new(0));
        let state = HealthState {
            consumers: 2,
            failed: Arc::clone(&failed),
        };

        failed.fetch_add(1, Ordering::SeqCst);
        let (status, body) = check(state).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["failed_consumers"], 1);
    }
}
