//! HTTP Surface — the `axum` router binding `/analyze`, `/result/{id}`,
//! `/health`, `/ready`, and `/metrics` to a `Gateway`.
//!
//! Mirrors the `http_server` input module's router construction:
//! `Router::new().route(...).with_state(Arc<_>)`, plus an optional CORS
//! layer.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::data::AnalyzeRequest;
use crate::error::AdmissionError;
use crate::lifecycle::Gateway;

/// Build the router. `cors_enabled` mirrors the `cors_enabled` config
/// flag on the `http_server` input module.
pub fn router(gateway: Arc<Gateway>, cors_enabled: bool) -> Router {
    let mut app = Router::new()
        .route("/analyze", post(analyze_handler))
        .route("/result/:request_id", get(result_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(gateway);

    if cors_enabled {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app
}

async fn analyze_handler(
    State(gateway): State<Arc<Gateway>>,
    Json(req): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    match gateway.admit(req).await {
        Ok(resp) => (StatusCode::OK, Json(json!(resp))),
        Err(e @ AdmissionError::EmptyInput) => {
            (StatusCode::BAD_REQUEST, Json(json!({"error": e.code()})))
        }
        Err(e @ AdmissionError::Overloaded) => {
            (StatusCode::TOO_MANY_REQUESTS, Json(json!({"error": e.code()})))
        }
    }
}

async fn result_handler(
    State(gateway): State<Arc<Gateway>>,
    Path(request_id): Path<String>,
) -> impl IntoResponse {
    match gateway.result(&request_id) {
        Some(record) => (StatusCode::OK, Json(json!(record))),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "not_found"}))),
    }
}

async fn health_handler(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "queue_size": gateway.queue.size(),
        "workers": gateway.total_workers(),
    }))
}

async fn ready_handler(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    let alive = gateway.workers_alive();
    let total = gateway.total_workers();
    let status = if alive > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "ready": alive > 0,
            "workers_alive": alive,
            "total_workers": total,
        })),
    )
}

async fn metrics_handler(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    crate::metrics::set_queue_size(gateway.queue.size());
    crate::metrics::set_in_flight(gateway.dispatcher.in_flight());
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gateway.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Duration;

    fn test_config() -> Config {
        Config {
            max_queue_size: 10,
            worker_count: 2,
            backpressure_threshold: 0.9,
            batch_size: 4,
            batch_timeout: Duration::from_millis(50),
            max_inflight: 1,
            cache_ttl: Duration::from_secs(60),
            cache_capacity: 100,
            port: 0,
            llm_url: "http://127.0.0.1:1".to_string(),
            llm_model: "test-model".to_string(),
            llm_api_key: "test-key".to_string(),
        }
    }

    #[tokio::test]
    async fn health_reports_queue_size_and_worker_count() {
        let gateway = Arc::new(Gateway::new(test_config()));
        let resp = health_handler(State(gateway)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_is_false_with_no_live_workers() {
        let gateway = Arc::new(Gateway::new(test_config()));
        let resp = ready_handler(State(gateway)).await.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn result_for_unknown_id_is_404() {
        let gateway = Arc::new(Gateway::new(test_config()));
        let resp = result_handler(State(gateway), Path("missing".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn analyze_rejects_empty_body_fields() {
        let gateway = Arc::new(Gateway::new(test_config()));
        let req = AnalyzeRequest {
            title: String::new(),
            abstract_: String::new(),
            text: String::new(),
            url: String::new(),
        };
        let resp = analyze_handler(State(gateway), Json(req))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
