//! Status API router and handlers.
//!
//! A thin read/trigger veneer over the watchdog primitives: every request
//! re-samples or re-probes the host directly and tail-reads the incident
//! log file. Nothing here shares in-memory state with the monitor loop.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use hostwatch_core::{
    probe_all, IncidentLog, MetricsSource, Remediator, ServiceProbe, WatchdogConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// How much of the incident log a tail read returns.
const INCIDENT_TAIL_LINES: usize = 20;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<WatchdogConfig>,
    pub sampler: Arc<dyn MetricsSource>,
    pub probe: Arc<dyn ServiceProbe>,
    pub remediator: Arc<dyn Remediator>,
    pub incidents: IncidentLog,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize, Deserialize)]
struct MetricsResponse {
    cpu: f32,
    ram: f32,
    disk: f32,
}

#[derive(Serialize, Deserialize)]
struct RestartRequest {
    name: String,
}

#[derive(Serialize, Deserialize)]
struct RestartResponse {
    status: String,
    service: String,
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/incidents", get(incidents_handler))
        .route("/api/services", get(services_handler))
        .route("/api/service/restart", post(restart_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn serve(state: ApiState, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("status API listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Fresh snapshot on every request; nothing is cached from the loop.
async fn metrics_handler(State(state): State<ApiState>) -> Json<MetricsResponse> {
    let sample = state.sampler.sample();
    Json(MetricsResponse {
        cpu: sample.cpu_percent,
        ram: sample.ram_percent,
        disk: sample.disk_percent,
    })
}

/// Last lines of the incident log, oldest first. A missing or unreadable
/// log reads as empty rather than producing an error response.
async fn incidents_handler(State(state): State<ApiState>) -> Json<Vec<String>> {
    let lines = state
        .incidents
        .tail(INCIDENT_TAIL_LINES)
        .unwrap_or_else(|err| {
            warn!(error = %err, "incident log tail failed");
            Vec::new()
        });
    Json(lines)
}

/// Re-probes every configured service; probe failures surface as
/// "unknown", never as a missing entry.
async fn services_handler(State(state): State<ApiState>) -> Json<BTreeMap<String, String>> {
    let states = probe_all(state.probe.as_ref(), &state.config.services)
        .await
        .into_iter()
        .map(|status| (status.name, status.state.as_str().to_string()))
        .collect();
    Json(states)
}

/// Manual restart trigger. Accepts any service name, monitored or not;
/// the response acknowledges the attempt, and callers watch /api/services
/// for the result.
async fn restart_handler(
    State(state): State<ApiState>,
    Json(request): Json<RestartRequest>,
) -> Json<RestartResponse> {
    let result = state.remediator.restart_service(&request.name).await;
    if !result.succeeded() {
        warn!(
            service = %request.name,
            detail = result.detail.as_deref().unwrap_or(""),
            "manual restart failed"
        );
    }
    Json(RestartResponse {
        status: "restarted".to_string(),
        service: request.name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::Utc;
    use hostwatch_core::{
        MetricSample, RemediationOutcome, RemediationResult, Severity, ServiceState, Thresholds,
    };
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use tower::ServiceExt;

    struct FixedSampler;

    impl MetricsSource for FixedSampler {
        fn sample(&self) -> MetricSample {
            MetricSample {
                timestamp: Utc::now(),
                cpu_percent: 12.5,
                ram_percent: 40.0,
                disk_percent: 55.0,
            }
        }
    }

    struct FixedProbe;

    #[async_trait]
    impl ServiceProbe for FixedProbe {
        async fn status(&self, service: &str) -> ServiceState {
            match service {
                "nginx" => ServiceState::Active,
                "ssh" => ServiceState::Inactive,
                _ => ServiceState::Unknown,
            }
        }
    }

    #[derive(Default)]
    struct RecordingRemediator {
        restarts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Remediator for RecordingRemediator {
        async fn restart_service(&self, service: &str) -> RemediationResult {
            self.restarts.lock().push(service.to_string());
            RemediationResult {
                action: "restart".to_string(),
                target: service.to_string(),
                outcome: RemediationOutcome::Success,
                detail: None,
            }
        }

        async fn clean_scratch(&self) -> RemediationResult {
            RemediationResult {
                action: "clean".to_string(),
                target: "/tmp".to_string(),
                outcome: RemediationOutcome::Success,
                detail: None,
            }
        }
    }

    fn test_state(dir: &tempfile::TempDir) -> (ApiState, Arc<RecordingRemediator>) {
        let config = Arc::new(WatchdogConfig {
            services: vec!["nginx".to_string(), "ssh".to_string(), "mysql".to_string()],
            thresholds: Thresholds {
                cpu: 90.0,
                ram: 90.0,
                disk: 90.0,
            },
            interval: 1,
            log_dir: dir.path().to_path_buf(),
            scratch_dir: PathBuf::from("/tmp"),
            mount_point: PathBuf::from("/"),
            command_timeout: 5,
        });
        let remediator = Arc::new(RecordingRemediator::default());
        let state = ApiState {
            config: config.clone(),
            sampler: Arc::new(FixedSampler),
            probe: Arc::new(FixedProbe),
            remediator: remediator.clone(),
            incidents: IncidentLog::new(config.incident_log_path()),
        };
        (state, remediator)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn metrics_returns_a_fresh_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir);

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let metrics: MetricsResponse = body_json(response).await;
        assert_eq!(metrics.cpu, 12.5);
        assert_eq!(metrics.ram, 40.0);
        assert_eq!(metrics.disk, 55.0);
    }

    #[tokio::test]
    async fn incidents_is_empty_when_the_log_does_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir);

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/incidents")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let lines: Vec<String> = body_json(response).await;
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn incidents_returns_at_most_twenty_lines_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir);
        for i in 0..25 {
            state
                .incidents
                .append(Severity::Warning, &format!("event {}", i))
                .unwrap();
        }

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/incidents")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let lines: Vec<String> = body_json(response).await;
        assert_eq!(lines.len(), 20);
        assert!(lines[0].ends_with("event 5"));
        assert!(lines[19].ends_with("event 24"));
    }

    #[tokio::test]
    async fn services_reports_every_configured_name() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir);

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/services")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let states: BTreeMap<String, String> = body_json(response).await;
        assert_eq!(states.len(), 3);
        assert_eq!(states["nginx"], "active");
        assert_eq!(states["ssh"], "inactive");
        // A probe the service manager cannot answer still yields an entry.
        assert_eq!(states["mysql"], "unknown");
    }

    #[tokio::test]
    async fn restart_delegates_and_acknowledges() {
        let dir = tempfile::tempdir().unwrap();
        let (state, remediator) = test_state(&dir);

        // Any name is accepted, monitored or not.
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/service/restart")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name":"redis"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let ack: RestartResponse = body_json(response).await;
        assert_eq!(ack.status, "restarted");
        assert_eq!(ack.service, "redis");
        assert_eq!(*remediator.restarts.lock(), vec!["redis".to_string()]);
    }

    #[tokio::test]
    async fn restart_without_a_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (state, remediator) = test_state(&dir);

        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/service/restart")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        assert!(remediator.restarts.lock().is_empty());
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir);

        let response = router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
