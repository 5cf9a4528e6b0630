use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use rentatool_core::catalog::SnapshotStore;

use crate::refresh::CatalogStatus;

#[derive(Clone)]
pub struct HealthState {
    snapshots: Arc<SnapshotStore>,
    status: Arc<CatalogStatus>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub catalog: HealthCheck,
    pub checked_at: String,
}

pub fn router(snapshots: Arc<SnapshotStore>, status: Arc<CatalogStatus>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { snapshots, status })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    snapshots: Arc<SnapshotStore>,
    status: Arc<CatalogStatus>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(bind_address = %address, "health endpoint started");

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(snapshots, status)).await {
            error!(error = %error, "health endpoint server terminated unexpectedly");
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let catalog = catalog_check(&state);
    let ready = catalog.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "rentatool-server runtime initialized".to_string(),
        },
        catalog,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn catalog_check(state: &HealthState) -> HealthCheck {
    let snapshot = state.snapshots.load();
    let view = state.status.view();

    if snapshot.is_empty() {
        let detail = view
            .last_error
            .unwrap_or_else(|| "catalog snapshot is empty".to_string());
        return HealthCheck { status: "degraded", detail };
    }

    let refreshed = view
        .last_success
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    HealthCheck {
        status: "ready",
        detail: format!("{} records, refreshed at {refreshed}", snapshot.record_count()),
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};

    use super::*;
    use rentatool_core::catalog::{CatalogSnapshot, RawTable, SnapshotBuilder, TierSchedule};

    fn empty_state() -> HealthState {
        let schedule = TierSchedule::new(vec![1, 3, 7]).expect("schedule");
        HealthState {
            snapshots: Arc::new(SnapshotStore::new(CatalogSnapshot::empty(schedule))),
            status: Arc::new(CatalogStatus::default()),
        }
    }

    fn loaded_state() -> HealthState {
        let headers =
            ["tool", "brand", "model", "price_1d", "price_3d", "price_7d"].map(str::to_string);
        let rows =
            vec![["Drill", "BrandX", "ModelY", "100", "80", "60"].map(str::to_string).to_vec()];
        let snapshot = SnapshotBuilder::new(5.0)
            .build(&RawTable::new(headers.to_vec(), rows))
            .expect("snapshot");
        HealthState {
            snapshots: Arc::new(SnapshotStore::new(snapshot)),
            status: Arc::new(CatalogStatus::default()),
        }
    }

    #[tokio::test]
    async fn health_returns_ready_when_a_catalog_is_loaded() {
        let (status, Json(payload)) = health(State(loaded_state())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.catalog.status, "ready");
        assert_eq!(payload.service.status, "ready");
        assert!(payload.catalog.detail.contains("1 records"));
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_the_catalog_is_empty() {
        let (status, Json(payload)) = health(State(empty_state())).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.catalog.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
