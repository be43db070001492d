use axum::{
    Json, Router,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use std::sync::Arc;

use super::protocol::{
    ENDPOINT_CONFIGURE, ENDPOINT_DISPATCH, ENDPOINT_PAUSE, ENDPOINT_REPORT_DONE,
    ENDPOINT_REPORT_ISSUES, ENDPOINT_RESUME, ENDPOINT_SET_MASTER, ENDPOINT_SHUTDOWN,
    ENDPOINT_SITREP, ENDPOINT_STATUS, ENDPOINT_UPDATE_ELEMENTS, INSTANCE_TOKEN_HEADER,
    ReportDoneRequest, ReportIssuesRequest, ReportResponse, SetMasterRequest, SitrepRequest,
    StatusResponse, UpdateElementsRequest,
};
use crate::config::ScanOptions;
use crate::coordinator::Coordinator;
use crate::workload::partitioner::Partition;

type Reply = (StatusCode, Json<ReportResponse>);

fn reply(accepted: bool) -> Reply {
    (StatusCode::OK, Json(ReportResponse { accepted }))
}

/// Worker-side calls must carry this node's own instance token.
fn instance_authorized(coordinator: &Coordinator, headers: &HeaderMap) -> bool {
    let ok = headers
        .get(INSTANCE_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|token| token == coordinator.instance_token());
    if !ok {
        tracing::warn!("Rejected worker-side call: bad instance token");
    }
    ok
}

fn unauthorized() -> Reply {
    (
        StatusCode::UNAUTHORIZED,
        Json(ReportResponse { accepted: false }),
    )
}

// --- Master endpoints ---

pub async fn handle_report_done(
    Extension(coordinator): Extension<Arc<Coordinator>>,
    Json(req): Json<ReportDoneRequest>,
) -> Reply {
    reply(coordinator.report_done(&req.url, &req.token).await)
}

pub async fn handle_report_issues(
    Extension(coordinator): Extension<Arc<Coordinator>>,
    Json(req): Json<ReportIssuesRequest>,
) -> Reply {
    reply(coordinator.report_issues(req.issues, &req.token).await)
}

pub async fn handle_update_elements(
    Extension(coordinator): Extension<Arc<Coordinator>>,
    Json(req): Json<UpdateElementsRequest>,
) -> Reply {
    reply(coordinator.update_elements(req.elements, &req.token).await)
}

pub async fn handle_sitrep(
    Extension(coordinator): Extension<Arc<Coordinator>>,
    Json(req): Json<SitrepRequest>,
) -> Reply {
    reply(coordinator.report_sitrep(req.data, &req.url, &req.token).await)
}

// --- Worker endpoints ---

pub async fn handle_set_master(
    Extension(coordinator): Extension<Arc<Coordinator>>,
    headers: HeaderMap,
    Json(req): Json<SetMasterRequest>,
) -> Reply {
    if !instance_authorized(&coordinator, &headers) {
        return unauthorized();
    }
    reply(coordinator.accept_master(req.into()).await)
}

pub async fn handle_configure(
    Extension(coordinator): Extension<Arc<Coordinator>>,
    headers: HeaderMap,
    Json(options): Json<ScanOptions>,
) -> Reply {
    if !instance_authorized(&coordinator, &headers) {
        return unauthorized();
    }
    coordinator.configure(options).await;
    reply(true)
}

pub async fn handle_dispatch(
    Extension(coordinator): Extension<Arc<Coordinator>>,
    headers: HeaderMap,
    Json(assignment): Json<Partition>,
) -> Reply {
    if !instance_authorized(&coordinator, &headers) {
        return unauthorized();
    }
    reply(coordinator.accept_assignment(assignment).await)
}

pub async fn handle_shutdown(
    Extension(coordinator): Extension<Arc<Coordinator>>,
    headers: HeaderMap,
) -> Reply {
    if !instance_authorized(&coordinator, &headers) {
        return unauthorized();
    }
    tracing::info!("Shutdown requested by master");
    coordinator.request_shutdown();
    reply(true)
}

// --- Operator endpoints ---

pub async fn handle_status(
    Extension(coordinator): Extension<Arc<Coordinator>>,
) -> (StatusCode, Json<StatusResponse>) {
    (StatusCode::OK, Json(coordinator.status().await))
}

pub async fn handle_pause(Extension(coordinator): Extension<Arc<Coordinator>>) -> Reply {
    coordinator.pause();
    reply(true)
}

pub async fn handle_resume(Extension(coordinator): Extension<Arc<Coordinator>>) -> Reply {
    coordinator.resume();
    reply(true)
}

/// Every route a node serves, bound to `coordinator`.
pub fn router(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route(ENDPOINT_REPORT_DONE, post(handle_report_done))
        .route(ENDPOINT_REPORT_ISSUES, post(handle_report_issues))
        .route(ENDPOINT_UPDATE_ELEMENTS, post(handle_update_elements))
        .route(ENDPOINT_SITREP, post(handle_sitrep))
        .route(ENDPOINT_SET_MASTER, post(handle_set_master))
        .route(ENDPOINT_CONFIGURE, post(handle_configure))
        .route(ENDPOINT_DISPATCH, post(handle_dispatch))
        .route(ENDPOINT_SHUTDOWN, post(handle_shutdown))
        .route(ENDPOINT_STATUS, get(handle_status))
        .route(ENDPOINT_PAUSE, post(handle_pause))
        .route(ENDPOINT_RESUME, post(handle_resume))
        .layer(Extension(coordinator))
}
