//! 连接指标快照。
//!
//! - GET /metrics

use api_contract::{ApiResponse, MetricsSnapshotDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use kapua_telemetry::metrics;

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    (
        StatusCode::OK,
        Json(ApiResponse::success(MetricsSnapshotDto {
            connects_accepted: snapshot.connects_accepted,
            connects_denied: snapshot.connects_denied,
            connects_failed: snapshot.connects_failed,
            disconnects: snapshot.disconnects,
            cache_hits: snapshot.cache_hits,
            cache_misses: snapshot.cache_misses,
            reservation_conflicts: snapshot.reservation_conflicts,
            optimistic_lock_retries: snapshot.optimistic_lock_retries,
            connect_latency_ms_total: snapshot.connect_latency_ms_total,
            connect_latency_ms_count: snapshot.connect_latency_ms_count,
        })),
    )
        .into_response()
}
