//! 平台服务事件入口（账户/用户删除）。
//!
//! - POST /events/service
//!
//! 调用方上下文由 hook_auth 注入，需具备对应的 DEVICE_CONNECTION 权限。

use crate::AppState;
use crate::utils::response::registry_error;
use crate::utils::normalize_required;
use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{ScopeContext, ServiceEvent};

pub async fn service_event(
    State(state): State<AppState>,
    Extension(caller): Extension<ScopeContext>,
    Json(event): Json<ServiceEvent>,
) -> Response {
    if let Err(response) = normalize_required(event.entity_id.clone(), "entity_id") {
        return response;
    }
    match state.connections.on_service_event(&caller, &event).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => registry_error(err),
    }
}
