//! 健康检查：返回已加载的协议描述符。

use crate::AppState;
use api_contract::{ApiResponse, HealthDto};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let dto = HealthDto {
        ok: true,
        protocols: state
            .descriptors
            .protocols()
            .into_iter()
            .map(str::to_string)
            .collect(),
        default_descriptor: state.descriptors.has_default(),
    };
    (StatusCode::OK, Json(ApiResponse::success(dto)))
}
