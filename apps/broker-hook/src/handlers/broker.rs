//! Broker 回调 handlers
//!
//! - POST /broker/connect - 连接握手判定（拒绝时 `authorized = false`）
//! - POST /broker/disconnect - 记录断开
//!
//! 判定失败（存储超时或故障）返回错误响应，Broker 据此拒绝握手。

use crate::AppState;
use crate::utils::response::{broker_error, connection_to_dto, outcome_to_dto};
use crate::utils::{normalize_optional, normalize_required};
use api_contract::{
    ApiResponse, ConnectRequestDto, DisconnectRequestDto, DisconnectResponseDto,
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use kapua_broker::ConnectRequest;

pub async fn broker_connect(
    State(state): State<AppState>,
    Json(req): Json<ConnectRequestDto>,
) -> Response {
    let request = match connect_request(req) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state.handler.on_connect(&request).await {
        Ok(outcome) => {
            let dto = outcome_to_dto(outcome);
            (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
        }
        Err(err) => broker_error(err),
    }
}

pub async fn broker_disconnect(
    State(state): State<AppState>,
    Json(req): Json<DisconnectRequestDto>,
) -> Response {
    let scope_id = match normalize_required(req.scope_id, "scopeId") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let client_id = match normalize_required(req.client_id, "clientId") {
        Ok(value) => value,
        Err(response) => return response,
    };
    match state.handler.on_disconnect(&scope_id, &client_id).await {
        Ok(connection) => {
            let dto = DisconnectResponseDto {
                connection: connection.map(connection_to_dto),
            };
            (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
        }
        Err(err) => broker_error(err),
    }
}

fn connect_request(req: ConnectRequestDto) -> Result<ConnectRequest, Response> {
    Ok(ConnectRequest {
        scope_id: normalize_required(req.scope_id, "scopeId")?,
        client_id: normalize_required(req.client_id, "clientId")?,
        user_id: normalize_required(req.user_id, "userId")?,
        // 协议名按原样传递（精确匹配，空串同样按名查找）
        protocol: req.protocol,
        trust_key: normalize_optional(req.trust_key),
        client_ip: normalize_optional(req.client_ip),
        server_ip: normalize_optional(req.server_ip),
    })
}
