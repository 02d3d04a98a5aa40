//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：auth_error, bad_request_error, forbidden_error, broker_error, registry_error
//! - DTO 转换：connection_to_dto, outcome_to_dto
//!
//! 所有错误返回统一的 ApiResponse 格式；连接回调出错时 Broker 一律拒绝握手。

use api_contract::{ApiResponse, ConnectResponseDto, DeviceConnectionDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use kapua_auth::AuthError;
use kapua_broker::{BrokerError, ConnectOutcome, ResolverError};
use kapua_registry::RegistryError;
use kapua_storage::DeviceConnection;

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::error(code, message.into()))).into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, "INVALID.REQUEST", message)
}

/// 认证错误响应
pub fn auth_error(status: StatusCode) -> Response {
    error_response(status, "AUTH.UNAUTHORIZED", "unauthorized")
}

/// 禁止访问错误响应
pub fn forbidden_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::FORBIDDEN, "AUTH.FORBIDDEN", message)
}

/// 注册表错误响应
pub fn registry_error(err: RegistryError) -> Response {
    match &err {
        RegistryError::Auth(AuthError::PermissionDenied { .. }) => {
            forbidden_error(err.to_string())
        }
        RegistryError::InvalidArgument(_) => bad_request_error(err.to_string()),
        RegistryError::Storage(storage) if storage.is_unavailable() => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "STORE.UNAVAILABLE",
            err.to_string(),
        ),
        RegistryError::Storage(storage) if storage.is_conflict() => {
            error_response(StatusCode::CONFLICT, "STORE.CONFLICT", err.to_string())
        }
        _ => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL.ERROR",
            err.to_string(),
        ),
    }
}

/// Broker 回调错误响应
pub fn broker_error(err: BrokerError) -> Response {
    match err {
        BrokerError::Unavailable { .. } => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "STORE.UNAVAILABLE",
            err.to_string(),
        ),
        BrokerError::Registry(err) | BrokerError::Resolver(ResolverError::Registry(err)) => {
            registry_error(err)
        }
        BrokerError::Resolver(ResolverError::Auth(err)) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL.ERROR",
            err.to_string(),
        ),
        BrokerError::Config(_)
        | BrokerError::UnknownResolver(_)
        | BrokerError::BrokerAddressUnavailable
        | BrokerError::Descriptor(_) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "CONFIG.ERROR",
            err.to_string(),
        ),
    }
}

/// DeviceConnection 转 DeviceConnectionDto
pub fn connection_to_dto(record: DeviceConnection) -> DeviceConnectionDto {
    DeviceConnectionDto {
        id: record.id,
        scope_id: record.scope_id,
        client_id: record.client_id,
        status: record.status.as_str().to_string(),
        user_id: record.user_id,
        protocol: record.protocol,
        client_ip: record.client_ip,
        server_ip: record.server_ip,
        modified_on: record.audit.modified_on_ms,
        optlock: record.audit.optlock,
    }
}

/// ConnectOutcome 转 ConnectResponseDto
pub fn outcome_to_dto(outcome: ConnectOutcome) -> ConnectResponseDto {
    ConnectResponseDto {
        authorized: outcome.authorized,
        broker_address: outcome.broker_address,
        deny_reason: outcome.deny_reason.map(|reason| reason.as_str().to_string()),
        transport_protocol: outcome
            .descriptor
            .as_ref()
            .map(|descriptor| descriptor.transport_protocol().to_string()),
        connection_id: outcome.connection.map(|connection| connection.id),
    }
}
