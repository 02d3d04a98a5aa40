//! 稳定的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// Broker 连接回调请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequestDto {
    #[serde(alias = "scope_id")]
    pub scope_id: String,
    #[serde(alias = "client_id")]
    pub client_id: String,
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default, alias = "trust_key")]
    pub trust_key: Option<String>,
    #[serde(default, alias = "client_ip")]
    pub client_ip: Option<String>,
    #[serde(default, alias = "server_ip")]
    pub server_ip: Option<String>,
}

/// Broker 连接回调响应体。
///
/// 拒绝时 `authorized = false`，`denyReason` 给出原因。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponseDto {
    pub authorized: bool,
    pub broker_address: Option<String>,
    pub deny_reason: Option<String>,
    pub transport_protocol: Option<String>,
    pub connection_id: Option<String>,
}

/// Broker 断开回调请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectRequestDto {
    #[serde(alias = "scope_id")]
    pub scope_id: String,
    #[serde(alias = "client_id")]
    pub client_id: String,
}

/// Broker 断开回调响应体；未知 client 时 `connection` 为空。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectResponseDto {
    pub connection: Option<DeviceConnectionDto>,
}

/// 设备连接视图。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConnectionDto {
    pub id: String,
    pub scope_id: String,
    pub client_id: String,
    pub status: String,
    pub user_id: String,
    pub protocol: Option<String>,
    pub client_ip: Option<String>,
    pub server_ip: Option<String>,
    pub modified_on: i64,
    pub optlock: i32,
}

/// 连接指标快照。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub connects_accepted: u64,
    pub connects_denied: u64,
    pub connects_failed: u64,
    pub disconnects: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub reservation_conflicts: u64,
    pub optimistic_lock_retries: u64,
    pub connect_latency_ms_total: u64,
    pub connect_latency_ms_count: u64,
}

/// 健康检查响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    pub ok: bool,
    pub protocols: Vec<String>,
    pub default_descriptor: bool,
}
