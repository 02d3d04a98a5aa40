use api_contract::{
    ConnectRequestDto, ConnectResponseDto, DeviceConnectionDto, DisconnectRequestDto,
    DisconnectResponseDto, MetricsSnapshotDto,
};
use serde_json::Value;

#[test]
fn connect_request_accepts_camel_case() {
    let payload = r#"{"scopeId":"42","clientId":"dev-1","userId":"u-1","protocol":"MQTT","trustKey":"k"}"#;
    let req: ConnectRequestDto = serde_json::from_str(payload).expect("parse");
    assert_eq!(req.scope_id, "42");
    assert_eq!(req.client_id, "dev-1");
    assert_eq!(req.user_id, "u-1");
    assert_eq!(req.protocol.as_deref(), Some("MQTT"));
    assert_eq!(req.trust_key.as_deref(), Some("k"));
    assert!(req.client_ip.is_none());
}

#[test]
fn connect_request_accepts_snake_case() {
    let payload = r#"{"scope_id":"42","client_id":"dev-1","user_id":"u-1","client_ip":"10.0.0.5"}"#;
    let req: ConnectRequestDto = serde_json::from_str(payload).expect("parse");
    assert_eq!(req.client_id, "dev-1");
    assert_eq!(req.client_ip.as_deref(), Some("10.0.0.5"));
    assert!(req.protocol.is_none());
    assert!(req.trust_key.is_none());
}

#[test]
fn connect_request_requires_client_id() {
    let payload = r#"{"scopeId":"42","userId":"u-1"}"#;
    assert!(serde_json::from_str::<ConnectRequestDto>(payload).is_err());
}

#[test]
fn connect_response_is_camel_case() {
    let response = ConnectResponseDto {
        authorized: false,
        broker_address: None,
        deny_reason: Some("USER_MISMATCH".to_string()),
        transport_protocol: Some("MQTT".to_string()),
        connection_id: None,
    };
    let value = serde_json::to_value(response).expect("serialize");
    assert_eq!(value.get("authorized"), Some(&Value::Bool(false)));
    assert_eq!(
        value.get("denyReason").and_then(Value::as_str),
        Some("USER_MISMATCH")
    );
    assert!(value.get("brokerAddress").is_some());
    assert!(value.get("transportProtocol").is_some());
    assert!(value.get("deny_reason").is_none());
}

#[test]
fn disconnect_request_accepts_both_cases() {
    let camel: DisconnectRequestDto =
        serde_json::from_str(r#"{"scopeId":"1","clientId":"a"}"#).expect("parse");
    let snake: DisconnectRequestDto =
        serde_json::from_str(r#"{"scope_id":"1","client_id":"a"}"#).expect("parse");
    assert_eq!(camel.client_id, snake.client_id);
    assert_eq!(camel.scope_id, snake.scope_id);
}

#[test]
fn disconnect_response_nests_connection() {
    let response = DisconnectResponseDto {
        connection: Some(DeviceConnectionDto {
            id: "c-1".to_string(),
            scope_id: "42".to_string(),
            client_id: "dev-1".to_string(),
            status: "DISCONNECTED".to_string(),
            user_id: "u-1".to_string(),
            protocol: Some("MQTT".to_string()),
            client_ip: None,
            server_ip: None,
            modified_on: 1_700_000_000_000,
            optlock: 2,
        }),
    };
    let value = serde_json::to_value(response).expect("serialize");
    let connection = value.get("connection").expect("connection");
    assert_eq!(
        connection.get("clientId").and_then(Value::as_str),
        Some("dev-1")
    );
    assert_eq!(connection.get("optlock").and_then(Value::as_i64), Some(2));
    assert!(connection.get("modifiedOn").is_some());
}

#[test]
fn metrics_snapshot_is_camel_case() {
    let dto = MetricsSnapshotDto {
        connects_accepted: 1,
        connects_denied: 2,
        connects_failed: 0,
        disconnects: 1,
        cache_hits: 3,
        cache_misses: 1,
        reservation_conflicts: 0,
        optimistic_lock_retries: 0,
        connect_latency_ms_total: 12,
        connect_latency_ms_count: 3,
    };
    let value = serde_json::to_value(dto).expect("serialize");
    assert_eq!(value.get("connectsDenied").and_then(Value::as_u64), Some(2));
    assert!(value.get("connectLatencyMsTotal").is_some());
}
