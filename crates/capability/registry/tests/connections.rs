mod support;

use domain::permissions::{DEVICE_CONNECTION_INFO, DEVICE_CONNECTION_READ};
use domain::{ConnectionStatus, ScopeContext, ServiceEvent};
use kapua_registry::RegistryError;
use kapua_storage::{ConnectionCache, DeviceConnectionQuery};
use support::{broker, connect_event, fixture};

#[tokio::test]
async fn first_connect_creates_connection_with_open_option() {
    let fx = fixture();
    let connection = fx
        .connections
        .record_connect(&broker(), &connect_event("gw-01", "u-1"))
        .await
        .expect("connect");
    assert_eq!(connection.status, ConnectionStatus::Connected);
    assert_eq!(connection.audit.optlock, 0);

    let snapshot = fx
        .connections
        .find_by_client_id(&broker(), "1", "gw-01")
        .await
        .expect("find")
        .expect("snapshot");
    assert_eq!(snapshot.connection.id, connection.id);
    assert!(snapshot.option.reserved_user_id.is_none());
}

#[tokio::test]
async fn reconnect_updates_existing_connection() {
    let fx = fixture();
    let first = fx
        .connections
        .record_connect(&broker(), &connect_event("gw-01", "u-1"))
        .await
        .expect("connect");
    fx.connections
        .record_disconnect(&broker(), "1", "gw-01")
        .await
        .expect("disconnect");
    let again = fx
        .connections
        .record_connect(&broker(), &connect_event("gw-01", "u-2"))
        .await
        .expect("reconnect");
    assert_eq!(again.id, first.id);
    assert_eq!(again.user_id, "u-2");
    assert_eq!(again.status, ConnectionStatus::Connected);
    assert_eq!(again.audit.optlock, 2);
}

#[tokio::test]
async fn disconnect_unknown_client_returns_none() {
    let fx = fixture();
    let result = fx
        .connections
        .record_disconnect(&broker(), "1", "ghost")
        .await
        .expect("disconnect");
    assert!(result.is_none());
}

#[tokio::test]
async fn mark_missing_only_touches_connected() {
    let fx = fixture();
    fx.connections
        .record_connect(&broker(), &connect_event("gw-01", "u-1"))
        .await
        .expect("connect");
    let missing = fx
        .connections
        .mark_missing(&broker(), "1", "gw-01")
        .await
        .expect("missing")
        .expect("connection");
    assert_eq!(missing.status, ConnectionStatus::Missing);

    let unchanged = fx
        .connections
        .mark_missing(&broker(), "1", "gw-01")
        .await
        .expect("missing")
        .expect("connection");
    assert_eq!(unchanged.audit.optlock, missing.audit.optlock);
}

#[tokio::test]
async fn cache_reflects_latest_write() {
    let fx = fixture();
    fx.connections
        .record_connect(&broker(), &connect_event("gw-01", "u-1"))
        .await
        .expect("connect");
    fx.connections
        .record_disconnect(&broker(), "1", "gw-01")
        .await
        .expect("disconnect");
    let cached = fx
        .cache
        .get_by_client_id("1", "gw-01")
        .await
        .expect("cache")
        .expect("entry");
    assert_eq!(cached.connection.status, ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn find_resolves_audit_names() {
    let fx = fixture();
    let created = fx
        .connections
        .record_connect(&broker(), &connect_event("gw-01", "u-1"))
        .await
        .expect("connect");
    let found = fx
        .connections
        .find(&broker(), "1", &created.id)
        .await
        .expect("find")
        .expect("connection");
    assert_eq!(found.audit.created_by_name.as_deref(), Some("kapua-broker"));
    assert_eq!(found.audit.modified_by_name.as_deref(), Some("kapua-broker"));
}

#[tokio::test]
async fn read_requires_permission_in_scope() {
    let fx = fixture();
    let outsider = ScopeContext::new(
        "2",
        "u-9",
        Vec::new(),
        vec![DEVICE_CONNECTION_READ.to_string()],
    );
    let err = fx
        .connections
        .find_by_client_id(&outsider, "1", "gw-01")
        .await
        .expect_err("denied");
    assert!(matches!(err, RegistryError::Auth(_)));
}

#[tokio::test]
async fn query_and_count_by_status() {
    let fx = fixture();
    for client_id in ["gw-01", "gw-02", "gw-03"] {
        fx.connections
            .record_connect(&broker(), &connect_event(client_id, "u-1"))
            .await
            .expect("connect");
    }
    fx.connections
        .record_disconnect(&broker(), "1", "gw-02")
        .await
        .expect("disconnect");
    let connected = DeviceConnectionQuery::new("1").with_status(ConnectionStatus::Connected);
    assert_eq!(
        fx.connections
            .count(&broker(), &connected)
            .await
            .expect("count"),
        2
    );
    let items = fx
        .connections
        .query(&broker(), &connected)
        .await
        .expect("query");
    let client_ids: Vec<_> = items.iter().map(|item| item.client_id.as_str()).collect();
    assert_eq!(client_ids, vec!["gw-01", "gw-03"]);
}

#[tokio::test]
async fn delete_removes_connection_and_cache() {
    let fx = fixture();
    let created = fx
        .connections
        .record_connect(&broker(), &connect_event("gw-01", "u-1"))
        .await
        .expect("connect");
    fx.connections
        .delete(&broker(), "1", &created.id)
        .await
        .expect("delete");
    assert!(fx.cache.is_empty());
    let err = fx
        .connections
        .delete(&broker(), "1", &created.id)
        .await
        .expect_err("gone");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn account_delete_event_removes_scope_connections() {
    let fx = fixture();
    fx.connections
        .record_connect(&broker(), &connect_event("gw-01", "u-1"))
        .await
        .expect("connect");
    fx.connections
        .on_service_event(&broker(), &ServiceEvent::new("account", "delete", "0", "1"))
        .await
        .expect("event");
    assert!(
        fx.connections
            .find_by_client_id(&broker(), "1", "gw-01")
            .await
            .expect("find")
            .is_none()
    );
}

#[tokio::test]
async fn group_delete_event_is_ignored() {
    let fx = fixture();
    fx.connections
        .record_connect(&broker(), &connect_event("gw-01", "u-1"))
        .await
        .expect("connect");
    fx.connections
        .on_service_event(&broker(), &ServiceEvent::new("group", "delete", "1", "g-1"))
        .await
        .expect("event");
    assert!(
        fx.connections
            .find_by_client_id(&broker(), "1", "gw-01")
            .await
            .expect("find")
            .is_some()
    );
}

fn scoped_reader(permissions: &[&str]) -> ScopeContext {
    ScopeContext::new(
        "1",
        "u-7",
        Vec::new(),
        permissions.iter().map(|item| item.to_string()).collect(),
    )
}

#[tokio::test]
async fn audit_names_require_info_permission() {
    let fx = fixture();
    let created = fx
        .connections
        .record_connect(&broker(), &connect_event("gw-01", "u-1"))
        .await
        .expect("connect");

    let plain = fx
        .connections
        .find(&scoped_reader(&[DEVICE_CONNECTION_READ]), "1", &created.id)
        .await
        .expect("find")
        .expect("connection");
    assert!(plain.audit.created_by_name.is_none());
    assert!(plain.audit.modified_by_name.is_none());
    assert_eq!(plain.audit.created_by, "broker");

    let detailed = fx
        .connections
        .find(
            &scoped_reader(&[DEVICE_CONNECTION_READ, DEVICE_CONNECTION_INFO]),
            "1",
            &created.id,
        )
        .await
        .expect("find")
        .expect("connection");
    assert_eq!(detailed.audit.created_by_name.as_deref(), Some("kapua-broker"));
}

#[tokio::test]
async fn account_delete_event_requires_delete_permission() {
    let fx = fixture();
    fx.connections
        .record_connect(&broker(), &connect_event("gw-01", "u-1"))
        .await
        .expect("connect");
    let err = fx
        .connections
        .on_service_event(
            &scoped_reader(&[DEVICE_CONNECTION_READ]),
            &ServiceEvent::new("account", "delete", "0", "1"),
        )
        .await
        .expect_err("denied");
    assert!(matches!(err, RegistryError::Auth(_)));
    assert!(
        fx.connections
            .find_by_client_id(&broker(), "1", "gw-01")
            .await
            .expect("find")
            .is_some()
    );
}
