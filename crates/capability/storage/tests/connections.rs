use domain::ConnectionStatus;
use kapua_storage::{
    DeviceConnectionQuery, DeviceConnectionStore, InMemoryDeviceConnectionStore,
    NewDeviceConnection, StorageError,
};

fn new_connection(id: &str, client_id: &str, user_id: &str) -> NewDeviceConnection {
    NewDeviceConnection {
        id: id.to_string(),
        scope_id: "1".to_string(),
        client_id: client_id.to_string(),
        status: ConnectionStatus::Connected,
        user_id: user_id.to_string(),
        protocol: Some("MQTT".to_string()),
        client_ip: Some("10.0.0.5".to_string()),
        server_ip: None,
        created_by: "broker".to_string(),
    }
}

#[tokio::test]
async fn create_then_find_by_client_id() {
    let store = InMemoryDeviceConnectionStore::new();
    let created = store
        .create_connection(new_connection("c-1", "gw-01", "u-1"))
        .await
        .expect("create");
    assert_eq!(created.connection.audit.optlock, 0);
    assert_eq!(created.option.id, "c-1");
    assert!(created.option.reserved_user_id.is_none());

    let snapshot = store
        .find_snapshot_by_client_id("1", "gw-01")
        .await
        .expect("find")
        .expect("snapshot");
    assert_eq!(snapshot, created);
    let other_scope = store
        .find_snapshot_by_client_id("2", "gw-01")
        .await
        .expect("find");
    assert!(other_scope.is_none());
}

#[tokio::test]
async fn duplicate_client_id_rejected() {
    let store = InMemoryDeviceConnectionStore::new();
    store
        .create_connection(new_connection("c-1", "gw-01", "u-1"))
        .await
        .expect("create");
    let err = store
        .create_connection(new_connection("c-2", "gw-01", "u-2"))
        .await
        .expect_err("duplicate");
    assert!(matches!(err, StorageError::Duplicate { .. }));
}

#[tokio::test]
async fn stale_optlock_is_conflict() {
    let store = InMemoryDeviceConnectionStore::new();
    let created = store
        .create_connection(new_connection("c-1", "gw-01", "u-1"))
        .await
        .expect("create");
    let mut first = created.connection.clone();
    first.status = ConnectionStatus::Disconnected;
    let updated = store
        .update_connection(first, "broker")
        .await
        .expect("update");
    assert_eq!(updated.audit.optlock, 1);
    assert_eq!(updated.status, ConnectionStatus::Disconnected);

    let mut stale = created.connection;
    stale.status = ConnectionStatus::Missing;
    let err = store
        .update_connection(stale, "broker")
        .await
        .expect_err("conflict");
    assert!(err.is_conflict());
}

#[tokio::test]
async fn query_filters_and_counts() {
    let store = InMemoryDeviceConnectionStore::new();
    store
        .create_connection(new_connection("c-1", "gw-01", "u-1"))
        .await
        .expect("create");
    let second = store
        .create_connection(new_connection("c-2", "gw-02", "u-2"))
        .await
        .expect("create");
    let mut record = second.connection;
    record.status = ConnectionStatus::Disconnected;
    store
        .update_connection(record, "broker")
        .await
        .expect("update");

    let connected = DeviceConnectionQuery::new("1").with_status(ConnectionStatus::Connected);
    let items = store.query_connections(&connected).await.expect("query");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].client_id, "gw-01");
    assert_eq!(
        store
            .count_connections(&DeviceConnectionQuery::new("1"))
            .await
            .expect("count"),
        2
    );
    let page = store
        .query_connections(&DeviceConnectionQuery::new("1").with_page(1, 10))
        .await
        .expect("page");
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].client_id, "gw-02");
}

#[tokio::test]
async fn delete_by_scope_removes_connections_and_options() {
    let store = InMemoryDeviceConnectionStore::new();
    store
        .create_connection(new_connection("c-1", "gw-01", "u-1"))
        .await
        .expect("create");
    let mut other = new_connection("c-9", "gw-01", "u-1");
    other.scope_id = "2".to_string();
    store.create_connection(other).await.expect("create");

    let removed = store
        .delete_connections_by_scope("1")
        .await
        .expect("delete");
    assert_eq!(removed.len(), 1);
    assert!(
        store
            .find_snapshot_by_client_id("1", "gw-01")
            .await
            .expect("find")
            .is_none()
    );
    assert!(
        store
            .find_snapshot_by_client_id("2", "gw-01")
            .await
            .expect("find")
            .is_some()
    );
    // 删除后 client_id 可重新登记
    store
        .create_connection(new_connection("c-3", "gw-01", "u-1"))
        .await
        .expect("recreate");
}

#[tokio::test]
async fn empty_scope_is_invalid() {
    let store = InMemoryDeviceConnectionStore::new();
    let err = store
        .find_connection("", "c-1")
        .await
        .expect_err("invalid");
    assert!(matches!(err, StorageError::InvalidArgument(_)));
}
