mod support;

use async_trait::async_trait;
use domain::CouplingMode;
use kapua_broker::{BindDecision, DenyReason};
use kapua_registry::ConnectEvent;
use kapua_storage::{
    ConnectionCache, ConnectionSnapshot, DeviceConnectionOption, InMemoryConnectionCache,
    StorageError,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use support::{broker, fixture_with_cache, seed};
use tokio::sync::Notify;

/// 可在下一次回填时暂停的缓存，用于构造回填与选项更新交错的时序。
#[derive(Default)]
struct GatedCache {
    inner: InMemoryConnectionCache,
    armed: AtomicBool,
    held: Notify,
    release: Notify,
}

#[async_trait]
impl ConnectionCache for GatedCache {
    async fn get(&self, scope_id: &str, id: &str) -> Result<Option<ConnectionSnapshot>, StorageError> {
        self.inner.get(scope_id, id).await
    }

    async fn get_by_client_id(
        &self,
        scope_id: &str,
        client_id: &str,
    ) -> Result<Option<ConnectionSnapshot>, StorageError> {
        self.inner.get_by_client_id(scope_id, client_id).await
    }

    async fn put(&self, snapshot: &ConnectionSnapshot) -> Result<(), StorageError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.held.notify_one();
            self.release.notified().await;
        }
        self.inner.put(snapshot).await
    }

    async fn remove(&self, scope_id: &str, id: &str, client_id: &str) -> Result<(), StorageError> {
        self.inner.remove(scope_id, id, client_id).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delayed_cache_fill_does_not_undo_option_update() {
    let cache = Arc::new(GatedCache::default());
    let fx = fixture_with_cache(cache.clone());
    seed(&fx, "gw-01", CouplingMode::Open, None, false).await;

    // 重连写入完成后在回填缓存处暂停
    cache.armed.store(true, Ordering::SeqCst);
    let connections = fx.connections.clone();
    let reconnect = tokio::spawn(async move {
        connections
            .record_connect(
                &broker(),
                &ConnectEvent {
                    scope_id: "1".to_string(),
                    client_id: "gw-01".to_string(),
                    user_id: "u-2".to_string(),
                    protocol: None,
                    client_ip: None,
                    server_ip: None,
                },
            )
            .await
    });
    cache.held.notified().await;

    let option = fx
        .connections
        .load_by_client_id(&broker(), "1", "gw-01")
        .await
        .expect("load")
        .expect("snapshot")
        .option;
    fx.options
        .update(
            &broker(),
            DeviceConnectionOption {
                user_coupling_mode: CouplingMode::Strict,
                reserved_user_id: Some("u-1".to_string()),
                ..option
            },
        )
        .await
        .expect("pin to u-1");

    cache.release.notify_one();
    reconnect.await.expect("join").expect("reconnect");

    let cached = fx
        .connections
        .find_by_client_id(&broker(), "1", "gw-01")
        .await
        .expect("find")
        .expect("snapshot");
    assert_eq!(cached.option.user_coupling_mode, CouplingMode::Strict);
    assert_eq!(cached.option.reserved_user_id.as_deref(), Some("u-1"));

    let decision = fx
        .resolver
        .authorize_bind("1", "gw-01", "u-2", None)
        .await
        .expect("bind");
    assert_eq!(decision, BindDecision::Deny(DenyReason::UserMismatch));
}
