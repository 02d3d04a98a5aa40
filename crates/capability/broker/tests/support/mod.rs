use domain::{CouplingMode, ScopeContext};
use kapua_auth::{ContextAuthorizationService, StoreUserNameResolver};
use kapua_broker::ConnectionIdentityResolver;
use kapua_registry::{ConnectEvent, DeviceConnectionOptionService, DeviceConnectionService};
use kapua_storage::{
    ConnectionCache, DeviceConnectionOption, InMemoryConnectionCache,
    InMemoryDeviceConnectionStore, InMemoryUserStore,
};
use std::sync::Arc;

pub struct Fixture {
    pub connections: DeviceConnectionService,
    pub options: DeviceConnectionOptionService,
    pub resolver: ConnectionIdentityResolver,
}

pub fn broker() -> ScopeContext {
    ScopeContext::privileged("1", "broker")
}

pub fn fixture() -> Fixture {
    fixture_with_cache(Arc::new(InMemoryConnectionCache::new()))
}

pub fn fixture_with_cache(cache: Arc<dyn ConnectionCache>) -> Fixture {
    let store = Arc::new(InMemoryDeviceConnectionStore::new());
    let authorization = Arc::new(ContextAuthorizationService::new());
    let user_names = Arc::new(StoreUserNameResolver::new(Arc::new(InMemoryUserStore::new())));
    let connections = DeviceConnectionService::new(
        store.clone(),
        store.clone(),
        cache.clone(),
        authorization.clone(),
        user_names.clone(),
    );
    let options =
        DeviceConnectionOptionService::new(store.clone(), store, cache, authorization, user_names);
    let resolver =
        ConnectionIdentityResolver::new(connections.clone(), options.clone(), broker(), 3);
    Fixture {
        connections,
        options,
        resolver,
    }
}

/// 登记 client_id 并按给定模式/预留配置其选项。
#[allow(dead_code)]
pub async fn seed(
    fx: &Fixture,
    client_id: &str,
    mode: CouplingMode,
    reserved_user_id: Option<&str>,
    allow_user_change: bool,
) -> DeviceConnectionOption {
    fx.connections
        .record_connect(
            &broker(),
            &ConnectEvent {
                scope_id: "1".to_string(),
                client_id: client_id.to_string(),
                user_id: reserved_user_id.unwrap_or("seed").to_string(),
                protocol: None,
                client_ip: None,
                server_ip: None,
            },
        )
        .await
        .expect("connect");
    let option = fx
        .connections
        .find_by_client_id(&broker(), "1", client_id)
        .await
        .expect("find")
        .expect("snapshot")
        .option;
    fx.options
        .update(
            &broker(),
            DeviceConnectionOption {
                user_coupling_mode: mode,
                reserved_user_id: reserved_user_id.map(str::to_string),
                allow_user_change,
                ..option
            },
        )
        .await
        .expect("configure option")
}

#[allow(dead_code)]
pub async fn current_option(fx: &Fixture, client_id: &str) -> DeviceConnectionOption {
    fx.connections
        .find_by_client_id(&broker(), "1", client_id)
        .await
        .expect("find")
        .expect("snapshot")
        .option
}
