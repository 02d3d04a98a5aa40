use domain::ScopeContext;
use kapua_auth::{ContextAuthorizationService, StoreUserNameResolver};
use kapua_registry::{
    ConnectEvent, DeviceConnectionOptionService, DeviceConnectionService, RegistryConfig,
};
use kapua_storage::{
    InMemoryConnectionCache, InMemoryDeviceConnectionStore, InMemoryUserStore, UserRecord,
};
use std::sync::Arc;

pub struct Fixture {
    pub cache: Arc<InMemoryConnectionCache>,
    pub connections: DeviceConnectionService,
    pub options: DeviceConnectionOptionService,
}

pub fn fixture() -> Fixture {
    let store = Arc::new(InMemoryDeviceConnectionStore::new());
    let cache = Arc::new(InMemoryConnectionCache::new());
    let users = Arc::new(InMemoryUserStore::with_users([UserRecord {
        scope_id: "1".to_string(),
        user_id: "broker".to_string(),
        username: "kapua-broker".to_string(),
    }]));
    let authorization = Arc::new(ContextAuthorizationService::new());
    let user_names = Arc::new(StoreUserNameResolver::new(users));
    let connections = DeviceConnectionService::new_with_config(
        store.clone(),
        store.clone(),
        cache.clone(),
        authorization.clone(),
        user_names.clone(),
        RegistryConfig { max_retries: 2 },
    );
    let options = DeviceConnectionOptionService::new(
        store.clone(),
        store.clone(),
        cache.clone(),
        authorization,
        user_names,
    );
    Fixture {
        cache,
        connections,
        options,
    }
}

pub fn broker() -> ScopeContext {
    ScopeContext::privileged("1", "broker")
}

pub fn connect_event(client_id: &str, user_id: &str) -> ConnectEvent {
    ConnectEvent {
        scope_id: "1".to_string(),
        client_id: client_id.to_string(),
        user_id: user_id.to_string(),
        protocol: Some("MQTT".to_string()),
        client_ip: Some("10.0.0.5".to_string()),
        server_ip: Some("broker-0".to_string()),
    }
}
