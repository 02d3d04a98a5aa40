//! Broker 连接钩子 HTTP 服务：MQTT Broker 在设备连接/断开时回调。
//!
//! 启动流程：加载配置 → 初始化日志 → 打开存储与缓存 → 构造注册表与判定器 → 监听。

mod handlers;
mod middleware;
mod routes;
mod utils;

use axum::{Router, middleware::from_fn};
use domain::ScopeContext;
use kapua_auth::{ContextAuthorizationService, StoreUserNameResolver};
use kapua_broker::{BrokerError, ConnectHandler, ConnectionIdentityResolver, broker_ip_resolver};
use kapua_config::AppConfig;
use kapua_protocol::ProtocolDescriptorRegistry;
use kapua_registry::{DeviceConnectionOptionService, DeviceConnectionService, RegistryConfig};
use kapua_storage::{
    ConnectionCache, DeviceConnectionOptionStore, DeviceConnectionStore,
    InMemoryConnectionCache, InMemoryDeviceConnectionStore, InMemoryUserStore,
    PgDeviceConnectionStore, PgUserStore, RedisConnectionCache, StorageError, UserStore,
    connect_pool,
};
use kapua_telemetry::init_tracing;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Broker 插件特权上下文的用户 ID。
const BROKER_USER_ID: &str = "broker";

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<ConnectHandler>,
    pub connections: DeviceConnectionService,
    pub descriptors: Arc<ProtocolDescriptorRegistry>,
    /// 回调共享令牌；为空时不校验。
    pub hook_token: Option<String>,
    /// 令牌校验通过后注入的调用方上下文。
    pub hook_context: ScopeContext,
}

/// 存储与缓存实现集合。
struct Stores {
    connections: Arc<dyn DeviceConnectionStore>,
    options: Arc<dyn DeviceConnectionOptionStore>,
    users: Arc<dyn UserStore>,
    cache: Arc<dyn ConnectionCache>,
}

impl Stores {
    fn in_memory() -> Self {
        let store = Arc::new(InMemoryDeviceConnectionStore::new());
        Self {
            connections: store.clone(),
            options: store,
            users: Arc::new(InMemoryUserStore::new()),
            cache: Arc::new(InMemoryConnectionCache::new()),
        }
    }

    /// 按配置打开存储：未配置数据库/Redis 时回退到内存实现。
    async fn open(config: &AppConfig) -> Result<Self, StorageError> {
        let mut stores = Self::in_memory();
        match config.database_url.as_deref() {
            Some(database_url) => {
                let pool = connect_pool(database_url).await?;
                let store = Arc::new(PgDeviceConnectionStore::new(pool.clone()));
                stores.connections = store.clone();
                stores.options = store;
                stores.users = Arc::new(PgUserStore::new(pool));
            }
            None => warn!(target: "kapua.broker_hook", "database_not_configured_using_memory"),
        }
        if let Some(redis_url) = config.redis_url.as_deref() {
            stores.cache = Arc::new(RedisConnectionCache::connect(
                redis_url,
                config.redis_connection_ttl_seconds,
            )?);
        }
        Ok(stores)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    let stores = Stores::open(&config).await?;
    let state = build_state(&config, stores)?;
    if config.hook_token.is_none() {
        warn!(target: "kapua.broker_hook", "hook_token_not_configured");
    }
    info!(
        target: "kapua.broker_hook",
        addr = %config.http_addr,
        protocols = ?state.descriptors.protocols(),
        default_descriptor = state.descriptors.has_default(),
        "broker_hook_listening"
    );
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// 构造注册表服务、身份判定器与连接处理器。
///
/// 描述符配置或 Broker 地址解析器无效时启动失败。
fn build_state(config: &AppConfig, stores: Stores) -> Result<AppState, BrokerError> {
    let descriptors = Arc::new(ProtocolDescriptorRegistry::from_settings(
        &config.protocol_descriptor,
    )?);
    let broker_ip = broker_ip_resolver(&config.broker)?;

    let authorization = Arc::new(ContextAuthorizationService::new());
    let user_names = Arc::new(StoreUserNameResolver::new(stores.users));
    let connections = DeviceConnectionService::new_with_config(
        stores.connections.clone(),
        stores.options.clone(),
        stores.cache.clone(),
        authorization.clone(),
        user_names.clone(),
        RegistryConfig {
            max_retries: config.connect_max_retries,
        },
    );
    let options = DeviceConnectionOptionService::new(
        stores.options,
        stores.connections,
        stores.cache,
        authorization,
        user_names,
    );

    let ctx = ScopeContext::privileged(config.broker.scope_id.clone(), BROKER_USER_ID);
    let identity = ConnectionIdentityResolver::new(
        connections.clone(),
        options,
        ctx.clone(),
        config.connect_max_retries,
    );
    let handler = ConnectHandler::new(
        descriptors.clone(),
        identity,
        connections.clone(),
        broker_ip,
        ctx.clone(),
        Duration::from_millis(config.store_timeout_ms),
    );

    Ok(AppState {
        handler: Arc::new(handler),
        connections,
        descriptors,
        hook_token: config.hook_token.clone(),
        hook_context: ctx,
    })
}

fn build_app(state: AppState) -> Router {
    routes::create_api_router(state.clone()).with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(from_fn(middleware::request_context)),
    )
}
