//! 路由定义
//!
//! - 健康检查：/health
//! - Broker 回调：/broker/connect, /broker/disconnect
//! - 平台事件：/events/service
//! - 指标：/metrics

use super::AppState;
use super::handlers::*;
use super::middleware::hook_auth;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

/// 创建 API 路由
///
/// Broker 回调与平台事件经过 hook_auth，健康检查与指标不需要令牌。
pub fn create_api_router(state: AppState) -> Router<AppState> {
    let hooks = Router::new()
        .route("/broker/connect", post(broker_connect))
        .route("/broker/disconnect", post(broker_disconnect))
        .route("/events/service", post(service_event))
        .route_layer(from_fn_with_state(state, hook_auth));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .merge(hooks)
}
