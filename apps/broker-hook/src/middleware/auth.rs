//! 回调认证中间件
//!
//! - bearer_token：从 Authorization 头提取 Bearer token
//! - hook_auth：校验共享令牌并注入调用方 ScopeContext
//!
//! 配置了 KAPUA_HOOK_TOKEN 时，令牌缺失或不匹配返回 401；匹配时注入 Broker 特权上下文。
//! 未配置时注入无权限的匿名上下文，连接回调照常处理，平台事件被注册表权限校验拒绝。

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::Response,
};
use domain::ScopeContext;
use kapua_auth::secret_matches;
use tracing::warn;

use crate::AppState;
use crate::utils::response::auth_error;

/// 未认证调用方的用户 ID。
pub const ANONYMOUS_USER_ID: &str = "anonymous";

/// 从请求头中提取 Bearer token
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header_value = headers.get(header::AUTHORIZATION)?;
    let auth_str = header_value.to_str().ok()?;
    auth_str.strip_prefix("Bearer ")
}

pub async fn hook_auth(State(state): State<AppState>, mut req: Request<Body>, next: Next) -> Response {
    let caller = match state.hook_token.as_deref() {
        Some(expected) => match bearer_token(req.headers()) {
            Some(token) if secret_matches(token, expected) => state.hook_context.clone(),
            presented => {
                warn!(
                    target: "kapua.broker_hook",
                    path = %req.uri().path(),
                    token_present = presented.is_some(),
                    "hook_token_rejected"
                );
                return auth_error(StatusCode::UNAUTHORIZED);
            }
        },
        None => ScopeContext::new(
            state.hook_context.scope_id.clone(),
            ANONYMOUS_USER_ID,
            Vec::new(),
            Vec::new(),
        ),
    };
    req.extensions_mut().insert(caller);
    next.run(req).await
}
