use crate::AuthError;
use domain::ScopeContext;

/// 权限校验接口。
pub trait AuthorizationService: Send + Sync {
    /// 校验调用方在 `scope_id` 下是否拥有 `permission`，否则返回 `PermissionDenied`。
    fn check_permission(
        &self,
        ctx: &ScopeContext,
        permission: &str,
        scope_id: &str,
    ) -> Result<(), AuthError>;

    fn is_permitted(&self, ctx: &ScopeContext, permission: &str, scope_id: &str) -> bool {
        self.check_permission(ctx, permission, scope_id).is_ok()
    }
}

/// 基于上下文权限列表的校验实现。
///
/// 调用方只能访问自身作用域，`system` 角色可跨作用域。
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAuthorizationService;

impl ContextAuthorizationService {
    pub fn new() -> Self {
        Self
    }
}

impl AuthorizationService for ContextAuthorizationService {
    fn check_permission(
        &self,
        ctx: &ScopeContext,
        permission: &str,
        scope_id: &str,
    ) -> Result<(), AuthError> {
        let in_scope = ctx.is_system() || ctx.scope_id == scope_id;
        if in_scope && ctx.has_permission(permission) {
            return Ok(());
        }
        tracing::debug!(
            user_id = %ctx.user_id,
            scope_id,
            permission,
            "permission denied"
        );
        Err(AuthError::PermissionDenied {
            permission: permission.to_string(),
            scope_id: scope_id.to_string(),
        })
    }
}
