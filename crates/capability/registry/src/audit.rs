use domain::ScopeContext;
use domain::permissions::DEVICE_CONNECTION_INFO;
use kapua_auth::{AuthorizationService, UserNameResolver};
use kapua_storage::AuditFields;
use tracing::warn;

/// 审计名称解析：仅对拥有 `DEVICE_CONNECTION.INFO` 的调用方填充用户名。
pub(crate) struct AuditNames<'a> {
    pub authorization: &'a dyn AuthorizationService,
    pub resolver: &'a dyn UserNameResolver,
}

impl AuditNames<'_> {
    /// 填充审计字段中的用户名；无权限时保持为空，解析失败只记录日志。
    pub async fn fill(&self, ctx: &ScopeContext, scope_id: &str, audit: &mut AuditFields) {
        if !self
            .authorization
            .is_permitted(ctx, DEVICE_CONNECTION_INFO, scope_id)
        {
            return;
        }
        audit.created_by_name = self.resolve(scope_id, &audit.created_by).await;
        audit.modified_by_name = if audit.modified_by == audit.created_by {
            audit.created_by_name.clone()
        } else {
            self.resolve(scope_id, &audit.modified_by).await
        };
    }

    async fn resolve(&self, scope_id: &str, user_id: &str) -> Option<String> {
        match self.resolver.resolve_name(scope_id, user_id).await {
            Ok(name) => name,
            Err(err) => {
                warn!(
                    target: "kapua.registry",
                    scope_id = %scope_id,
                    user_id = %user_id,
                    error = %err,
                    "audit_name_resolution_failed"
                );
                None
            }
        }
    }
}
