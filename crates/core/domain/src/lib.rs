pub mod connection;
pub mod events;
pub mod permissions;

pub use connection::{ConnectionStatus, CouplingMode, MessageType, ParseEnumError};
pub use events::ServiceEvent;

/// 作用域上下文：所有模块共享的执行上下文。
///
/// `scope_id` 为调用方所属账户（租户边界），权限列表决定可访问的资源域。
#[derive(Debug, Clone)]
pub struct ScopeContext {
    pub scope_id: String,
    pub user_id: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl ScopeContext {
    /// 构造显式身份与权限范围的上下文。
    pub fn new(
        scope_id: impl Into<String>,
        user_id: impl Into<String>,
        roles: Vec<String>,
        permissions: Vec<String>,
    ) -> Self {
        Self {
            scope_id: scope_id.into(),
            user_id: user_id.into(),
            roles,
            permissions,
        }
    }

    /// Broker 插件使用的特权上下文（跨作用域、拥有全部权限）。
    pub fn privileged(scope_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            scope_id: scope_id.into(),
            user_id: user_id.into(),
            roles: vec![permissions::ROLE_SYSTEM.to_string()],
            permissions: vec![permissions::ALL.to_string()],
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|item| item == permission || item == permissions::ALL)
    }

    pub fn is_system(&self) -> bool {
        self.roles.iter().any(|role| role == permissions::ROLE_SYSTEM)
    }
}

impl Default for ScopeContext {
    /// 空上下文（仅用于测试或占位）。
    fn default() -> Self {
        Self {
            scope_id: "".to_string(),
            user_id: "".to_string(),
            roles: Vec::new(),
            permissions: Vec::new(),
        }
    }
}
