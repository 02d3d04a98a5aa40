//! 平台服务事件（账户、分组、用户删除等）。

use serde::{Deserialize, Serialize};

pub const SERVICE_ACCOUNT: &str = "account";
pub const SERVICE_GROUP: &str = "group";
pub const SERVICE_USER: &str = "user";
pub const OPERATION_DELETE: &str = "delete";

/// 事件总线投递的服务事件。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEvent {
    pub service: String,
    pub operation: String,
    pub scope_id: String,
    pub entity_id: String,
}

impl ServiceEvent {
    pub fn new(
        service: impl Into<String>,
        operation: impl Into<String>,
        scope_id: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            operation: operation.into(),
            scope_id: scope_id.into(),
            entity_id: entity_id.into(),
        }
    }

    pub fn is(&self, service: &str, operation: &str) -> bool {
        self.service == service && self.operation == operation
    }
}
