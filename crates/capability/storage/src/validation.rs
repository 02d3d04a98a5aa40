//! 验证辅助函数
//!
//! - ensure_scope：验证作用域 ID 非空
//! - ensure_id：验证实体 ID 非空

use crate::error::StorageError;

/// 验证作用域 ID 非空
///
/// 所有数据访问都必须带有明确的作用域。
pub fn ensure_scope(scope_id: &str) -> Result<(), StorageError> {
    if scope_id.is_empty() {
        return Err(StorageError::InvalidArgument("scope_id required".to_string()));
    }
    Ok(())
}

/// 验证实体 ID 非空
pub fn ensure_id(field: &str, value: &str) -> Result<(), StorageError> {
    if value.is_empty() {
        return Err(StorageError::InvalidArgument(format!("{field} required")));
    }
    Ok(())
}
