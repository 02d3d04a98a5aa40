//! 数据模型
//!
//! - 设备连接：DeviceConnection, NewDeviceConnection
//! - 连接选项（预留用户）：DeviceConnectionOption
//! - 连接快照（连接 + 选项，一次读取）：ConnectionSnapshot
//! - 查询条件：DeviceConnectionQuery, ConnectionOptionQuery
//! - 用户：UserRecord（仅用于审计名称解析）

use domain::{ConnectionStatus, CouplingMode};
use serde::{Deserialize, Serialize};

/// 审计字段。
///
/// `*_name` 仅用于展示，不持久化。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuditFields {
    pub created_on_ms: i64,
    pub created_by: String,
    pub modified_on_ms: i64,
    pub modified_by: String,
    /// 乐观锁版本
    pub optlock: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by_name: Option<String>,
}

impl AuditFields {
    pub fn created(by: impl Into<String>, now_ms: i64) -> Self {
        let by = by.into();
        Self {
            created_on_ms: now_ms,
            created_by: by.clone(),
            modified_on_ms: now_ms,
            modified_by: by,
            optlock: 0,
            created_by_name: None,
            modified_by_name: None,
        }
    }

    /// 写入成功后的审计字段（版本号 +1）。
    pub fn touched(&self, by: impl Into<String>, now_ms: i64) -> Self {
        Self {
            created_on_ms: self.created_on_ms,
            created_by: self.created_by.clone(),
            modified_on_ms: now_ms,
            modified_by: by.into(),
            optlock: self.optlock + 1,
            created_by_name: None,
            modified_by_name: None,
        }
    }
}

/// 设备连接记录。
///
/// `(scope_id, client_id)` 唯一。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConnection {
    pub id: String,
    pub scope_id: String,
    pub client_id: String,
    pub status: ConnectionStatus,
    pub user_id: String,
    pub protocol: Option<String>,
    pub client_ip: Option<String>,
    pub server_ip: Option<String>,
    pub audit: AuditFields,
}

/// 新建设备连接输入（连接选项随之以 OPEN 模式创建）。
#[derive(Debug, Clone)]
pub struct NewDeviceConnection {
    pub id: String,
    pub scope_id: String,
    pub client_id: String,
    pub status: ConnectionStatus,
    pub user_id: String,
    pub protocol: Option<String>,
    pub client_ip: Option<String>,
    pub server_ip: Option<String>,
    pub created_by: String,
}

impl NewDeviceConnection {
    /// 构造连接记录及其默认选项。
    pub fn into_records(self, now_ms: i64) -> (DeviceConnection, DeviceConnectionOption) {
        let audit = AuditFields::created(self.created_by, now_ms);
        let option = DeviceConnectionOption::open(&self.id, &self.scope_id, audit.clone());
        let connection = DeviceConnection {
            id: self.id,
            scope_id: self.scope_id,
            client_id: self.client_id,
            status: self.status,
            user_id: self.user_id,
            protocol: self.protocol,
            client_ip: self.client_ip,
            server_ip: self.server_ip,
            audit,
        };
        (connection, option)
    }
}

/// 设备连接选项（预留用户记录），与连接一对一（共享 id）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConnectionOption {
    pub id: String,
    pub scope_id: String,
    pub user_coupling_mode: CouplingMode,
    pub reserved_user_id: Option<String>,
    pub allow_user_change: bool,
    /// 信任密钥哈希（argon2 PHC 字符串）
    pub trust_key: Option<String>,
    pub trust_expiration_ms: Option<i64>,
    pub audit: AuditFields,
}

impl DeviceConnectionOption {
    /// 默认选项：OPEN 模式、无预留用户。
    pub fn open(id: &str, scope_id: &str, audit: AuditFields) -> Self {
        Self {
            id: id.to_string(),
            scope_id: scope_id.to_string(),
            user_coupling_mode: CouplingMode::Open,
            reserved_user_id: None,
            allow_user_change: false,
            trust_key: None,
            trust_expiration_ms: None,
            audit,
        }
    }
}

/// 连接快照：连接及其选项，热路径上一次读取，避免 N+1。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub connection: DeviceConnection,
    pub option: DeviceConnectionOption,
}

/// 设备连接查询条件。
#[derive(Debug, Clone, Default)]
pub struct DeviceConnectionQuery {
    pub scope_id: String,
    pub client_id: Option<String>,
    pub status: Option<ConnectionStatus>,
    pub user_id: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl DeviceConnectionQuery {
    pub fn new(scope_id: impl Into<String>) -> Self {
        Self {
            scope_id: scope_id.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: ConnectionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, item: &DeviceConnection) -> bool {
        item.scope_id == self.scope_id
            && self
                .client_id
                .as_deref()
                .map_or(true, |client_id| item.client_id == client_id)
            && self.status.map_or(true, |status| item.status == status)
            && self
                .user_id
                .as_deref()
                .map_or(true, |user_id| item.user_id == user_id)
    }
}

/// 连接选项查询条件。
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptionQuery {
    pub scope_id: String,
    pub reserved_user_id: Option<String>,
    pub coupling_mode: Option<CouplingMode>,
    /// 排除的连接 id（唯一性预检时排除自身）
    pub exclude_id: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl ConnectionOptionQuery {
    pub fn new(scope_id: impl Into<String>) -> Self {
        Self {
            scope_id: scope_id.into(),
            ..Self::default()
        }
    }

    /// 查找同作用域内其它连接对该用户的预留。
    pub fn reserved_elsewhere(
        scope_id: impl Into<String>,
        user_id: impl Into<String>,
        connection_id: impl Into<String>,
    ) -> Self {
        Self {
            scope_id: scope_id.into(),
            reserved_user_id: Some(user_id.into()),
            exclude_id: Some(connection_id.into()),
            ..Self::default()
        }
    }

    pub fn with_coupling_mode(mut self, mode: CouplingMode) -> Self {
        self.coupling_mode = Some(mode);
        self
    }

    pub fn matches(&self, item: &DeviceConnectionOption) -> bool {
        item.scope_id == self.scope_id
            && self
                .reserved_user_id
                .as_deref()
                .map_or(true, |user_id| item.reserved_user_id.as_deref() == Some(user_id))
            && self
                .coupling_mode
                .map_or(true, |mode| item.user_coupling_mode == mode)
            && self.exclude_id.as_deref().map_or(true, |id| item.id != id)
    }
}

/// 用户记录（审计名称解析用）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub scope_id: String,
    pub user_id: String,
    pub username: String,
}

/// 当前时间戳（毫秒）
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// 按 offset/limit 截取结果。
pub(crate) fn paginate<T>(items: Vec<T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    let iter = items.into_iter().skip(offset);
    match limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}
