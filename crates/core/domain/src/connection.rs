//! 设备连接相关的领域枚举。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 枚举文本解析失败。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

/// 设备连接状态。
///
/// `Missing` 只能由离线对账任务设置（设备未正常断开）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Missing,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
            Self::Missing => "MISSING",
        }
    }
}

impl FromStr for ConnectionStatus {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "CONNECTED" => Ok(Self::Connected),
            "DISCONNECTED" => Ok(Self::Disconnected),
            "MISSING" => Ok(Self::Missing),
            other => Err(ParseEnumError {
                kind: "connection status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 用户耦合模式：控制 client_id 重连时能否绑定到不同用户。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouplingMode {
    /// 任意用户均可连接，不改变预留。
    #[default]
    Open,
    /// 仅预留用户可连接。
    Strict,
    /// 仅预留用户可连接；`allow_user_change` 打开时允许一次换绑。
    SameUser,
}

impl CouplingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Strict => "STRICT",
            Self::SameUser => "SAME_USER",
        }
    }

    /// 首次连接时是否把连接用户记录为预留用户。
    pub fn pins_first_user(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl FromStr for CouplingMode {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "OPEN" => Ok(Self::Open),
            "STRICT" => Ok(Self::Strict),
            "SAME_USER" => Ok(Self::SameUser),
            other => Err(ParseEnumError {
                kind: "coupling mode",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for CouplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 设备消息类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    App,
    Birth,
    Disconnect,
    Missing,
    Notify,
    Data,
}

impl MessageType {
    pub const ALL: [MessageType; 6] = [
        Self::App,
        Self::Birth,
        Self::Disconnect,
        Self::Missing,
        Self::Notify,
        Self::Data,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::App => "APP",
            Self::Birth => "BIRTH",
            Self::Disconnect => "DISCONNECT",
            Self::Missing => "MISSING",
            Self::Notify => "NOTIFY",
            Self::Data => "DATA",
        }
    }
}

impl FromStr for MessageType {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|item| item.as_str() == value)
            .ok_or_else(|| ParseEnumError {
                kind: "message type",
                value: value.to_string(),
            })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
