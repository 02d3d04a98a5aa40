//! properties 风格配置源读取（`key=value`，`#` 注释）。
//!
//! 行解析复用 dotenvy；任意一行无法解析即整体失败，不做部分加载。
//!
//! 注意 dotenvy 的变量替换：未加引号或双引号的值中 `$NAME` / `${NAME}` 会被替换为
//! 进程环境变量（未定义时为空串）。值中需要字面 `$` 时使用单引号，如
//! `broker.ip='edge-$1.example.com'`。

use crate::ConfigError;
use std::path::PathBuf;

/// 按出现顺序保存的键值对。
#[derive(Debug, Clone, Default)]
pub struct Properties {
    entries: Vec<(String, String)>,
}

impl Properties {
    /// 取键对应的值（同名键以最后一次出现为准）。
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for Properties {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// 将配置 URI 解析为本地路径。
///
/// 支持 `file:<path>`、`file://<path>` 与裸路径，其它 scheme 拒绝。
pub fn resolve_uri(uri: &str) -> Result<PathBuf, ConfigError> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(ConfigError::UnsupportedUri(uri.to_string()));
    }
    if let Some(rest) = uri.strip_prefix("file:") {
        let path = rest.strip_prefix("//").unwrap_or(rest);
        if path.is_empty() {
            return Err(ConfigError::UnsupportedUri(uri.to_string()));
        }
        return Ok(PathBuf::from(path));
    }
    if uri.contains("://") {
        return Err(ConfigError::UnsupportedUri(uri.to_string()));
    }
    Ok(PathBuf::from(uri))
}

/// 读取并解析 properties 配置源。
pub fn load_properties(uri: &str) -> Result<Properties, ConfigError> {
    let path = resolve_uri(uri)?;
    let source_error = |message: String| ConfigError::Source {
        uri: uri.to_string(),
        message,
    };
    let iter = dotenvy::from_path_iter(&path).map_err(|err| source_error(err.to_string()))?;
    let mut entries = Vec::new();
    for item in iter {
        let (key, value) = item.map_err(|err| source_error(err.to_string()))?;
        entries.push((key, value));
    }
    Ok(entries.into_iter().collect())
}
