use super::source::ConfigSourceChain;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 严格依赖检查的配置键
pub const STRICT_DEPENDENCIES_KEY: &str = "context.strict_dependencies";
/// 显式限定名回退的配置键
pub const QUALIFIED_FALLBACK_KEY: &str = "context.qualified_fallback";

/// 上下文行为选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextOptions {
    /// 必需依赖缺失时报错（否则以 null 传入构造函数、跳过属性赋值）
    pub strict_dependencies: bool,
    /// 显式限定名查找失败后继续按隐式限定名和类型查找
    pub qualified_fallback: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            strict_dependencies: true,
            qualified_fallback: false,
        }
    }
}

impl ContextOptions {
    pub fn with_strict_dependencies(mut self, strict: bool) -> Self {
        self.strict_dependencies = strict;
        self
    }

    pub fn with_qualified_fallback(mut self, fallback: bool) -> Self {
        self.qualified_fallback = fallback;
        self
    }

    /// 从配置源读取选项，缺失的键保持默认值
    pub fn load(sources: &ConfigSourceChain) -> Result<Self, ConfigError> {
        let mut options = Self::default();
        if let Some(strict) = read_flag(sources, STRICT_DEPENDENCIES_KEY)? {
            options.strict_dependencies = strict;
        }
        if let Some(fallback) = read_flag(sources, QUALIFIED_FALLBACK_KEY)? {
            options.qualified_fallback = fallback;
        }
        Ok(options)
    }
}

fn read_flag(sources: &ConfigSourceChain, key: &str) -> Result<Option<bool>, ConfigError> {
    let Some((_, raw)) = sources.first_match(key)? else {
        return Ok(None);
    };
    let parsed: Result<bool, serde_json::Error> = match raw {
        JsonValue::Null => return Ok(None),
        JsonValue::String(text) => serde_json::from_str(text.trim()),
        other => serde_json::from_value(other),
    };
    parsed.map(Some).map_err(|source| ConfigError::InvalidOption {
        key: key.to_string(),
        source,
    })
}
