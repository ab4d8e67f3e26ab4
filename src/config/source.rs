//! 配置源
//!
//! 配置源只提供键值查询，文件解析由外部完成。上下文按注册顺序持有去重后的配置源，
//! 查询时第一个拥有该键的配置源胜出。

use crate::errors::ConfigError;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 键值配置源
pub trait ConfigSource: Send + Sync {
    /// 配置源名称（用于日志和错误信息）
    fn name(&self) -> &str;

    fn has_value(&self, key: &str) -> bool;

    /// 读取原始值；`has_value` 为 `true` 时值本身仍可能是 `null`
    fn get_value(&self, key: &str) -> Result<JsonValue, ConfigError>;
}

/// 内存配置源
#[derive(Debug, Clone, Default)]
pub struct MapConfigSource {
    name: String,
    values: HashMap<String, JsonValue>,
}

impl MapConfigSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: HashMap::new(),
        }
    }

    /// 从已解析的配置树创建，嵌套对象展开为点分键
    ///
    /// 数组作为叶子值保留。
    pub fn from_tree(name: impl Into<String>, tree: &JsonValue) -> Self {
        let mut source = Self::new(name);
        flatten(None, tree, &mut source.values);
        source
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn flatten(prefix: Option<&str>, node: &JsonValue, out: &mut HashMap<String, JsonValue>) {
    match node {
        JsonValue::Object(map) => {
            for (key, child) in map {
                let path = match prefix {
                    Some(prefix) => format!("{}.{}", prefix, key),
                    None => key.clone(),
                };
                flatten(Some(&path), child, out);
            }
        }
        leaf => {
            if let Some(key) = prefix {
                out.insert(key.to_string(), leaf.clone());
            }
        }
    }
}

impl ConfigSource for MapConfigSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_value(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn get_value(&self, key: &str) -> Result<JsonValue, ConfigError> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::KeyNotFound {
                key: key.to_string(),
                source_name: self.name.clone(),
            })
    }
}

/// 环境变量配置源
///
/// 键 `pool.max-size` 在前缀 `APP` 下映射为 `APP_POOL_MAX_SIZE`。
#[derive(Debug, Clone)]
pub struct EnvConfigSource {
    name: String,
    prefix: String,
}

impl EnvConfigSource {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            name: format!("env:{}", prefix),
            prefix,
        }
    }

    /// 配置键对应的环境变量名
    pub fn variable_name(&self, key: &str) -> String {
        let suffix: String = key
            .chars()
            .map(|c| match c {
                '.' | '-' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect();
        if self.prefix.is_empty() {
            suffix
        } else {
            format!("{}_{}", self.prefix.to_ascii_uppercase(), suffix)
        }
    }
}

impl ConfigSource for EnvConfigSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_value(&self, key: &str) -> bool {
        std::env::var_os(self.variable_name(key)).is_some()
    }

    fn get_value(&self, key: &str) -> Result<JsonValue, ConfigError> {
        let variable = self.variable_name(key);
        match std::env::var(&variable) {
            Ok(value) => Ok(JsonValue::String(value)),
            Err(std::env::VarError::NotPresent) => Err(ConfigError::KeyNotFound {
                key: key.to_string(),
                source_name: self.name.clone(),
            }),
            Err(err) => Err(ConfigError::ReadFailed {
                key: key.to_string(),
                source_name: self.name.clone(),
                reason: format!("{}: {}", variable, err),
            }),
        }
    }
}

/// 有序、去重的配置源集合
#[derive(Clone, Default)]
pub struct ConfigSourceChain {
    sources: Vec<Arc<dyn ConfigSource>>,
}

impl ConfigSourceChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加配置源；同一个配置源对象重复追加时返回 `false`
    pub fn push(&mut self, source: Arc<dyn ConfigSource>) -> bool {
        let incoming = Arc::as_ptr(&source) as *const ();
        if self
            .sources
            .iter()
            .any(|existing| Arc::as_ptr(existing) as *const () == incoming)
        {
            return false;
        }
        self.sources.push(source);
        true
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ConfigSource>> {
        self.sources.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// 第一个拥有该键的配置源及其原始值
    pub fn first_match(&self, key: &str) -> Result<Option<(String, JsonValue)>, ConfigError> {
        for source in &self.sources {
            if source.has_value(key) {
                let value = source.get_value(key)?;
                return Ok(Some((source.name().to_string(), value)));
            }
        }
        Ok(None)
    }
}

impl fmt::Debug for ConfigSourceChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSourceChain")
            .field("sources", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_tree_flattens_nested_objects() {
        let source = MapConfigSource::from_tree(
            "tree",
            &json!({
                "server": { "port": 8080, "hosts": ["a", "b"] },
                "debug": true,
                "empty": null
            }),
        );
        assert_eq!(source.len(), 4);
        assert_eq!(source.get_value("server.port").unwrap(), json!(8080));
        assert_eq!(source.get_value("server.hosts").unwrap(), json!(["a", "b"]));
        assert!(source.has_value("empty"));
        assert!(!source.has_value("server"));
    }

    #[test]
    fn test_missing_key_reports_source() {
        let source = MapConfigSource::new("defaults");
        let err = source.get_value("missing").unwrap_err();
        assert!(err.to_string().contains("defaults"));
    }

    #[test]
    fn test_env_source_maps_keys_to_variables() {
        let source = EnvConfigSource::new("appctx_test");
        assert_eq!(source.variable_name("pool.max-size"), "APPCTX_TEST_POOL_MAX_SIZE");

        std::env::set_var("APPCTX_TEST_POOL_MAX_SIZE", "16");
        assert!(source.has_value("pool.max-size"));
        assert_eq!(source.get_value("pool.max-size").unwrap(), json!("16"));
        std::env::remove_var("APPCTX_TEST_POOL_MAX_SIZE");
        assert!(!source.has_value("pool.max-size"));
    }

    #[test]
    fn test_chain_deduplicates_and_keeps_order() {
        let first: Arc<dyn ConfigSource> = Arc::new(MapConfigSource::new("first").with("k", 1));
        let second: Arc<dyn ConfigSource> =
            Arc::new(MapConfigSource::new("second").with("k", 2).with("only", 3));

        let mut chain = ConfigSourceChain::new();
        assert!(chain.push(first.clone()));
        assert!(chain.push(second));
        assert!(!chain.push(first));
        assert_eq!(chain.names(), vec!["first", "second"]);

        assert_eq!(chain.first_match("k").unwrap(), Some(("first".to_string(), json!(1))));
        assert_eq!(chain.first_match("only").unwrap().map(|(_, v)| v), Some(json!(3)));
        assert_eq!(chain.first_match("none").unwrap(), None);
    }
}
