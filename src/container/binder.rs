//! 配置绑定
//!
//! 第一个报告拥有该键的配置源提供原始值；该值为 null 时跳过此属性（不回退到默认值）。
//! 所有配置源都没有该键时，使用声明的默认字面量。

use super::descriptor::{ComponentDescriptor, Property, PropertyBinding};
use crate::config::{coerce, coerce_literal, ConfigSourceChain, CoercionError};
use crate::errors::{ContextError, ContextResult};
use std::any::Any;

/// 为目标对象绑定所有配置属性
pub fn bind_configuration(
    target: &mut dyn Any,
    descriptor: &ComponentDescriptor,
    sources: &ConfigSourceChain,
) -> ContextResult<usize> {
    let mut bound = 0;
    for property in descriptor.properties() {
        let PropertyBinding::Config { key, default } = &property.binding else {
            continue;
        };

        let coerced = match sources.first_match(key)? {
            Some((_, serde_json::Value::Null)) => {
                tracing::trace!(
                    type_ref = %descriptor.type_ref(),
                    property = %property.name,
                    key = %key,
                    "Configuration value is null, skipping"
                );
                continue;
            }
            Some((source_name, raw)) => {
                tracing::trace!(
                    type_ref = %descriptor.type_ref(),
                    property = %property.name,
                    key = %key,
                    source = %source_name,
                    "Binding configuration value"
                );
                coerce(&raw, &property.value_type)
            }
            None => match default {
                Some(literal) => coerce_literal(literal, &property.value_type),
                None => continue,
            },
        };

        let value = coerced.map_err(|source| invalid_value(descriptor, property, key, source))?;
        property
            .assign(target, value)
            .map_err(|source| ContextError::PropertyAssignment {
                type_ref: descriptor.type_ref().clone(),
                property: property.name.clone(),
                source,
            })?;
        bound += 1;
    }
    Ok(bound)
}

fn invalid_value(
    descriptor: &ComponentDescriptor,
    property: &Property,
    key: &str,
    source: CoercionError,
) -> ContextError {
    ContextError::InvalidConfigurationValue {
        type_ref: descriptor.type_ref().clone(),
        property: property.name.clone(),
        key: key.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfigSource;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Default)]
    struct Pool {
        size: i32,
        hosts: Vec<String>,
        name: String,
    }

    fn pool() -> Arc<ComponentDescriptor> {
        ComponentDescriptor::builder::<Pool>()
            .default_constructor()
            .config::<i32, _>("size", "pool.size", Some("5"), |p, v| p.size = v)
            .config::<Vec<String>, _>("hosts", "pool.hosts", None, |p, v| p.hosts = v)
            .config::<String, _>("name", "pool.name", Some("default"), |p, v| p.name = v)
            .build()
    }

    fn chain(sources: Vec<MapConfigSource>) -> ConfigSourceChain {
        let mut chain = ConfigSourceChain::new();
        for source in sources {
            chain.push(Arc::new(source));
        }
        chain
    }

    #[test]
    fn test_first_source_with_key_wins() {
        let sources = chain(vec![
            MapConfigSource::new("a").with("pool.hosts", json!(["h1", "h2"])),
            MapConfigSource::new("b")
                .with("pool.size", json!(12))
                .with("pool.hosts", json!("ignored")),
        ]);
        let mut target = Pool::default();
        let bound = bind_configuration(&mut target, &pool(), &sources).unwrap();

        assert_eq!(bound, 3);
        assert_eq!(target.size, 12);
        assert_eq!(target.hosts, vec!["h1".to_string(), "h2".to_string()]);
        assert_eq!(target.name, "default");
    }

    #[test]
    fn test_default_literal_is_coerced() {
        let mut target = Pool::default();
        bind_configuration(&mut target, &pool(), &ConfigSourceChain::new()).unwrap();
        assert_eq!(target.size, 5);
        assert!(target.hosts.is_empty());
    }

    #[test]
    fn test_null_value_skips_without_default() {
        let sources = chain(vec![MapConfigSource::new("a").with("pool.size", json!(null))]);
        let mut target = Pool { size: -1, ..Pool::default() };
        bind_configuration(&mut target, &pool(), &sources).unwrap();
        assert_eq!(target.size, -1);
    }

    #[test]
    fn test_unconvertible_value_fails_loudly() {
        let sources = chain(vec![MapConfigSource::new("a").with("pool.size", json!("many"))]);
        let mut target = Pool::default();
        let err = bind_configuration(&mut target, &pool(), &sources).unwrap_err();
        assert!(matches!(
            err,
            ContextError::InvalidConfigurationValue { ref key, .. } if key == "pool.size"
        ));
    }
}
