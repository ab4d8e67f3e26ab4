//! 配置值转换
//!
//! 支持基本类型之间的转换以及数组到数组的逐元素转换。无法转换时报错，
//! 不会静默退回默认值。

use crate::container::{TypeRef, Value};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// 配置值转换错误
#[derive(Debug, Error, PartialEq)]
pub enum CoercionError {
    #[error("cannot convert {found} to {target}")]
    Incompatible { found: String, target: String },
    #[error("cannot parse '{literal}' as {target}")]
    Unparsable { literal: String, target: String },
    #[error("value {value} is out of range for {target}")]
    OutOfRange { value: String, target: String },
    #[error("element {index}: {source}")]
    Element {
        index: usize,
        #[source]
        source: Box<CoercionError>,
    },
    #[error("values of type {target} cannot be supplied by configuration")]
    Unsupported { target: String },
}

/// 将配置源提供的原始值转换为目标类型
pub fn coerce(raw: &JsonValue, target: &TypeRef) -> Result<Value, CoercionError> {
    match (raw, target) {
        (_, TypeRef::Named(_)) => Err(unsupported(target)),
        // 字符串统一走字面量解析，环境变量等来源只能提供字符串
        (JsonValue::String(text), _) => coerce_literal(text, target),
        (JsonValue::Array(items), TypeRef::Array(element)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| coerce(item, element).map_err(|err| element_error(index, err)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (JsonValue::Bool(flag), TypeRef::Bool) => Ok(Value::Bool(*flag)),
        (JsonValue::Bool(flag), TypeRef::String) => Ok(Value::Str(flag.to_string())),
        (JsonValue::Number(number), TypeRef::String) => Ok(Value::Str(number.to_string())),
        (JsonValue::Number(number), TypeRef::F32 | TypeRef::F64) => number
            .as_f64()
            .map(Value::Float)
            .ok_or_else(|| incompatible(raw, target)),
        (JsonValue::Number(number), t) if t.is_integer() => {
            let wide = number
                .as_i64()
                .map(i128::from)
                .or_else(|| number.as_u64().map(i128::from))
                .ok_or_else(|| incompatible(raw, target))?;
            integer_value(wide, target)
        }
        _ => Err(incompatible(raw, target)),
    }
}

/// 将默认字面量转换为目标类型
///
/// 数组既接受 JSON 数组字面量（`[1, 2]`），也接受逗号分隔列表（`1, 2`）。
pub fn coerce_literal(literal: &str, target: &TypeRef) -> Result<Value, CoercionError> {
    let text = literal.trim();
    match target {
        TypeRef::String => Ok(Value::Str(literal.to_string())),
        TypeRef::Bool => text
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|_| unparsable(literal, target)),
        TypeRef::F32 | TypeRef::F64 => text
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| unparsable(literal, target)),
        TypeRef::Char => {
            let mut chars = literal.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(unparsable(literal, target)),
            }
        }
        TypeRef::Array(element) => {
            if text.starts_with('[') {
                let parsed: JsonValue =
                    serde_json::from_str(text).map_err(|_| unparsable(literal, target))?;
                return coerce(&parsed, target);
            }
            if text.is_empty() {
                return Ok(Value::Array(Vec::new()));
            }
            text.split(',')
                .enumerate()
                .map(|(index, item)| {
                    coerce_literal(item.trim(), element).map_err(|err| element_error(index, err))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        TypeRef::Named(_) => Err(unsupported(target)),
        integer => {
            let wide = text
                .parse::<i128>()
                .map_err(|_| unparsable(literal, target))?;
            integer_value(wide, integer)
        }
    }
}

fn integer_value(wide: i128, target: &TypeRef) -> Result<Value, CoercionError> {
    let Some((min, max)) = target.integer_bounds() else {
        return Err(CoercionError::Incompatible {
            found: "integer".to_string(),
            target: target.full_name(),
        });
    };
    if wide < min || wide > max {
        return Err(CoercionError::OutOfRange {
            value: wide.to_string(),
            target: target.full_name(),
        });
    }
    // 范围已校验
    if min == 0 {
        Ok(Value::UInt(wide as u64))
    } else {
        Ok(Value::Int(wide as i64))
    }
}

fn json_kind(raw: &JsonValue) -> &'static str {
    match raw {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn incompatible(raw: &JsonValue, target: &TypeRef) -> CoercionError {
    CoercionError::Incompatible {
        found: json_kind(raw).to_string(),
        target: target.full_name(),
    }
}

fn unparsable(literal: &str, target: &TypeRef) -> CoercionError {
    CoercionError::Unparsable {
        literal: literal.to_string(),
        target: target.full_name(),
    }
}

fn unsupported(target: &TypeRef) -> CoercionError {
    CoercionError::Unsupported {
        target: target.full_name(),
    }
}

fn element_error(index: usize, source: CoercionError) -> CoercionError {
    CoercionError::Element {
        index,
        source: Box::new(source),
    }
}
