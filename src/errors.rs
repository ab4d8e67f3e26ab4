use crate::config::CoercionError;
use crate::container::{ComponentId, LifecycleStage, Lifetime, TypeRef};
use thiserror::Error;

pub type ContextResult<T> = Result<T, ContextError>;

/// 应用上下文错误
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("No component registered for {id}")]
    ComponentNotFound { id: ComponentId },

    #[error("Ambiguous component {id}: candidates are {}", .candidates.join(", "))]
    AmbiguousComponent { id: ComponentId, candidates: Vec<String> },

    #[error("No constructor of '{type_ref}' accepts arguments ({})", .arguments.join(", "))]
    NoMatchingConstructor {
        type_ref: TypeRef,
        arguments: Vec<String>,
    },

    #[error("Invalid scope for '{type_ref}': {reason}")]
    InvalidScope { type_ref: TypeRef, reason: String },

    #[error("Invalid configuration value for '{type_ref}.{property}' (key '{key}'): {source}")]
    InvalidConfigurationValue {
        type_ref: TypeRef,
        property: String,
        key: String,
        #[source]
        source: CoercionError,
    },

    #[error("Missing required dependency '{point}' ({declared_type}) of '{owner}'")]
    MissingRequiredDependency {
        owner: TypeRef,
        point: String,
        declared_type: TypeRef,
    },

    #[error("Cannot register an instance for {id}: already registered as {lifetime:?}")]
    LifetimeConflict { id: ComponentId, lifetime: Lifetime },

    #[error("Cyclic dependency detected: {}", .chain.join(" -> "))]
    CyclicDependency { chain: Vec<String> },

    #[error("'{type_ref}' is abstract and cannot be instantiated")]
    NotInstantiable { type_ref: TypeRef },

    #[error("Failed to construct '{type_ref}' during {stage}: {source}")]
    ConstructionFailed {
        type_ref: TypeRef,
        stage: LifecycleStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to assign property '{property}' of '{type_ref}': {source}")]
    PropertyAssignment {
        type_ref: TypeRef,
        property: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Post-construct hook '{hook}' of '{type_ref}' failed: {source}")]
    PostConstructFailed {
        type_ref: TypeRef,
        hook: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Type mismatch: expected '{expected}', found '{actual}'")]
    TypeMismatch { expected: String, actual: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ContextError {
    /// 是否属于"未找到"类错误（查找失败而非构造失败）
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ContextError::ComponentNotFound { .. } | ContextError::MissingRequiredDependency { .. }
        )
    }
}

/// 配置源错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Key '{key}' not present in configuration source '{source_name}'")]
    KeyNotFound { key: String, source_name: String },
    #[error("Configuration source '{source_name}' failed to read '{key}': {reason}")]
    ReadFailed {
        key: String,
        source_name: String,
        reason: String,
    },
    #[error("Invalid value for option '{key}': {source}")]
    InvalidOption {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 运行时值转换错误
#[derive(Debug, Error, PartialEq)]
pub enum ValueError {
    #[error("Expected {expected}, found {found}")]
    Mismatch { expected: String, found: String },
    #[error("Value {value} is out of range for {target}")]
    OutOfRange { value: String, target: String },
    #[error("Argument {0} is missing")]
    MissingArgument(usize),
}

impl ValueError {
    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        ValueError::Mismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}
