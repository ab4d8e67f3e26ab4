//! 可嵌入的组件注册与依赖解析运行时
//!
//! 外部扫描步骤产生组件描述符，`ApplicationContext` 负责注册、按需构造组件、
//! 装配依赖、绑定配置值并调用初始化钩子。

pub mod config;
pub mod container;
pub mod errors;
pub mod logging;

// Re-export commonly used items for convenience
pub use config::{ConfigSource, ConfigSourceChain, ContextOptions, EnvConfigSource, MapConfigSource};
pub use container::{
    ApplicationContext, ComponentDescriptor, ComponentId, InjectionSpec, Instance, Lifetime,
    Parameter, Scope, TypeRef, Value,
};
pub use errors::{ConfigError, ContextError, ContextResult};
