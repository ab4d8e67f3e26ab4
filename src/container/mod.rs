//! 应用上下文：组件注册、依赖解析与生命周期管理

pub mod binder;
pub mod context;
pub mod descriptor;
pub mod factory;
pub mod identifier;
pub mod lifecycle;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod stats;
pub mod value;

use serde::{Deserialize, Serialize};

pub use context::ApplicationContext;
pub use descriptor::{
    ComponentDescriptor, Constructor, DescriptorBuilder, InjectionSpec, Parameter, ParameterKind,
    PostConstructHook, Property, PropertyBinding,
};
pub use factory::{FactoryStrategy, PerCallFactory, ScopedFactory, SingletonFactory};
pub use identifier::{ComponentId, TypeRef};
pub use lifecycle::{JustConstructed, LifecyclePipeline, LifecycleStage};
pub use registry::{ComponentRegistry, Registration};
pub use resolver::{DependencyResolver, InjectionOverride, InjectionPoint, ResolutionChain};
pub use scope::Scope;
pub use stats::ContextStats;
pub use value::{AnyObject, Arguments, BoxedObject, FromValue, Instance, TypeHierarchy, Value};

/// 组件生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// 单例 - 整个上下文生命周期只有一个实例
    #[default]
    Singleton,
    /// 按次 - 每次请求都创建新实例
    PerCall,
    /// 作用域 - 在同一作用域内共享实例
    Scoped,
}
