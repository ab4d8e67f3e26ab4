//! 应用上下文
//!
//! 注册表、实例化策略、配置源和解析统计的组合体，是所有协作方获取组件的入口。
//! 上下文可以廉价克隆，克隆之间共享同一份状态。

use super::binder;
use super::descriptor::{ComponentDescriptor, InjectionSpec};
use super::factory::{FactoryStrategy, PerCallFactory, ScopedFactory, SingletonFactory};
use super::identifier::{ComponentId, TypeRef};
use super::lifecycle::{JustConstructed, LifecyclePipeline};
use super::registry::{ComponentRegistry, Registration};
use super::resolver::{DependencyResolver, InjectionOverride, ResolutionChain};
use super::scope::Scope;
use super::stats::{ContextStats, InnerStats};
use super::value::{AnyObject, BoxedObject, Instance, Value};
use super::Lifetime;
use crate::config::{ConfigSource, ConfigSourceChain, ContextOptions};
use crate::errors::{ContextError, ContextResult};
use crate::logging::OperationTimer;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::sync::Arc;

struct ContextInner {
    registry: ComponentRegistry,
    config_sources: RwLock<ConfigSourceChain>,
    singleton: Arc<SingletonFactory>,
    per_call: Arc<PerCallFactory>,
    scoped: Arc<ScopedFactory>,
    options: ContextOptions,
    stats: InnerStats,
}

/// 应用上下文
#[derive(Clone)]
pub struct ApplicationContext {
    inner: Arc<ContextInner>,
}

impl Default for ApplicationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationContext {
    /// 使用默认选项创建上下文
    pub fn new() -> Self {
        Self::with_options(ContextOptions::default())
    }

    pub fn with_options(options: ContextOptions) -> Self {
        Self::build(options, ConfigSourceChain::new())
    }

    /// 以给定配置源创建上下文，选项从这些配置源读取
    pub fn from_config(sources: ConfigSourceChain) -> ContextResult<Self> {
        let options = ContextOptions::load(&sources)?;
        tracing::info!(
            sources = ?sources.names(),
            strict_dependencies = options.strict_dependencies,
            qualified_fallback = options.qualified_fallback,
            "Application context configured"
        );
        Ok(Self::build(options, sources))
    }

    fn build(options: ContextOptions, sources: ConfigSourceChain) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                registry: ComponentRegistry::new(),
                config_sources: RwLock::new(sources),
                singleton: Arc::new(SingletonFactory::new()),
                per_call: Arc::new(PerCallFactory::new()),
                scoped: Arc::new(ScopedFactory::new()),
                options,
                stats: InnerStats::default(),
            }),
        }
    }

    pub fn options(&self) -> ContextOptions {
        self.inner.options
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.inner.registry
    }

    fn factory_for(&self, lifetime: Lifetime) -> Arc<dyn FactoryStrategy> {
        match lifetime {
            Lifetime::Singleton => self.inner.singleton.clone(),
            Lifetime::PerCall => self.inner.per_call.clone(),
            Lifetime::Scoped => self.inner.scoped.clone(),
        }
    }

    // ---- 注册 ----

    /// 按描述符声明的限定名和生命周期注册组件
    ///
    /// 抽象描述符只创建空的注册槽，返回 `None`。
    pub fn register_component(
        &self,
        descriptor: Arc<ComponentDescriptor>,
    ) -> Option<Arc<Registration>> {
        if descriptor.is_abstract() {
            self.inner.registry.register_abstract(descriptor);
            return None;
        }
        let factory = self.factory_for(descriptor.lifetime());
        let qualifier = descriptor.qualifier().map(str::to_string);
        Some(
            self.inner
                .registry
                .register(descriptor, qualifier.as_deref(), factory),
        )
    }

    /// 注册服务：总是使用单例策略，调用方提供的限定名优先于描述符声明
    pub fn register_service(
        &self,
        descriptor: Arc<ComponentDescriptor>,
        qualifier: Option<&str>,
    ) -> ContextResult<Arc<Registration>> {
        if descriptor.is_abstract() {
            return Err(ContextError::NotInstantiable {
                type_ref: descriptor.type_ref().clone(),
            });
        }
        let qualifier = qualifier
            .map(str::to_string)
            .or_else(|| descriptor.qualifier().map(str::to_string));
        let factory = self.factory_for(Lifetime::Singleton);
        Ok(self
            .inner
            .registry
            .register(descriptor, qualifier.as_deref(), factory))
    }

    /// 注册已构造好的实例，并预置单例缓存
    ///
    /// 同一标识已有缓存实例时返回已有实例，调用方传入的对象被丢弃。
    /// 同一标识已按其他生命周期注册时返回 `LifetimeConflict`。
    pub fn register_instance(
        &self,
        descriptor: Arc<ComponentDescriptor>,
        object: AnyObject,
        qualifier: Option<&str>,
    ) -> ContextResult<Instance> {
        let actual = (*object).type_id();
        if descriptor.rust_type_id() != Some(actual) {
            return Err(ContextError::TypeMismatch {
                expected: descriptor.type_ref().full_name(),
                actual: format!("{:?}", actual),
            });
        }

        let qualifier = qualifier
            .map(str::to_string)
            .or_else(|| descriptor.qualifier().map(str::to_string));
        let factory = self.factory_for(Lifetime::Singleton);
        let registration =
            self.inner
                .registry
                .register(descriptor.clone(), qualifier.as_deref(), factory);
        if registration.lifetime() != Lifetime::Singleton {
            return Err(ContextError::LifetimeConflict {
                id: registration.id().clone(),
                lifetime: registration.lifetime(),
            });
        }

        let instance = Instance::new(object, descriptor);
        if self.inner.singleton.seed(registration.id(), instance.clone()) {
            tracing::debug!(component = %registration.id(), "Instance registered");
            return Ok(instance);
        }
        let existing = self
            .inner
            .singleton
            .cached(registration.id())
            .unwrap_or(instance);
        tracing::warn!(
            component = %registration.id(),
            "Singleton already exists, registered instance ignored"
        );
        Ok(existing)
    }

    /// 注册值
    pub fn register_value<T: Any + Send + Sync>(
        &self,
        descriptor: Arc<ComponentDescriptor>,
        value: T,
        qualifier: Option<&str>,
    ) -> ContextResult<Instance> {
        self.register_instance(descriptor, Arc::new(value), qualifier)
    }

    /// 注册配置对象：先绑定配置属性，再作为单例实例注册
    pub fn register_configuration<T: Any + Send + Sync>(
        &self,
        descriptor: Arc<ComponentDescriptor>,
        mut value: T,
    ) -> ContextResult<Instance> {
        ensure_type::<T>(&descriptor)?;
        let sources = self.config_sources();
        let bound = binder::bind_configuration(&mut value, &descriptor, &sources)?;
        tracing::debug!(
            type_ref = %descriptor.type_ref(),
            properties = bound,
            "Configuration object bound"
        );
        self.register_instance(descriptor, Arc::new(value), None)
    }

    /// 追加配置源；同一配置源重复注册时返回 `false`
    pub fn register_config_source(&self, source: Arc<dyn ConfigSource>) -> bool {
        let name = source.name().to_string();
        let added = self.inner.config_sources.write().push(source);
        if added {
            tracing::debug!(source = %name, "Configuration source registered");
        }
        added
    }

    // ---- 查找 ----

    pub fn get_instance_of(&self, type_ref: &TypeRef) -> ContextResult<Instance> {
        self.get_instance_in_scope(type_ref, Vec::new(), None)
    }

    /// 带构造参数获取实例；参数只在实际构造时使用
    pub fn get_instance_with(&self, type_ref: &TypeRef, args: Vec<Value>) -> ContextResult<Instance> {
        self.get_instance_in_scope(type_ref, args, None)
    }

    /// 在作用域内获取实例（作用域组件必须提供作用域）
    pub fn get_instance_in_scope(
        &self,
        type_ref: &TypeRef,
        args: Vec<Value>,
        scope: Option<&Scope>,
    ) -> ContextResult<Instance> {
        self.get_by_id(&ComponentId::of(type_ref.clone()), args, scope)
    }

    /// 按 (限定名, 类型) 获取实例
    pub fn get_qualified(&self, qualifier: &str, type_ref: &TypeRef) -> ContextResult<Instance> {
        self.get_by_id(&ComponentId::qualified(qualifier, type_ref.clone()), Vec::new(), None)
    }

    fn get_by_id(
        &self,
        id: &ComponentId,
        args: Vec<Value>,
        scope: Option<&Scope>,
    ) -> ContextResult<Instance> {
        InnerStats::bump(&self.inner.stats.total_resolutions);
        let registration = self.inner.registry.select(id)?;
        let mut chain = ResolutionChain::new();
        self.resolve_registration(&registration, args, scope, &mut chain)
    }

    /// 所有候选实例（立即构造）
    pub fn get_components(&self, type_ref: &TypeRef) -> ContextResult<Vec<Instance>> {
        self.get_components_in_scope(type_ref, None)
    }

    pub fn get_components_in_scope(
        &self,
        type_ref: &TypeRef,
        scope: Option<&Scope>,
    ) -> ContextResult<Vec<Instance>> {
        let candidates = self
            .inner
            .registry
            .lookup(&ComponentId::of(type_ref.clone()));
        candidates
            .iter()
            .map(|registration| {
                InnerStats::bump(&self.inner.stats.total_resolutions);
                let mut chain = ResolutionChain::new();
                self.resolve_registration(registration, Vec::new(), scope, &mut chain)
            })
            .collect()
    }

    /// 按 Rust 类型获取组件（具体类型或 `dyn Trait` 契约）
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> ContextResult<Arc<T>> {
        self.resolve_in_scope::<T>(Vec::new(), None)
    }

    pub fn resolve_with<T: ?Sized + Send + Sync + 'static>(
        &self,
        args: Vec<Value>,
    ) -> ContextResult<Arc<T>> {
        self.resolve_in_scope::<T>(args, None)
    }

    pub fn resolve_in_scope<T: ?Sized + Send + Sync + 'static>(
        &self,
        args: Vec<Value>,
        scope: Option<&Scope>,
    ) -> ContextResult<Arc<T>> {
        let type_ref = TypeRef::of::<T>();
        let instance = self.get_instance_in_scope(&type_ref, args, scope)?;
        instance.view::<T>().ok_or_else(|| ContextError::TypeMismatch {
            expected: type_ref.full_name(),
            actual: instance.type_ref().full_name(),
        })
    }

    // ---- 自管理对象 ----

    /// 对不进入任何缓存的对象执行完整生命周期
    pub fn create_context_object(
        &self,
        descriptor: &ComponentDescriptor,
        overrides: Option<&InjectionOverride>,
        just_constructed: Option<&JustConstructed>,
        args: Vec<Value>,
        scope: Option<&Scope>,
    ) -> ContextResult<BoxedObject> {
        let mut chain = ResolutionChain::new();
        LifecyclePipeline::new(self, descriptor, scope)
            .with_overrides(overrides)
            .with_just_constructed(just_constructed)
            .build(args, &mut chain)
    }

    /// 创建调用方独占的对象
    pub fn create<T: Any + Send + Sync>(
        &self,
        descriptor: &ComponentDescriptor,
        args: Vec<Value>,
    ) -> ContextResult<T> {
        ensure_type::<T>(descriptor)?;
        let object = self.create_context_object(descriptor, None, None, args, None)?;
        object
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| ContextError::TypeMismatch {
                expected: std::any::type_name::<T>().to_string(),
                actual: descriptor.type_ref().full_name(),
            })
    }

    /// 为外部持有的对象注入属性依赖
    pub fn inject_dependencies(
        &self,
        target: &mut dyn Any,
        descriptor: &ComponentDescriptor,
    ) -> ContextResult<()> {
        ensure_target(target, descriptor)?;
        let mut chain = ResolutionChain::new();
        DependencyResolver::new(self, None).inject_properties(target, descriptor, &mut chain)
    }

    /// 为外部持有的对象执行配置绑定、属性注入和初始化钩子
    pub fn initialize_context_object(
        &self,
        target: &mut dyn Any,
        descriptor: &ComponentDescriptor,
    ) -> ContextResult<()> {
        ensure_target(target, descriptor)?;
        let mut chain = ResolutionChain::new();
        LifecyclePipeline::new(self, descriptor, None).initialize(target, &mut chain)
    }

    /// 复用依赖查找算法解析单个值，未找到时返回 `None`
    pub fn solve_inject_dependency(
        &self,
        declared_type: &TypeRef,
        implicit_qualifier: Option<&str>,
        spec: Option<&InjectionSpec>,
        scope: Option<&Scope>,
    ) -> ContextResult<Option<Value>> {
        let default_spec = InjectionSpec::default();
        let spec = spec.unwrap_or(&default_spec);
        let mut chain = ResolutionChain::new();
        DependencyResolver::new(self, scope).solve(declared_type, implicit_qualifier, spec, &mut chain)
    }

    // ---- 启动与统计 ----

    /// 启动阶段末尾预先构造所有单例
    ///
    /// 需要调用方参数的单例（没有零参数构造函数）会被跳过。
    pub fn preinstantiate_singletons(&self) -> ContextResult<usize> {
        let timer = OperationTimer::new("preinstantiate_singletons");
        let mut created = 0;
        for registration in self.inner.registry.registrations() {
            if registration.lifetime() != Lifetime::Singleton {
                continue;
            }
            let seeded = self.inner.singleton.cached(registration.id()).is_some();
            let constructible = registration
                .descriptor()
                .constructors()
                .iter()
                .any(|constructor| constructor.plain_params().next().is_none());
            if seeded {
                continue;
            }
            if !constructible {
                tracing::debug!(component = %registration.id(), "Skipping singleton that needs arguments");
                continue;
            }
            let mut chain = ResolutionChain::new();
            self.resolve_registration(&registration, Vec::new(), None, &mut chain)?;
            created += 1;
        }
        timer
            .with_metadata("singletons", &created.to_string())
            .finish();
        Ok(created)
    }

    pub fn is_registered(&self, type_ref: &TypeRef) -> bool {
        !self
            .inner
            .registry
            .lookup(&ComponentId::of(type_ref.clone()))
            .is_empty()
    }

    /// 已注册的具体类型（按注册顺序，去重）
    pub fn registered_types(&self) -> Vec<TypeRef> {
        let mut seen = HashSet::new();
        self.inner
            .registry
            .registrations()
            .iter()
            .map(|registration| registration.concrete_type().clone())
            .filter(|type_ref| seen.insert(type_ref.clone()))
            .collect()
    }

    pub fn stats(&self) -> ContextStats {
        self.inner
            .stats
            .snapshot(self.inner.registry.len(), self.inner.scoped.evictions())
    }

    // ---- 内部 ----

    pub(crate) fn inner_stats(&self) -> &InnerStats {
        &self.inner.stats
    }

    /// 配置源快照，避免构造期间持有锁
    pub(crate) fn config_sources(&self) -> ConfigSourceChain {
        self.inner.config_sources.read().clone()
    }

    /// 经由注册项的实例化策略获取实例，并在解析路径上登记该注册项
    pub(crate) fn resolve_registration(
        &self,
        registration: &Registration,
        args: Vec<Value>,
        scope: Option<&Scope>,
        chain: &mut ResolutionChain,
    ) -> ContextResult<Instance> {
        if let Err(err) = chain.enter(registration.id()) {
            InnerStats::bump(&self.inner.stats.cycles_rejected);
            tracing::warn!(component = %registration.id(), error = %err, "Cyclic dependency rejected");
            return Err(err);
        }
        let result = registration
            .factory()
            .get_component(self, registration, args, scope, chain);
        chain.exit();
        result
    }

    /// 实例化策略缓存未命中时调用：运行完整生命周期并包装为共享实例
    pub(crate) fn build_registered(
        &self,
        registration: &Registration,
        args: Vec<Value>,
        scope: Option<&Scope>,
        chain: &mut ResolutionChain,
    ) -> ContextResult<Instance> {
        let descriptor = registration.descriptor();
        let object = LifecyclePipeline::new(self, descriptor, scope).build(args, chain)?;
        Ok(Instance::new(Arc::from(object), descriptor.clone()))
    }
}

fn ensure_type<T: Any>(descriptor: &ComponentDescriptor) -> ContextResult<()> {
    if descriptor.rust_type_id() == Some(TypeId::of::<T>()) {
        Ok(())
    } else {
        Err(ContextError::TypeMismatch {
            expected: descriptor.type_ref().full_name(),
            actual: std::any::type_name::<T>().to_string(),
        })
    }
}

fn ensure_target(target: &dyn Any, descriptor: &ComponentDescriptor) -> ContextResult<()> {
    let actual = target.type_id();
    if descriptor.rust_type_id() == Some(actual) {
        Ok(())
    } else {
        Err(ContextError::TypeMismatch {
            expected: descriptor.type_ref().full_name(),
            actual: format!("{:?}", actual),
        })
    }
}
