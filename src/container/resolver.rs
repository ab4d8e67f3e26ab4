//! 依赖解析
//!
//! 构造函数选择：按声明顺序遍历构造函数，调用方实参只与普通参数（非注入参数）
//! 逐个比较，第一个数量和类型都匹配的构造函数胜出。注入参数和注入属性按
//! 显式限定名、隐式限定名（参数/属性名）、类型默认名的顺序查找。

use super::context::ApplicationContext;
use super::descriptor::{ComponentDescriptor, Constructor, InjectionSpec, ParameterKind, PropertyBinding};
use super::identifier::{ComponentId, TypeRef};
use super::registry::select_candidate;
use super::scope::Scope;
use super::value::{BoxedObject, Value};
use super::LifecycleStage;
use crate::errors::{ContextError, ContextResult};
use std::any::Any;

/// 当前解析路径上的组件，用于检测循环依赖
#[derive(Debug, Default)]
pub struct ResolutionChain {
    stack: Vec<ComponentId>,
}

impl ResolutionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// 进入组件解析；组件已在路径上时返回 `CyclicDependency`
    pub(crate) fn enter(&mut self, id: &ComponentId) -> ContextResult<()> {
        if self.stack.contains(id) {
            let chain = self
                .stack
                .iter()
                .chain(std::iter::once(id))
                .map(ToString::to_string)
                .collect();
            return Err(ContextError::CyclicDependency { chain });
        }
        self.stack.push(id.clone());
        Ok(())
    }

    pub(crate) fn exit(&mut self) {
        self.stack.pop();
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// 注入点：正在被解析的参数或属性
#[derive(Debug, Clone, Copy)]
pub struct InjectionPoint<'a> {
    /// 所属类型
    pub owner: &'a TypeRef,
    /// 参数名或属性名
    pub name: &'a str,
    pub declared_type: &'a TypeRef,
    pub spec: &'a InjectionSpec,
}

/// 注入覆盖处理器：返回 `Some` 时跳过容器查找
pub type InjectionOverride = dyn Fn(&InjectionPoint<'_>) -> Option<Value> + Send + Sync;

/// 依赖解析器
pub struct DependencyResolver<'a> {
    ctx: &'a ApplicationContext,
    scope: Option<&'a Scope>,
    overrides: Option<&'a InjectionOverride>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(ctx: &'a ApplicationContext, scope: Option<&'a Scope>) -> Self {
        Self {
            ctx,
            scope,
            overrides: None,
        }
    }

    pub fn with_overrides(mut self, overrides: Option<&'a InjectionOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    /// 选择第一个普通参数与调用方实参匹配的构造函数
    pub fn select_constructor<'d>(
        &self,
        descriptor: &'d ComponentDescriptor,
        args: &[Value],
    ) -> ContextResult<&'d Constructor> {
        let hierarchy = self.ctx.registry();
        descriptor
            .constructors()
            .iter()
            .find(|constructor| {
                let plain: Vec<_> = constructor.plain_params().collect();
                plain.len() == args.len()
                    && plain
                        .iter()
                        .zip(args)
                        .all(|(param, arg)| arg.is_assignable_to(&param.declared_type, hierarchy))
            })
            .ok_or_else(|| ContextError::NoMatchingConstructor {
                type_ref: descriptor.type_ref().clone(),
                arguments: args.iter().map(Value::type_name).collect(),
            })
    }

    /// 选择构造函数、解析注入参数并调用构造闭包
    pub fn construct(
        &self,
        descriptor: &ComponentDescriptor,
        args: Vec<Value>,
        chain: &mut ResolutionChain,
    ) -> ContextResult<BoxedObject> {
        let owner = descriptor.type_ref();
        let constructor = self.select_constructor(descriptor, &args)?;

        let mut plain_args = args.into_iter();
        let mut call_args = Vec::with_capacity(constructor.params().len());
        for param in constructor.params() {
            match &param.kind {
                ParameterKind::Injected(spec) => {
                    let value = self
                        .resolve_point(owner, &param.name, &param.declared_type, spec, chain)?
                        .unwrap_or(Value::Null);
                    call_args.push(value);
                }
                // 数量已在选择阶段校验
                ParameterKind::Plain => call_args.push(plain_args.next().unwrap_or(Value::Null)),
            }
        }

        tracing::trace!(
            type_ref = %owner,
            params = call_args.len(),
            "Invoking constructor"
        );
        constructor
            .invoke(call_args)
            .map_err(|source| ContextError::ConstructionFailed {
                type_ref: owner.clone(),
                stage: LifecycleStage::Constructed,
                source,
            })
    }

    /// 属性注入；可选依赖缺失时跳过赋值
    pub fn inject_properties(
        &self,
        target: &mut dyn Any,
        descriptor: &ComponentDescriptor,
        chain: &mut ResolutionChain,
    ) -> ContextResult<()> {
        let owner = descriptor.type_ref();
        for property in descriptor.properties() {
            let PropertyBinding::Inject(spec) = &property.binding else {
                continue;
            };
            let Some(value) =
                self.resolve_point(owner, &property.name, &property.value_type, spec, chain)?
            else {
                tracing::trace!(type_ref = %owner, property = %property.name, "Optional dependency absent");
                continue;
            };
            property
                .assign(target, value)
                .map_err(|source| ContextError::PropertyAssignment {
                    type_ref: owner.clone(),
                    property: property.name.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// 解析单个注入点：先询问覆盖处理器，再查找容器
    pub fn resolve_point(
        &self,
        owner: &TypeRef,
        name: &str,
        declared_type: &TypeRef,
        spec: &InjectionSpec,
        chain: &mut ResolutionChain,
    ) -> ContextResult<Option<Value>> {
        if let Some(overrides) = self.overrides {
            let point = InjectionPoint {
                owner,
                name,
                declared_type,
                spec,
            };
            if let Some(value) = overrides(&point) {
                return Ok(Some(value));
            }
        }

        let value = self.solve(declared_type, Some(name), spec, chain)?;
        if value.is_none() && spec.required && self.ctx.options().strict_dependencies {
            return Err(ContextError::MissingRequiredDependency {
                owner: owner.clone(),
                point: name.to_string(),
                declared_type: declared_type.clone(),
            });
        }
        Ok(value)
    }

    /// 依次按显式限定名、隐式限定名、类型默认名查找，全部未命中时返回 `None`
    pub fn solve(
        &self,
        declared_type: &TypeRef,
        implicit_qualifier: Option<&str>,
        spec: &InjectionSpec,
        chain: &mut ResolutionChain,
    ) -> ContextResult<Option<Value>> {
        if let Some(qualifier) = spec.qualifier.as_deref() {
            let id = ComponentId::qualified(qualifier, declared_type.clone());
            if let Some(value) = self.lookup_and_resolve(&id, chain)? {
                return Ok(Some(value));
            }
            if !self.ctx.options().qualified_fallback {
                tracing::debug!(component = %id, "Qualified dependency not found");
                return Ok(None);
            }
        }

        if let Some(name) = implicit_qualifier.filter(|name| !name.is_empty()) {
            let id = ComponentId::qualified(name, declared_type.clone());
            if let Some(value) = self.lookup_and_resolve(&id, chain)? {
                return Ok(Some(value));
            }
        }

        self.lookup_and_resolve(&ComponentId::of(declared_type.clone()), chain)
    }

    fn lookup_and_resolve(
        &self,
        id: &ComponentId,
        chain: &mut ResolutionChain,
    ) -> ContextResult<Option<Value>> {
        let candidates = self.ctx.registry().lookup(id);
        if candidates.is_empty() {
            return Ok(None);
        }
        let registration = select_candidate(id, candidates)?;
        let instance = self
            .ctx
            .resolve_registration(&registration, Vec::new(), self.scope, chain)?;
        Ok(Some(Value::Object(instance)))
    }
}
