//! 组件描述符
//!
//! 描述符由外部扫描步骤产生，运行时只读取不修改。这里提供面向 Rust 类型的
//! 构建器，把构造函数、属性赋值和初始化钩子表示为闭包。

use super::identifier::TypeRef;
use super::value::{AnyObject, Arguments, BoxedObject, FromValue, Value};
use super::Lifetime;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// 构造闭包：接收按声明顺序排列的实参
pub type ConstructFn = Arc<dyn Fn(Arguments) -> anyhow::Result<BoxedObject> + Send + Sync>;

/// 统一的属性赋值能力
pub type AssignFn = Arc<dyn Fn(&mut dyn Any, Value) -> anyhow::Result<()> + Send + Sync>;

/// 初始化钩子（无参数）
pub type HookFn = Arc<dyn Fn(&mut dyn Any) -> anyhow::Result<()> + Send + Sync>;

/// 视图转换：把实例转换为 `Box<Arc<Contract>>`
pub type ViewFn = Arc<dyn Fn(AnyObject) -> Option<BoxedObject> + Send + Sync>;

/// 注入声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionSpec {
    /// 显式限定名覆盖
    pub qualifier: Option<String>,
    /// 缺失时是否视为构造失败
    pub required: bool,
}

impl InjectionSpec {
    pub fn new() -> Self {
        Self {
            qualifier: None,
            required: true,
        }
    }

    pub fn qualified(qualifier: impl Into<String>) -> Self {
        Self {
            qualifier: Some(qualifier.into()),
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

impl Default for InjectionSpec {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterKind {
    /// 由容器解析
    Injected(InjectionSpec),
    /// 由调用方实参提供
    Plain,
}

/// 构造函数参数
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub declared_type: TypeRef,
    pub kind: ParameterKind,
}

impl Parameter {
    pub fn plain<V: FromValue>(name: impl Into<String>) -> Self {
        Self::plain_typed(name, V::declared_type())
    }

    pub fn plain_typed(name: impl Into<String>, declared_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            declared_type,
            kind: ParameterKind::Plain,
        }
    }

    pub fn injected<V: FromValue>(name: impl Into<String>) -> Self {
        Self::injected_typed(name, V::declared_type())
    }

    pub fn injected_typed(name: impl Into<String>, declared_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            declared_type,
            kind: ParameterKind::Injected(InjectionSpec::new()),
        }
    }

    /// 设置显式限定名（仅对注入参数有效）
    pub fn qualified(mut self, qualifier: impl Into<String>) -> Self {
        if let ParameterKind::Injected(spec) = &mut self.kind {
            spec.qualifier = Some(qualifier.into());
        }
        self
    }

    /// 标记为可选注入
    pub fn optional(mut self) -> Self {
        if let ParameterKind::Injected(spec) = &mut self.kind {
            spec.required = false;
        }
        self
    }

    pub fn is_injected(&self) -> bool {
        matches!(self.kind, ParameterKind::Injected(_))
    }
}

/// 构造函数描述
#[derive(Clone)]
pub struct Constructor {
    params: Vec<Parameter>,
    construct: ConstructFn,
}

impl Constructor {
    pub fn new(params: Vec<Parameter>, construct: ConstructFn) -> Self {
        Self { params, construct }
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// 调用方需要提供的参数（保持声明顺序）
    pub fn plain_params(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| !p.is_injected())
    }

    pub(crate) fn invoke(&self, args: Vec<Value>) -> anyhow::Result<BoxedObject> {
        (self.construct)(Arguments::new(args))
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("params", &self.params)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyBinding {
    /// 依赖注入
    Inject(InjectionSpec),
    /// 配置值绑定
    Config {
        key: String,
        default: Option<String>,
    },
}

/// 可赋值的属性
#[derive(Clone)]
pub struct Property {
    pub name: String,
    pub value_type: TypeRef,
    pub binding: PropertyBinding,
    assign: AssignFn,
}

impl Property {
    pub fn new(
        name: impl Into<String>,
        value_type: TypeRef,
        binding: PropertyBinding,
        assign: AssignFn,
    ) -> Self {
        Self {
            name: name.into(),
            value_type,
            binding,
            assign,
        }
    }

    pub(crate) fn assign(&self, target: &mut dyn Any, value: Value) -> anyhow::Result<()> {
        (self.assign)(target, value)
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("binding", &self.binding)
            .finish()
    }
}

/// 初始化钩子
#[derive(Clone)]
pub struct PostConstructHook {
    pub name: String,
    hook: HookFn,
}

impl PostConstructHook {
    pub fn new(name: impl Into<String>, hook: HookFn) -> Self {
        Self {
            name: name.into(),
            hook,
        }
    }

    pub(crate) fn invoke(&self, target: &mut dyn Any) -> anyhow::Result<()> {
        (self.hook)(target)
    }
}

/// 组件描述符
pub struct ComponentDescriptor {
    type_ref: TypeRef,
    type_id: Option<TypeId>,
    qualifier: Option<String>,
    lifetime: Lifetime,
    is_abstract: bool,
    constructors: Vec<Constructor>,
    properties: Vec<Property>,
    post_construct: Vec<PostConstructHook>,
    contracts: Vec<TypeRef>,
    supertype: Option<TypeRef>,
    views: HashMap<TypeRef, ViewFn>,
}

impl ComponentDescriptor {
    /// 为 Rust 类型 `T` 创建描述符构建器
    pub fn builder<T: Any + Send + Sync>() -> DescriptorBuilder<T> {
        DescriptorBuilder::new()
    }

    /// 抽象类型（能力契约或不可实例化的父类型）的描述符
    pub fn abstract_type(type_ref: TypeRef) -> Arc<Self> {
        Arc::new(Self {
            type_ref,
            type_id: None,
            qualifier: None,
            lifetime: Lifetime::Singleton,
            is_abstract: true,
            constructors: Vec::new(),
            properties: Vec::new(),
            post_construct: Vec::new(),
            contracts: Vec::new(),
            supertype: None,
            views: HashMap::new(),
        })
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    /// 组件的 Rust `TypeId`；仅由类型化构建器生成的描述符才有
    pub fn rust_type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn post_construct_hooks(&self) -> &[PostConstructHook] {
        &self.post_construct
    }

    pub fn contracts(&self) -> &[TypeRef] {
        &self.contracts
    }

    pub fn supertype(&self) -> Option<&TypeRef> {
        self.supertype.as_ref()
    }

    pub(crate) fn view_for(&self, type_ref: &TypeRef) -> Option<&ViewFn> {
        self.views.get(type_ref)
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("type_ref", &self.type_ref)
            .field("qualifier", &self.qualifier)
            .field("lifetime", &self.lifetime)
            .field("is_abstract", &self.is_abstract)
            .field("constructors", &self.constructors)
            .field("properties", &self.properties)
            .field("contracts", &self.contracts)
            .field("supertype", &self.supertype)
            .finish()
    }
}

/// 描述符构建器
pub struct DescriptorBuilder<T> {
    descriptor: ComponentDescriptor,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> DescriptorBuilder<T> {
    fn new() -> Self {
        let mut views: HashMap<TypeRef, ViewFn> = HashMap::new();
        views.insert(
            TypeRef::of::<T>(),
            Arc::new(|object: AnyObject| {
                object
                    .downcast::<T>()
                    .ok()
                    .map(|concrete| Box::new(concrete) as BoxedObject)
            }),
        );
        Self {
            descriptor: ComponentDescriptor {
                type_ref: TypeRef::of::<T>(),
                type_id: Some(TypeId::of::<T>()),
                qualifier: None,
                lifetime: Lifetime::Singleton,
                is_abstract: false,
                constructors: Vec::new(),
                properties: Vec::new(),
                post_construct: Vec::new(),
                contracts: Vec::new(),
                supertype: None,
                views,
            },
            _phantom: PhantomData,
        }
    }

    /// 覆盖类型名（默认取 `std::any::type_name`）
    pub fn type_name(mut self, full_name: impl AsRef<str>) -> Self {
        let old = std::mem::replace(&mut self.descriptor.type_ref, TypeRef::named(full_name));
        if let Some(view) = self.descriptor.views.remove(&old) {
            self.descriptor
                .views
                .insert(self.descriptor.type_ref.clone(), view);
        }
        self
    }

    pub fn qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.descriptor.qualifier = Some(qualifier.into());
        self
    }

    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.descriptor.lifetime = lifetime;
        self
    }

    /// 声明构造函数，按声明顺序参与匹配
    pub fn constructor<F>(mut self, params: Vec<Parameter>, construct: F) -> Self
    where
        F: Fn(&mut Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let construct: ConstructFn = Arc::new(move |mut args: Arguments| {
            construct(&mut args).map(|value| Box::new(value) as BoxedObject)
        });
        self.descriptor
            .constructors
            .push(Constructor::new(params, construct));
        self
    }

    /// 无参构造
    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(Vec::new(), |_| Ok(T::default()))
    }

    /// 声明依赖注入属性
    pub fn inject<V, F>(self, name: impl Into<String>, spec: InjectionSpec, setter: F) -> Self
    where
        V: FromValue + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let binding = PropertyBinding::Inject(spec);
        self.typed_property(name, V::declared_type(), binding, setter)
    }

    /// 声明配置绑定属性
    pub fn config<V, F>(
        self,
        name: impl Into<String>,
        key: impl Into<String>,
        default: Option<&str>,
        setter: F,
    ) -> Self
    where
        V: FromValue + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let binding = PropertyBinding::Config {
            key: key.into(),
            default: default.map(str::to_string),
        };
        self.typed_property(name, V::declared_type(), binding, setter)
    }

    fn typed_property<V, F>(
        mut self,
        name: impl Into<String>,
        value_type: TypeRef,
        binding: PropertyBinding,
        setter: F,
    ) -> Self
    where
        V: FromValue + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let assign: AssignFn = Arc::new(move |target: &mut dyn Any, value: Value| {
            let target = target
                .downcast_mut::<T>()
                .ok_or_else(|| anyhow::anyhow!("target is not {}", std::any::type_name::<T>()))?;
            setter(target, V::from_value(value)?);
            Ok(())
        });
        self.descriptor
            .properties
            .push(Property::new(name, value_type, binding, assign));
        self
    }

    /// 追加一个已构造好的属性描述
    pub fn property(mut self, property: Property) -> Self {
        self.descriptor.properties.push(property);
        self
    }

    /// 声明初始化钩子，按声明顺序执行
    pub fn post_construct<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let hook: HookFn = Arc::new(move |target: &mut dyn Any| {
            let target = target
                .downcast_mut::<T>()
                .ok_or_else(|| anyhow::anyhow!("target is not {}", std::any::type_name::<T>()))?;
            hook(target)
        });
        self.descriptor
            .post_construct
            .push(PostConstructHook::new(name, hook));
        self
    }

    /// 声明实现的能力契约，并登记到该契约的视图转换
    pub fn implements<I, F>(mut self, cast: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        let contract = TypeRef::of::<I>();
        self.descriptor.views.insert(contract.clone(), erase_view(cast));
        if !self.descriptor.contracts.contains(&contract) {
            self.descriptor.contracts.push(contract);
        }
        self
    }

    /// 仅按名称声明能力契约（无视图）
    pub fn contract(mut self, contract: TypeRef) -> Self {
        if !self.descriptor.contracts.contains(&contract) {
            self.descriptor.contracts.push(contract);
        }
        self
    }

    /// 声明直接父类型
    pub fn extends<B, F>(mut self, cast: F) -> Self
    where
        B: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<B> + Send + Sync + 'static,
    {
        let supertype = TypeRef::of::<B>();
        self.descriptor.views.insert(supertype.clone(), erase_view(cast));
        self.descriptor.supertype = Some(supertype);
        self
    }

    /// 仅按名称声明直接父类型（无视图）
    pub fn supertype(mut self, supertype: TypeRef) -> Self {
        self.descriptor.supertype = Some(supertype);
        self
    }

    pub fn build(self) -> Arc<ComponentDescriptor> {
        Arc::new(self.descriptor)
    }
}

fn erase_view<T, I, F>(cast: F) -> ViewFn
where
    T: Any + Send + Sync,
    I: ?Sized + Send + Sync + 'static,
    F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
{
    Arc::new(move |object: AnyObject| {
        object
            .downcast::<T>()
            .ok()
            .map(|concrete| Box::new(cast(concrete)) as BoxedObject)
    })
}
