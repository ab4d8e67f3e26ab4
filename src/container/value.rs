//! 运行时值与组件实例

use super::descriptor::ComponentDescriptor;
use super::identifier::TypeRef;
use crate::errors::ValueError;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 类型擦除的共享对象
pub type AnyObject = Arc<dyn Any + Send + Sync>;

/// 类型擦除的独占对象（构造阶段使用）
pub type BoxedObject = Box<dyn Any + Send + Sync>;

/// 运行时值：调用方参数、注入的依赖和配置值都以此表示
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    Str(String),
    Array(Vec<Value>),
    Object(Instance),
}

impl Value {
    /// 运行时类型描述（用于错误信息）
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "i64".to_string(),
            Value::UInt(_) => "u64".to_string(),
            Value::Float(_) => "f64".to_string(),
            Value::Char(_) => "char".to_string(),
            Value::Str(_) => "String".to_string(),
            Value::Array(items) => match items.first() {
                Some(first) => format!("[{}]", first.type_name()),
                None => "[]".to_string(),
            },
            Value::Object(instance) => instance.type_ref().full_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&Instance> {
        match self {
            Value::Object(instance) => Some(instance),
            _ => None,
        }
    }

    /// 检查值能否赋给声明类型
    ///
    /// 整数只要落在目标宽度内即可匹配；对象匹配自身类型、声明的契约以及
    /// `hierarchy` 能追溯到的祖先类型。
    pub fn is_assignable_to(&self, target: &TypeRef, hierarchy: &dyn TypeHierarchy) -> bool {
        match (self, target) {
            (Value::Null, TypeRef::Named(_)) => true,
            (Value::Bool(_), TypeRef::Bool) => true,
            (Value::Int(v), t) => fits_integer(*v as i128, t),
            (Value::UInt(v), t) => fits_integer(*v as i128, t),
            (Value::Float(_), TypeRef::F32 | TypeRef::F64) => true,
            (Value::Char(_), TypeRef::Char) => true,
            (Value::Str(_), TypeRef::String) => true,
            (Value::Array(items), TypeRef::Array(element)) => items
                .iter()
                .all(|item| item.is_assignable_to(element, hierarchy)),
            (Value::Object(instance), TypeRef::Named(_)) => {
                instance.type_ref() == target
                    || hierarchy.is_subtype(instance.descriptor(), target)
            }
            _ => false,
        }
    }
}

fn fits_integer(value: i128, target: &TypeRef) -> bool {
    target
        .integer_bounds()
        .map(|(min, max)| value >= min && value <= max)
        .unwrap_or(false)
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::Int(v) => write!(f, "Int({})", v),
            Value::UInt(v) => write!(f, "UInt({})", v),
            Value::Float(v) => write!(f, "Float({})", v),
            Value::Char(v) => write!(f, "Char({:?})", v),
            Value::Str(v) => write!(f, "Str({:?})", v),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            Value::Object(instance) => write!(f, "Object({:?})", instance),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident as $cast:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value as $cast)
                }
            }
        )*
    };
}

value_from! {
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => UInt as u64,
    u16 => UInt as u64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    f32 => Float as f64,
    f64 => Float as f64,
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Value::Char(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<Instance> for Value {
    fn from(value: Instance) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}

/// 类型层次查询，由注册表实现
pub trait TypeHierarchy {
    /// `descriptor` 描述的类型是否可以当作 `target` 使用
    fn is_subtype(&self, descriptor: &ComponentDescriptor, target: &TypeRef) -> bool;
}

/// 只看描述符自身声明的层次（不追溯祖先）
pub struct DeclaredHierarchy;

impl TypeHierarchy for DeclaredHierarchy {
    fn is_subtype(&self, descriptor: &ComponentDescriptor, target: &TypeRef) -> bool {
        descriptor.contracts().contains(target) || descriptor.supertype() == Some(target)
    }
}

/// 组件实例：共享的类型擦除对象及其描述符
#[derive(Clone)]
pub struct Instance {
    object: AnyObject,
    descriptor: Arc<ComponentDescriptor>,
}

impl Instance {
    pub(crate) fn new(object: AnyObject, descriptor: Arc<ComponentDescriptor>) -> Self {
        Self { object, descriptor }
    }

    pub fn type_ref(&self) -> &TypeRef {
        self.descriptor.type_ref()
    }

    pub fn descriptor(&self) -> &Arc<ComponentDescriptor> {
        &self.descriptor
    }

    pub fn object(&self) -> &AnyObject {
        &self.object
    }

    /// 向下转型为具体类型
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.object.clone().downcast::<T>().ok()
    }

    /// 以具体类型、能力契约或父类型视图访问实例
    pub fn view<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let view = self.descriptor.view_for(&TypeRef::of::<T>())?;
        view(self.object.clone())?
            .downcast::<Arc<T>>()
            .ok()
            .map(|boxed| *boxed)
    }

    /// 是否为同一个对象
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_ref().full_name())
            .field("ptr", &Arc::as_ptr(&self.object))
            .finish()
    }
}

/// 从运行时值转换为 Rust 类型
pub trait FromValue: Sized {
    /// 该 Rust 类型对应的声明类型
    fn declared_type() -> TypeRef;

    fn from_value(value: Value) -> Result<Self, ValueError>;
}

macro_rules! integer_from_value {
    ($($ty:ty => $type_ref:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn declared_type() -> TypeRef {
                    TypeRef::$type_ref
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    let wide: i128 = match value {
                        Value::Int(v) => v as i128,
                        Value::UInt(v) => v as i128,
                        other => {
                            return Err(ValueError::mismatch(stringify!($ty), other.type_name()))
                        }
                    };
                    <$ty>::try_from(wide).map_err(|_| ValueError::OutOfRange {
                        value: wide.to_string(),
                        target: stringify!($ty).to_string(),
                    })
                }
            }
        )*
    };
}

integer_from_value! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
}

impl FromValue for bool {
    fn declared_type() -> TypeRef {
        TypeRef::Bool
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(ValueError::mismatch("bool", other.type_name())),
        }
    }
}

impl FromValue for f64 {
    fn declared_type() -> TypeRef {
        TypeRef::F64
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(v) => Ok(v),
            other => Err(ValueError::mismatch("f64", other.type_name())),
        }
    }
}

impl FromValue for f32 {
    fn declared_type() -> TypeRef {
        TypeRef::F32
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(v) => Ok(v as f32),
            other => Err(ValueError::mismatch("f32", other.type_name())),
        }
    }
}

impl FromValue for char {
    fn declared_type() -> TypeRef {
        TypeRef::Char
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Char(v) => Ok(v),
            other => Err(ValueError::mismatch("char", other.type_name())),
        }
    }
}

impl FromValue for String {
    fn declared_type() -> TypeRef {
        TypeRef::String
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Str(v) => Ok(v),
            other => Err(ValueError::mismatch("String", other.type_name())),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn declared_type() -> TypeRef {
        TypeRef::array(T::declared_type())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(ValueError::mismatch(
                Self::declared_type().full_name(),
                other.type_name(),
            )),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn declared_type() -> TypeRef {
        T::declared_type()
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> FromValue for Arc<T> {
    fn declared_type() -> TypeRef {
        TypeRef::of::<T>()
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Object(instance) => instance.view::<T>().ok_or_else(|| {
                ValueError::mismatch(TypeRef::of::<T>().full_name(), instance.type_ref().full_name())
            }),
            other => Err(ValueError::mismatch(
                TypeRef::of::<T>().full_name(),
                other.type_name(),
            )),
        }
    }
}

/// 构造函数实参，按声明顺序依次取出
pub struct Arguments {
    values: std::vec::IntoIter<Value>,
    position: usize,
}

impl Arguments {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values: values.into_iter(),
            position: 0,
        }
    }

    /// 取出下一个参数并转换为 `T`
    pub fn next<T: FromValue>(&mut self) -> Result<T, ValueError> {
        let position = self.position;
        self.position += 1;
        let value = self
            .values
            .next()
            .ok_or(ValueError::MissingArgument(position))?;
        T::from_value(value)
    }

    /// 取出下一个原始值
    pub fn next_value(&mut self) -> Result<Value, ValueError> {
        let position = self.position;
        self.position += 1;
        self.values.next().ok_or(ValueError::MissingArgument(position))
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}
