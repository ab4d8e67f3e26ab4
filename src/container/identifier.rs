//! 组件标识
//!
//! `TypeRef` 是结构化的类型引用，`ComponentId` 是注册表的键（限定名 + 类型）。

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// 结构化类型引用
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
    String,
    /// 元素类型相同的数组
    Array(Box<TypeRef>),
    /// 组件类型或能力契约（完整类型名）
    Named(Arc<str>),
}

impl TypeRef {
    /// 由 Rust 类型推导类型引用
    ///
    /// 基本类型映射为对应的种类，基本类型的 `Vec` 映射为 `Array`，
    /// 与 `FromValue::declared_type` 保持一致。其余类型（包括 `dyn Trait`
    /// 和组件类型的 `Vec`）映射为 `Named`；组件集合应通过 `get_components` 获取。
    pub fn of<T: ?Sized + 'static>() -> Self {
        let id = TypeId::of::<T>();
        primitive_of(id)
            .or_else(|| primitive_vec_of(id))
            .unwrap_or_else(|| TypeRef::named(std::any::type_name::<T>()))
    }

    pub fn named(full_name: impl AsRef<str>) -> Self {
        TypeRef::Named(Arc::from(full_name.as_ref()))
    }

    pub fn array(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    /// 完整类型名，作为默认限定名
    pub fn full_name(&self) -> String {
        match self {
            TypeRef::Named(name) => name.to_string(),
            TypeRef::Array(element) => format!("[{}]", element.full_name()),
            other => other.primitive_name().to_string(),
        }
    }

    pub fn is_named(&self) -> bool {
        matches!(self, TypeRef::Named(_))
    }

    pub fn is_integer(&self) -> bool {
        self.integer_bounds().is_some()
    }

    /// 整数类型的取值范围（以 i128 表示）
    pub(crate) fn integer_bounds(&self) -> Option<(i128, i128)> {
        let bounds = match self {
            TypeRef::I8 => (i8::MIN as i128, i8::MAX as i128),
            TypeRef::I16 => (i16::MIN as i128, i16::MAX as i128),
            TypeRef::I32 => (i32::MIN as i128, i32::MAX as i128),
            TypeRef::I64 => (i64::MIN as i128, i64::MAX as i128),
            TypeRef::U8 => (0, u8::MAX as i128),
            TypeRef::U16 => (0, u16::MAX as i128),
            TypeRef::U32 => (0, u32::MAX as i128),
            TypeRef::U64 => (0, u64::MAX as i128),
            _ => return None,
        };
        Some(bounds)
    }

    fn primitive_name(&self) -> &'static str {
        match self {
            TypeRef::Bool => "bool",
            TypeRef::I8 => "i8",
            TypeRef::I16 => "i16",
            TypeRef::I32 => "i32",
            TypeRef::I64 => "i64",
            TypeRef::U8 => "u8",
            TypeRef::U16 => "u16",
            TypeRef::U32 => "u32",
            TypeRef::U64 => "u64",
            TypeRef::F32 => "f32",
            TypeRef::F64 => "f64",
            TypeRef::Char => "char",
            TypeRef::String => "String",
            TypeRef::Array(_) | TypeRef::Named(_) => "",
        }
    }
}

macro_rules! primitive_table {
    ($wrap:ident; $($ty:ty => $variant:ident),* $(,)?) => {
        [$((TypeId::of::<$wrap<$ty>>(), TypeRef::$variant)),*]
    };
}

type Plain<T> = T;

fn primitive_of(id: TypeId) -> Option<TypeRef> {
    let table = primitive_table!(Plain;
        bool => Bool, i8 => I8, i16 => I16, i32 => I32, i64 => I64,
        u8 => U8, u16 => U16, u32 => U32, u64 => U64,
        f32 => F32, f64 => F64, char => Char, String => String,
    );
    table
        .into_iter()
        .find(|(candidate, _)| *candidate == id)
        .map(|(_, type_ref)| type_ref)
}

fn primitive_vec_of(id: TypeId) -> Option<TypeRef> {
    let table = primitive_table!(Vec;
        bool => Bool, i8 => I8, i16 => I16, i32 => I32, i64 => I64,
        u8 => U8, u16 => U16, u32 => U32, u64 => U64,
        f32 => F32, f64 => F64, char => Char, String => String,
    );
    table
        .into_iter()
        .find(|(candidate, _)| *candidate == id)
        .map(|(_, element)| TypeRef::array(element))
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// 注册表键：限定名 + 类型
///
/// 相同限定名与相同类型的两个标识指向同一个注册槽。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentId {
    qualifier: Arc<str>,
    type_ref: TypeRef,
}

impl ComponentId {
    /// 默认标识：限定名取类型完整名
    pub fn of(type_ref: TypeRef) -> Self {
        Self {
            qualifier: Arc::from(type_ref.full_name()),
            type_ref,
        }
    }

    pub fn qualified(qualifier: impl AsRef<str>, type_ref: TypeRef) -> Self {
        Self {
            qualifier: Arc::from(qualifier.as_ref()),
            type_ref,
        }
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    pub fn type_ref(&self) -> &TypeRef {
        &self.type_ref
    }

    /// 限定名是否为类型默认名
    pub fn is_default(&self) -> bool {
        self.qualifier.as_ref() == self.type_ref.full_name().as_str()
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.qualifier, self.type_ref)
    }
}
