//! 集成测试共用的组件

#![allow(dead_code)]

use appctx::container::{ComponentDescriptor, InjectionSpec, Lifetime, Parameter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 测试用的能力契约
pub trait Repository: Send + Sync {
    fn name(&self) -> String;
}

/// 测试用的服务实现
#[derive(Default)]
pub struct SqlRepository {
    pub url: String,
}

impl Repository for SqlRepository {
    fn name(&self) -> String {
        format!("sql:{}", self.url)
    }
}

/// 另一个测试实现
#[derive(Default)]
pub struct MemoryRepository;

impl Repository for MemoryRepository {
    fn name(&self) -> String {
        "memory".to_string()
    }
}

pub fn sql_repository() -> Arc<ComponentDescriptor> {
    ComponentDescriptor::builder::<SqlRepository>()
        .default_constructor()
        .config::<String, _>("url", "db.url", Some("sqlite::memory:"), |r, v| r.url = v)
        .implements::<dyn Repository, _>(|r| r as Arc<dyn Repository>)
        .build()
}

pub fn memory_repository() -> Arc<ComponentDescriptor> {
    ComponentDescriptor::builder::<MemoryRepository>()
        .default_constructor()
        .implements::<dyn Repository, _>(|r| r as Arc<dyn Repository>)
        .build()
}

/// 依赖仓储的服务（构造函数注入）
pub struct UserService {
    pub repo: Arc<dyn Repository>,
    pub greeting: String,
}

pub fn user_service(lifetime: Lifetime) -> Arc<ComponentDescriptor> {
    ComponentDescriptor::builder::<UserService>()
        .lifetime(lifetime)
        .constructor(
            vec![Parameter::injected::<Arc<dyn Repository>>("repo")],
            |args| {
                Ok(UserService {
                    repo: args.next()?,
                    greeting: "hello".to_string(),
                })
            },
        )
        .constructor(
            vec![
                Parameter::injected::<Arc<dyn Repository>>("repo"),
                Parameter::plain::<String>("greeting"),
            ],
            |args| {
                Ok(UserService {
                    repo: args.next()?,
                    greeting: args.next()?,
                })
            },
        )
        .build()
}

/// 属性注入的控制器（可选依赖）
#[derive(Default)]
pub struct Controller {
    pub repo: Option<Arc<dyn Repository>>,
}

pub fn controller() -> Arc<ComponentDescriptor> {
    ComponentDescriptor::builder::<Controller>()
        .default_constructor()
        .inject::<Arc<dyn Repository>, _>("repo", InjectionSpec::new(), |c, v| c.repo = Some(v))
        .build()
}

/// 记录构造次数的组件
pub struct Counted {
    pub serial: usize,
}

pub fn counted(lifetime: Lifetime, counter: Arc<AtomicUsize>) -> Arc<ComponentDescriptor> {
    ComponentDescriptor::builder::<Counted>()
        .lifetime(lifetime)
        .constructor(Vec::new(), move |_| {
            let serial = counter.fetch_add(1, Ordering::SeqCst);
            Ok(Counted { serial })
        })
        .build()
}
