//! 依赖解析与注册表的集成测试

mod common;

use appctx::container::{
    ComponentDescriptor, InjectionSpec, Lifetime, Parameter, TypeRef, Value,
};
use appctx::{ApplicationContext, ContextError, ContextOptions};
use common::{
    controller, counted, memory_repository, sql_repository, user_service, Controller, Counted,
    MemoryRepository, Repository, SqlRepository, UserService,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 两个构造函数：(注入, 普通 i32) 与 (普通 String)
struct Widget {
    made_by: &'static str,
}

fn widget() -> Arc<ComponentDescriptor> {
    ComponentDescriptor::builder::<Widget>()
        .lifetime(Lifetime::PerCall)
        .constructor(
            vec![
                Parameter::injected::<Arc<dyn Repository>>("a"),
                Parameter::plain::<i32>("b"),
            ],
            |_| Ok(Widget { made_by: "injected+int" }),
        )
        .constructor(vec![Parameter::plain::<String>("c")], |_| {
            Ok(Widget { made_by: "string" })
        })
        .build()
}

#[test]
fn test_constructor_selection_follows_plain_argument_shape() {
    let ctx = ApplicationContext::new();
    ctx.register_component(memory_repository());
    ctx.register_component(widget());

    let by_string = ctx.resolve_with::<Widget>(vec![Value::from("x")]).unwrap();
    assert_eq!(by_string.made_by, "string");

    let by_int = ctx.resolve_with::<Widget>(vec![Value::from(7)]).unwrap();
    assert_eq!(by_int.made_by, "injected+int");

    let err = ctx
        .resolve_with::<Widget>(vec![Value::from(1), Value::from(2)])
        .err()
        .unwrap();
    assert!(matches!(err, ContextError::NoMatchingConstructor { .. }));
}

/// 按属性名查找限定组件
#[derive(Default)]
struct Foo {
    label: String,
}

#[derive(Default)]
struct Consumer {
    foo: Option<Arc<Foo>>,
}

fn foo_descriptor() -> Arc<ComponentDescriptor> {
    ComponentDescriptor::builder::<Foo>().default_constructor().build()
}

#[test]
fn test_implicit_qualifier_takes_precedence_over_type() {
    let ctx = ApplicationContext::new();
    ctx.register_value(foo_descriptor(), Foo { label: "default".into() }, None)
        .unwrap();
    ctx.register_value(foo_descriptor(), Foo { label: "bar".into() }, Some("bar"))
        .unwrap();
    ctx.register_component(
        ComponentDescriptor::builder::<Consumer>()
            .default_constructor()
            .inject::<Arc<Foo>, _>("bar", InjectionSpec::new(), |c, v| c.foo = Some(v))
            .build(),
    );

    let consumer = ctx.resolve::<Consumer>().unwrap();
    assert_eq!(consumer.foo.as_ref().unwrap().label, "bar");

    // 类型查找仍返回默认注册
    assert_eq!(ctx.resolve::<Foo>().unwrap().label, "default");
    assert_eq!(
        ctx.get_qualified("bar", &TypeRef::of::<Foo>())
            .unwrap()
            .downcast::<Foo>()
            .unwrap()
            .label,
        "bar"
    );
}

#[test]
fn test_ambiguous_contract_lookup() {
    let ctx = ApplicationContext::new();
    ctx.register_component(sql_repository());
    ctx.register_component(memory_repository());

    let contract = TypeRef::of::<dyn Repository>();
    let all = ctx.get_components(&contract).unwrap();
    assert_eq!(all.len(), 2);

    let err = ctx.get_instance_of(&contract).unwrap_err();
    assert!(matches!(
        err,
        ContextError::AmbiguousComponent { ref candidates, .. } if candidates.len() == 2
    ));
    assert!(ctx.resolve::<dyn Repository>().is_err());

    // 具体类型不受影响
    assert!(ctx.resolve::<MemoryRepository>().is_ok());
}

#[test]
fn test_contract_view_resolution() {
    let ctx = ApplicationContext::new();
    ctx.register_component(sql_repository());

    let repo = ctx.resolve::<dyn Repository>().unwrap();
    assert_eq!(repo.name(), "sql:sqlite::memory:");

    // 契约视图与具体类型视图指向同一个单例
    let concrete = ctx.resolve::<SqlRepository>().unwrap();
    assert_eq!(concrete.url, "sqlite::memory:");
    assert_eq!(ctx.stats().singleton_creations, 1);
}

#[test]
fn test_explicit_qualifier_does_not_fall_back_by_default() {
    struct Reporter {
        repo: Option<Arc<dyn Repository>>,
    }
    let descriptor = ComponentDescriptor::builder::<Reporter>()
        .constructor(
            vec![Parameter::injected::<Arc<dyn Repository>>("repo")
                .qualified("primary")
                .optional()],
            |args| Ok(Reporter { repo: args.next()? }),
        )
        .build();

    let strict = ApplicationContext::new();
    strict.register_component(memory_repository());
    strict.register_component(descriptor.clone());
    assert!(strict.resolve::<Reporter>().unwrap().repo.is_none());

    let fallback =
        ApplicationContext::with_options(ContextOptions::default().with_qualified_fallback(true));
    fallback.register_component(memory_repository());
    fallback.register_component(descriptor);
    let reporter = fallback.resolve::<Reporter>().unwrap();
    assert_eq!(reporter.repo.as_ref().unwrap().name(), "memory");
}

#[test]
fn test_explicit_qualifier_lookup() {
    let ctx = ApplicationContext::new();
    ctx.register_service(sql_repository(), Some("primary")).unwrap();
    ctx.register_component(memory_repository());

    let consumer = ComponentDescriptor::builder::<Controller>()
        .default_constructor()
        .inject::<Arc<dyn Repository>, _>(
            "repo",
            InjectionSpec::qualified("primary"),
            |c, v| c.repo = Some(v),
        )
        .build();
    ctx.register_component(consumer);

    let controller = ctx.resolve::<Controller>().unwrap();
    assert!(controller.repo.as_ref().unwrap().name().starts_with("sql:"));
}

#[test]
fn test_missing_required_dependency() {
    let ctx = ApplicationContext::new();
    ctx.register_component(user_service(Lifetime::Singleton));

    let err = ctx.resolve::<UserService>().err().unwrap();
    assert!(matches!(
        err,
        ContextError::MissingRequiredDependency { ref point, .. } if point == "repo"
    ));
    assert!(err.is_not_found());

    // 构造失败不会留下缓存：补充依赖后可以正常构造
    ctx.register_component(memory_repository());
    assert_eq!(ctx.resolve::<UserService>().unwrap().repo.name(), "memory");
}

#[test]
fn test_lenient_mode_skips_missing_property() {
    let ctx =
        ApplicationContext::with_options(ContextOptions::default().with_strict_dependencies(false));
    ctx.register_component(controller());

    let controller = ctx.resolve::<Controller>().unwrap();
    assert!(controller.repo.is_none());
}

struct Left {
    _right: Arc<Right>,
}

struct Right {
    _left: Arc<Left>,
}

#[test]
fn test_cyclic_dependency_is_rejected() {
    let ctx = ApplicationContext::new();
    ctx.register_component(
        ComponentDescriptor::builder::<Left>()
            .constructor(vec![Parameter::injected::<Arc<Right>>("right")], |args| {
                Ok(Left {
                    _right: args.next()?,
                })
            })
            .build(),
    );
    ctx.register_component(
        ComponentDescriptor::builder::<Right>()
            .constructor(vec![Parameter::injected::<Arc<Left>>("left")], |args| {
                Ok(Right {
                    _left: args.next()?,
                })
            })
            .build(),
    );

    let err = ctx.resolve::<Left>().err().unwrap();
    match err {
        ContextError::CyclicDependency { chain } => {
            assert_eq!(chain.len(), 3);
            assert_eq!(chain.first(), chain.last());
        }
        other => panic!("expected cycle, got {}", other),
    }
    assert_eq!(ctx.stats().cycles_rejected, 1);
    assert_eq!(ctx.stats().singleton_creations, 0);
}

#[test]
fn test_abstract_slot_is_filled_by_subtypes() {
    let ctx = ApplicationContext::new();
    let plugin = TypeRef::named("app::Plugin");
    assert!(ctx
        .register_component(ComponentDescriptor::abstract_type(plugin.clone()))
        .is_none());
    assert!(!ctx.is_registered(&plugin));
    assert!(matches!(
        ctx.get_instance_of(&plugin),
        Err(ContextError::ComponentNotFound { .. })
    ));

    ctx.register_component(
        ComponentDescriptor::builder::<MemoryRepository>()
            .default_constructor()
            .supertype(plugin.clone())
            .build(),
    );
    assert!(ctx.is_registered(&plugin));
    let instance = ctx.get_instance_of(&plugin).unwrap();
    assert!(instance.downcast::<MemoryRepository>().is_some());
}

#[test]
fn test_register_service_qualifier_overrides_descriptor() {
    let ctx = ApplicationContext::new();
    let descriptor = ComponentDescriptor::builder::<MemoryRepository>()
        .qualifier("declared")
        .lifetime(Lifetime::PerCall)
        .default_constructor()
        .build();

    let registration = ctx.register_service(descriptor, Some("explicit")).unwrap();
    assert_eq!(registration.id().qualifier(), "explicit");
    assert_eq!(registration.lifetime(), Lifetime::Singleton);
    assert!(ctx
        .get_qualified("explicit", &TypeRef::of::<MemoryRepository>())
        .is_ok());
    assert!(ctx
        .get_qualified("declared", &TypeRef::of::<MemoryRepository>())
        .is_err());
}

#[test]
fn test_register_service_rejects_abstract_descriptor() {
    let ctx = ApplicationContext::new();
    let err = ctx
        .register_service(ComponentDescriptor::abstract_type(TypeRef::named("app::Port")), None)
        .unwrap_err();
    assert!(matches!(err, ContextError::NotInstantiable { .. }));
}

#[test]
fn test_register_instance_returns_same_object() {
    let ctx = ApplicationContext::new();
    let registered = ctx
        .register_value(sql_repository(), SqlRepository { url: "pg://db".into() }, None)
        .unwrap();

    let resolved = ctx.get_instance_of(&TypeRef::of::<SqlRepository>()).unwrap();
    assert!(registered.ptr_eq(&resolved));
    assert_eq!(ctx.resolve::<dyn Repository>().unwrap().name(), "sql:pg://db");
    assert_eq!(ctx.stats().singleton_creations, 0);

    let err = ctx
        .register_value(sql_repository(), MemoryRepository, None)
        .unwrap_err();
    assert!(matches!(err, ContextError::TypeMismatch { .. }));
}

#[test]
fn test_register_instance_rejects_per_call_registration() {
    let ctx = ApplicationContext::new();
    let counter = Arc::new(AtomicUsize::new(0));
    ctx.register_component(counted(Lifetime::PerCall, counter.clone()));

    let err = ctx
        .register_value(counted(Lifetime::PerCall, counter.clone()), Counted { serial: 999 }, None)
        .unwrap_err();
    assert!(matches!(
        err,
        ContextError::LifetimeConflict { lifetime: Lifetime::PerCall, .. }
    ));

    // 已有的按次注册不受影响
    let resolved = ctx.resolve::<Counted>().unwrap();
    assert_eq!(resolved.serial, 0);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_register_instance_keeps_existing_singleton() {
    let ctx = ApplicationContext::new();
    let first = ctx
        .register_value(sql_repository(), SqlRepository { url: "first".into() }, None)
        .unwrap();
    let second = ctx
        .register_value(sql_repository(), SqlRepository { url: "second".into() }, None)
        .unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(ctx.resolve::<SqlRepository>().unwrap().url, "first");
}

#[test]
fn test_registration_is_idempotent() {
    let ctx = ApplicationContext::new();
    let first = ctx.register_component(memory_repository()).unwrap();
    let second = ctx.register_component(memory_repository()).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(ctx.registered_types(), vec![TypeRef::of::<MemoryRepository>()]);
    assert_eq!(ctx.stats().registered_components, 1);
}

#[test]
fn test_solve_inject_dependency() {
    let ctx = ApplicationContext::new();
    ctx.register_service(memory_repository(), Some("cache")).unwrap();

    let contract = TypeRef::of::<dyn Repository>();
    let found = ctx
        .solve_inject_dependency(&contract, Some("cache"), None, None)
        .unwrap();
    assert!(matches!(found, Some(Value::Object(_))));

    let absent = ctx
        .solve_inject_dependency(&TypeRef::named("app::Unknown"), Some("x"), None, None)
        .unwrap();
    assert!(absent.is_none());
}
