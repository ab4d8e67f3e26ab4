//! 生命周期流水线
//!
//! 构造 -> 配置绑定 -> 属性注入 -> 初始化钩子，严格按顺序执行。任一阶段失败都会
//! 中止流水线，半初始化的对象不会被缓存或返回。

use super::context::ApplicationContext;
use super::descriptor::ComponentDescriptor;
use super::resolver::{DependencyResolver, InjectionOverride, ResolutionChain};
use super::scope::Scope;
use super::binder;
use super::value::{BoxedObject, Value};
use crate::errors::{ContextError, ContextResult};
use std::any::Any;
use std::fmt;

/// 对象所处的生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleStage {
    Uninstantiated,
    Constructed,
    ConfigBound,
    Injected,
    PostInitialized,
}

impl LifecycleStage {
    pub fn next(self) -> Option<Self> {
        match self {
            LifecycleStage::Uninstantiated => Some(LifecycleStage::Constructed),
            LifecycleStage::Constructed => Some(LifecycleStage::ConfigBound),
            LifecycleStage::ConfigBound => Some(LifecycleStage::Injected),
            LifecycleStage::Injected => Some(LifecycleStage::PostInitialized),
            LifecycleStage::PostInitialized => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == LifecycleStage::PostInitialized
    }
}

/// 以进入该阶段的转换命名，用于错误信息
impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleStage::Uninstantiated => "instantiation check",
            LifecycleStage::Constructed => "construction",
            LifecycleStage::ConfigBound => "configuration binding",
            LifecycleStage::Injected => "dependency injection",
            LifecycleStage::PostInitialized => "post-construction",
        };
        f.write_str(name)
    }
}

/// 构造完成后、配置绑定前调用的回调
pub type JustConstructed = dyn Fn(&mut dyn Any) -> anyhow::Result<()> + Send + Sync;

/// 单个对象的生命周期流水线
pub struct LifecyclePipeline<'a> {
    ctx: &'a ApplicationContext,
    descriptor: &'a ComponentDescriptor,
    scope: Option<&'a Scope>,
    overrides: Option<&'a InjectionOverride>,
    just_constructed: Option<&'a JustConstructed>,
    stage: LifecycleStage,
}

impl<'a> LifecyclePipeline<'a> {
    pub fn new(
        ctx: &'a ApplicationContext,
        descriptor: &'a ComponentDescriptor,
        scope: Option<&'a Scope>,
    ) -> Self {
        Self {
            ctx,
            descriptor,
            scope,
            overrides: None,
            just_constructed: None,
            stage: LifecycleStage::Uninstantiated,
        }
    }

    pub fn with_overrides(mut self, overrides: Option<&'a InjectionOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_just_constructed(mut self, callback: Option<&'a JustConstructed>) -> Self {
        self.just_constructed = callback;
        self
    }

    pub fn stage(&self) -> LifecycleStage {
        self.stage
    }

    fn resolver(&self) -> DependencyResolver<'a> {
        DependencyResolver::new(self.ctx, self.scope).with_overrides(self.overrides)
    }

    /// 完整流水线：从构造开始
    pub fn build(
        &mut self,
        args: Vec<Value>,
        chain: &mut ResolutionChain,
    ) -> ContextResult<BoxedObject> {
        let descriptor = self.descriptor;
        let type_ref = descriptor.type_ref();
        if descriptor.is_abstract() {
            return Err(ContextError::NotInstantiable {
                type_ref: type_ref.clone(),
            });
        }

        let mut object = self.resolver().construct(descriptor, args, chain)?;
        if let Some(callback) = self.just_constructed {
            callback(&mut *object).map_err(|source| ContextError::ConstructionFailed {
                type_ref: type_ref.clone(),
                stage: LifecycleStage::Constructed,
                source,
            })?;
        }
        self.advance(LifecycleStage::Constructed);

        self.initialize(&mut *object, chain)?;
        Ok(object)
    }

    /// 对已构造的对象执行配置绑定、属性注入和初始化钩子
    pub fn initialize(
        &mut self,
        target: &mut dyn Any,
        chain: &mut ResolutionChain,
    ) -> ContextResult<()> {
        let descriptor = self.descriptor;
        let type_ref = descriptor.type_ref();
        if self.stage < LifecycleStage::Constructed {
            self.advance(LifecycleStage::Constructed);
        }

        let sources = self.ctx.config_sources();
        let bound = binder::bind_configuration(target, descriptor, &sources)?;
        self.advance(LifecycleStage::ConfigBound);

        self.resolver().inject_properties(target, descriptor, chain)?;
        self.advance(LifecycleStage::Injected);

        for hook in descriptor.post_construct_hooks() {
            hook.invoke(target)
                .map_err(|source| ContextError::PostConstructFailed {
                    type_ref: type_ref.clone(),
                    hook: hook.name.clone(),
                    source,
                })?;
        }
        self.advance(LifecycleStage::PostInitialized);

        tracing::debug!(
            type_ref = %type_ref,
            config_bound = bound,
            hooks = descriptor.post_construct_hooks().len(),
            "Component initialized"
        );
        Ok(())
    }

    fn advance(&mut self, stage: LifecycleStage) {
        debug_assert_eq!(self.stage.next(), Some(stage));
        self.stage = stage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfigSource;
    use crate::container::ComponentDescriptor;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Default)]
    struct Journal {
        retries: u32,
        events: Vec<String>,
    }

    #[test]
    fn test_stage_order_and_display() {
        assert!(LifecycleStage::Uninstantiated < LifecycleStage::Constructed);
        assert!(LifecycleStage::Injected < LifecycleStage::PostInitialized);
        assert_eq!(LifecycleStage::ConfigBound.next(), Some(LifecycleStage::Injected));
        assert!(LifecycleStage::PostInitialized.is_terminal());
        assert_eq!(LifecycleStage::Injected.to_string(), "dependency injection");
    }

    #[test]
    fn test_pipeline_runs_stages_in_order() {
        let ctx = ApplicationContext::new();
        ctx.register_config_source(Arc::new(
            MapConfigSource::new("test").with("journal.retries", json!(3)),
        ));
        let observed = Arc::new(Mutex::new(Vec::new()));
        let observed_hook = observed.clone();
        let descriptor = ComponentDescriptor::builder::<Journal>()
            .default_constructor()
            .config::<u32, _>("retries", "journal.retries", None, |j, v| j.retries = v)
            .post_construct("record", move |j| {
                observed_hook.lock().push(j.retries);
                j.events.push("post".into());
                Ok(())
            })
            .build();

        let callback: Box<JustConstructed> = Box::new(|object| {
            let journal = object
                .downcast_mut::<Journal>()
                .ok_or_else(|| anyhow::anyhow!("unexpected type"))?;
            // 配置尚未绑定
            assert_eq!(journal.retries, 0);
            journal.events.push("constructed".into());
            Ok(())
        });

        let mut pipeline =
            LifecyclePipeline::new(&ctx, &descriptor, None).with_just_constructed(Some(callback.as_ref()));
        let mut chain = ResolutionChain::new();
        let object = pipeline.build(Vec::new(), &mut chain).unwrap();

        assert_eq!(pipeline.stage(), LifecycleStage::PostInitialized);
        let journal = object.downcast_ref::<Journal>().unwrap();
        assert_eq!(journal.events, vec!["constructed".to_string(), "post".to_string()]);
        assert_eq!(*observed.lock(), vec![3]);
    }

    #[test]
    fn test_abstract_descriptor_is_not_instantiable() {
        let ctx = ApplicationContext::new();
        let descriptor =
            ComponentDescriptor::abstract_type(crate::container::TypeRef::named("app::Plugin"));
        let mut pipeline = LifecyclePipeline::new(&ctx, &descriptor, None);
        let err = pipeline
            .build(Vec::new(), &mut ResolutionChain::new())
            .err()
            .unwrap();
        assert!(matches!(err, ContextError::NotInstantiable { .. }));
        assert_eq!(pipeline.stage(), LifecycleStage::Uninstantiated);
    }

    #[test]
    fn test_failing_hook_names_the_hook() {
        let ctx = ApplicationContext::new();
        let descriptor = ComponentDescriptor::builder::<Journal>()
            .default_constructor()
            .post_construct("validate", |_| Err(anyhow::anyhow!("invalid journal")))
            .build();
        let err = LifecyclePipeline::new(&ctx, &descriptor, None)
            .build(Vec::new(), &mut ResolutionChain::new())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ContextError::PostConstructFailed { ref hook, .. } if hook == "validate"
        ));
    }
}
