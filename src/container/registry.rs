//! 组件注册表
//!
//! 一个注册项（具体类型 + 实例化策略）会被关联到多个键下：自身的默认标识、
//! 实现的每个能力契约，以及直接父类型（只关联直接父类型，不追溯整条祖先链）。

use super::descriptor::ComponentDescriptor;
use super::factory::FactoryStrategy;
use super::identifier::{ComponentId, TypeRef};
use super::value::TypeHierarchy;
use super::Lifetime;
use crate::errors::{ContextError, ContextResult};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// 注册项：具体类型及其实例化策略
pub struct Registration {
    id: ComponentId,
    descriptor: Arc<ComponentDescriptor>,
    factory: Arc<dyn FactoryStrategy>,
}

impl Registration {
    /// 注册项自身的标识（限定名 + 具体类型）
    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    pub fn descriptor(&self) -> &Arc<ComponentDescriptor> {
        &self.descriptor
    }

    pub fn factory(&self) -> &Arc<dyn FactoryStrategy> {
        &self.factory
    }

    pub fn concrete_type(&self) -> &TypeRef {
        self.descriptor.type_ref()
    }

    pub fn lifetime(&self) -> Lifetime {
        self.factory.lifetime()
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("lifetime", &self.lifetime())
            .finish()
    }
}

/// 组件注册表
#[derive(Default)]
pub struct ComponentRegistry {
    slots: DashMap<ComponentId, Vec<Arc<Registration>>>,
    descriptors: DashMap<TypeRef, Arc<ComponentDescriptor>>,
    registrations: RwLock<Vec<Arc<Registration>>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册具体类型
    ///
    /// 相同 (限定名, 具体类型) 的重复注册返回已有注册项。
    pub fn register(
        &self,
        descriptor: Arc<ComponentDescriptor>,
        qualifier: Option<&str>,
        factory: Arc<dyn FactoryStrategy>,
    ) -> Arc<Registration> {
        let explicit = qualifier.filter(|q| !q.is_empty());
        let type_ref = descriptor.type_ref().clone();
        let id = match explicit {
            Some(q) => ComponentId::qualified(q, type_ref.clone()),
            None => ComponentId::of(type_ref.clone()),
        };

        if let Some(existing) = self.find_exact(&id) {
            tracing::debug!(component = %id, "Component already registered");
            return existing;
        }

        let registration = Arc::new(Registration {
            id: id.clone(),
            descriptor: descriptor.clone(),
            factory,
        });
        let keys = registration_keys(&descriptor, explicit);
        for key in &keys {
            self.slots
                .entry(key.clone())
                .or_default()
                .push(registration.clone());
        }
        self.descriptors.insert(type_ref, descriptor);
        self.registrations.write().push(registration.clone());

        tracing::debug!(
            component = %id,
            lifetime = ?registration.lifetime(),
            keys = keys.len(),
            "Component registered"
        );
        registration
    }

    /// 注册抽象类型：只创建空的注册槽，之后由具体类型的关联填充
    pub fn register_abstract(&self, descriptor: Arc<ComponentDescriptor>) {
        let type_ref = descriptor.type_ref().clone();
        self.slots.entry(ComponentId::of(type_ref.clone())).or_default();
        self.descriptors.insert(type_ref.clone(), descriptor);
        tracing::debug!(type_ref = %type_ref, "Abstract slot registered");
    }

    fn find_exact(&self, id: &ComponentId) -> Option<Arc<Registration>> {
        self.slots.get(id).and_then(|slot| {
            slot.value()
                .iter()
                .find(|registration| registration.id() == id)
                .cloned()
        })
    }

    /// 按键查询候选注册项
    pub fn lookup(&self, id: &ComponentId) -> Vec<Arc<Registration>> {
        self.slots
            .get(id)
            .map(|slot| slot.value().clone())
            .unwrap_or_default()
    }

    /// 查询并选出唯一的候选
    ///
    /// 多个候选时，注册标识与请求标识相同的唯一候选胜出；其次是具体类型与请求类型
    /// 相同的唯一候选；否则报告歧义。
    pub fn select(&self, id: &ComponentId) -> ContextResult<Arc<Registration>> {
        select_candidate(id, self.lookup(id))
    }

    /// 是否存在该键的注册槽（抽象类型的空槽也算）
    pub fn has_slot(&self, id: &ComponentId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn descriptor(&self, type_ref: &TypeRef) -> Option<Arc<ComponentDescriptor>> {
        self.descriptors.get(type_ref).map(|d| d.value().clone())
    }

    /// 所有具体注册项（按注册顺序）
    pub fn registrations(&self) -> Vec<Arc<Registration>> {
        self.registrations.read().clone()
    }

    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TypeHierarchy for ComponentRegistry {
    fn is_subtype(&self, descriptor: &ComponentDescriptor, target: &TypeRef) -> bool {
        let mut visited: HashSet<TypeRef> = HashSet::new();
        let mut pending: Vec<TypeRef> = parents_of(descriptor);
        while let Some(parent) = pending.pop() {
            if &parent == target {
                return true;
            }
            if !visited.insert(parent.clone()) {
                continue;
            }
            if let Some(parent_descriptor) = self.descriptor(&parent) {
                pending.extend(parents_of(&parent_descriptor));
            }
        }
        false
    }
}

fn parents_of(descriptor: &ComponentDescriptor) -> Vec<TypeRef> {
    descriptor
        .contracts()
        .iter()
        .chain(descriptor.supertype())
        .cloned()
        .collect()
}

/// 计算注册项关联的所有键
fn registration_keys(descriptor: &ComponentDescriptor, qualifier: Option<&str>) -> Vec<ComponentId> {
    let type_ref = descriptor.type_ref();
    let mut keys = Vec::new();
    if let Some(q) = qualifier {
        keys.push(ComponentId::qualified(q, type_ref.clone()));
    }
    keys.push(ComponentId::of(type_ref.clone()));

    for parent in descriptor.contracts().iter().chain(descriptor.supertype()) {
        keys.push(ComponentId::of(parent.clone()));
        if let Some(q) = qualifier {
            keys.push(ComponentId::qualified(q, parent.clone()));
        }
    }

    let mut seen = HashSet::new();
    keys.retain(|key| seen.insert(key.clone()));
    keys
}

pub(crate) fn select_candidate(
    id: &ComponentId,
    candidates: Vec<Arc<Registration>>,
) -> ContextResult<Arc<Registration>> {
    match candidates.len() {
        0 => Err(ContextError::ComponentNotFound { id: id.clone() }),
        1 => Ok(candidates[0].clone()),
        _ => {
            // 先按注册标识精确匹配，再按具体类型匹配
            let own: Vec<&Arc<Registration>> =
                candidates.iter().filter(|r| r.id() == id).collect();
            if let [single] = own.as_slice() {
                return Ok((*single).clone());
            }
            let exact: Vec<&Arc<Registration>> = candidates
                .iter()
                .filter(|registration| registration.concrete_type() == id.type_ref())
                .collect();
            if let [single] = exact.as_slice() {
                return Ok((*single).clone());
            }
            let names: Vec<String> = candidates.iter().map(|r| r.id().to_string()).collect();
            tracing::warn!(component = %id, candidates = ?names, "Ambiguous component lookup");
            Err(ContextError::AmbiguousComponent {
                id: id.clone(),
                candidates: names,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::factory::{PerCallFactory, SingletonFactory};

    trait Storage: Send + Sync {}

    #[derive(Default)]
    struct DiskStorage;
    impl Storage for DiskStorage {}

    #[derive(Default)]
    struct MemoryStorage;
    impl Storage for MemoryStorage {}

    #[derive(Default)]
    struct CachedDisk;

    fn disk() -> Arc<ComponentDescriptor> {
        ComponentDescriptor::builder::<DiskStorage>()
            .default_constructor()
            .implements::<dyn Storage, _>(|s| s as Arc<dyn Storage>)
            .build()
    }

    #[test]
    fn test_register_associates_contract_keys() {
        let registry = ComponentRegistry::new();
        let registration = registry.register(disk(), None, Arc::new(SingletonFactory::new()));

        let by_type = registry.lookup(&ComponentId::of(TypeRef::of::<DiskStorage>()));
        let by_contract = registry.lookup(&ComponentId::of(TypeRef::of::<dyn Storage>()));
        assert_eq!(by_type.len(), 1);
        assert_eq!(by_contract.len(), 1);
        assert!(Arc::ptr_eq(&by_type[0], &registration));
        assert!(Arc::ptr_eq(&by_contract[0], &registration));
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = ComponentRegistry::new();
        let first = registry.register(disk(), None, Arc::new(SingletonFactory::new()));
        let second = registry.register(disk(), None, Arc::new(PerCallFactory::new()));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_qualified_registration_keys() {
        let registry = ComponentRegistry::new();
        registry.register(disk(), Some("primary"), Arc::new(SingletonFactory::new()));

        let contract = TypeRef::of::<dyn Storage>();
        assert_eq!(registry.lookup(&ComponentId::qualified("primary", contract.clone())).len(), 1);
        assert_eq!(registry.lookup(&ComponentId::of(contract)).len(), 1);
        assert_eq!(registry.lookup(&ComponentId::of(TypeRef::of::<DiskStorage>())).len(), 1);
    }

    #[test]
    fn test_only_immediate_supertype_is_associated() {
        let registry = ComponentRegistry::new();
        let base = TypeRef::named("app::Base");
        let root = TypeRef::named("app::Root");
        let middle = ComponentDescriptor::builder::<DiskStorage>()
            .default_constructor()
            .supertype(base.clone())
            .build();
        registry.register_abstract(ComponentDescriptor::abstract_type(root.clone()));
        registry.register(middle, None, Arc::new(SingletonFactory::new()));

        let child = ComponentDescriptor::builder::<CachedDisk>()
            .default_constructor()
            .supertype(TypeRef::of::<DiskStorage>())
            .build();
        registry.register(child.clone(), None, Arc::new(SingletonFactory::new()));

        // 子类型只关联到直接父类型，不关联祖先
        assert_eq!(registry.lookup(&ComponentId::of(TypeRef::of::<DiskStorage>())).len(), 2);
        assert_eq!(registry.lookup(&ComponentId::of(base.clone())).len(), 1);
        // 抽象槽为空
        assert!(registry.has_slot(&ComponentId::of(root.clone())));
        assert!(registry.lookup(&ComponentId::of(root)).is_empty());
        // 层次查询仍可追溯祖先
        assert!(registry.is_subtype(&child, &base));
    }

    #[test]
    fn test_select_prefers_own_identifier() {
        let registry = ComponentRegistry::new();
        registry.register(disk(), Some("backup"), Arc::new(SingletonFactory::new()));
        let plain = registry.register(disk(), None, Arc::new(SingletonFactory::new()));

        let by_type = ComponentId::of(TypeRef::of::<DiskStorage>());
        assert_eq!(registry.lookup(&by_type).len(), 2);
        assert!(Arc::ptr_eq(&registry.select(&by_type).unwrap(), &plain));
        assert_eq!(
            registry
                .select(&ComponentId::qualified("backup", TypeRef::of::<DiskStorage>()))
                .unwrap()
                .id()
                .qualifier(),
            "backup"
        );
    }

    #[test]
    fn test_select_prefers_exact_type_then_reports_ambiguity() {
        let registry = ComponentRegistry::new();
        registry.register(disk(), None, Arc::new(SingletonFactory::new()));
        let memory = ComponentDescriptor::builder::<MemoryStorage>()
            .default_constructor()
            .implements::<dyn Storage, _>(|s| s as Arc<dyn Storage>)
            .build();
        registry.register(memory, None, Arc::new(SingletonFactory::new()));

        let contract = ComponentId::of(TypeRef::of::<dyn Storage>());
        assert!(matches!(
            registry.select(&contract),
            Err(ContextError::AmbiguousComponent { candidates, .. }) if candidates.len() == 2
        ));
        assert!(registry
            .select(&ComponentId::of(TypeRef::of::<MemoryStorage>()))
            .is_ok());
        assert!(matches!(
            registry.select(&ComponentId::of(TypeRef::named("app::Missing"))),
            Err(ContextError::ComponentNotFound { .. })
        ));
    }
}
