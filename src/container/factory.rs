//! 实例化策略
//!
//! 三种策略实现同一个 `FactoryStrategy` 契约：
//! - `SingletonFactory`：按标识缓存，整个上下文生命周期只构造一次
//! - `PerCallFactory`：每次调用都构造新实例，不持有缓存
//! - `ScopedFactory`：按 (作用域, 标识) 缓存，作用域销毁时清理
//!
//! 带缓存的策略在等待其他线程的构造之前检查等待图，跨线程的构造循环
//! 会以 `CyclicDependency` 失败而不是互相阻塞。

use super::context::ApplicationContext;
use super::identifier::ComponentId;
use super::registry::Registration;
use super::resolver::ResolutionChain;
use super::scope::Scope;
use super::stats::InnerStats;
use super::value::{Instance, Value};
use super::Lifetime;
use crate::errors::{ContextError, ContextResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// 实例化策略契约
pub trait FactoryStrategy: Send + Sync {
    /// 策略对应的生命周期
    fn lifetime(&self) -> Lifetime;

    /// 获取组件实例，缓存未命中时通过生命周期流水线构造
    fn get_component(
        &self,
        ctx: &ApplicationContext,
        registration: &Registration,
        args: Vec<Value>,
        scope: Option<&Scope>,
        chain: &mut ResolutionChain,
    ) -> ContextResult<Instance>;
}

/// 跨线程构造的等待图
///
/// 记录每个正在构造的键由哪个线程持有，以及每个被阻塞的线程在等待哪个键。
struct WaitGraph<K: Eq + Hash + Clone> {
    owners: DashMap<K, ThreadId>,
    waiting: DashMap<ThreadId, K>,
}

impl<K: Eq + Hash + Clone> Default for WaitGraph<K> {
    fn default() -> Self {
        Self {
            owners: DashMap::new(),
            waiting: DashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> WaitGraph<K> {
    /// 登记当前线程等待 `key`
    ///
    /// 沿 "键 -> 持有线程 -> 该线程等待的键" 的边回到当前线程时，
    /// 撤下等待边并返回循环上的键。
    fn wait_for(&self, key: &K) -> Result<WaitGuard<'_, K>, Vec<K>> {
        let me = thread::current().id();
        let previous = self.waiting.insert(me, key.clone());
        let guard = WaitGuard {
            graph: self,
            thread: me,
            previous,
        };
        match self.find_cycle(me, key) {
            Some(cycle) => Err(cycle),
            None => Ok(guard),
        }
    }

    fn find_cycle(&self, me: ThreadId, key: &K) -> Option<Vec<K>> {
        let mut path = vec![key.clone()];
        let mut visited = HashSet::new();
        let mut current = key.clone();
        loop {
            let owner = *self.owners.get(&current)?.value();
            if owner == me {
                return Some(path);
            }
            if !visited.insert(owner) {
                return None;
            }
            current = self.waiting.get(&owner)?.value().clone();
            path.push(current.clone());
        }
    }

    /// 当前线程开始构造 `key`：登记持有者，构造期间不算作等待
    fn begin_build(&self, key: &K) -> BuildGuard<'_, K> {
        let me = thread::current().id();
        self.owners.insert(key.clone(), me);
        let waiting = self.waiting.remove(&me).map(|(_, waited)| waited);
        BuildGuard {
            graph: self,
            key: key.clone(),
            thread: me,
            waiting,
        }
    }
}

struct WaitGuard<'a, K: Eq + Hash + Clone> {
    graph: &'a WaitGraph<K>,
    thread: ThreadId,
    previous: Option<K>,
}

impl<K: Eq + Hash + Clone> Drop for WaitGuard<'_, K> {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(previous) => {
                self.graph.waiting.insert(self.thread, previous);
            }
            None => {
                self.graph.waiting.remove(&self.thread);
            }
        }
    }
}

struct BuildGuard<'a, K: Eq + Hash + Clone> {
    graph: &'a WaitGraph<K>,
    key: K,
    thread: ThreadId,
    waiting: Option<K>,
}

impl<K: Eq + Hash + Clone> Drop for BuildGuard<'_, K> {
    fn drop(&mut self) {
        self.graph.owners.remove(&self.key);
        if let Some(waited) = self.waiting.take() {
            self.graph.waiting.insert(self.thread, waited);
        }
    }
}

/// 跨线程循环：链上首尾都是当前线程已持有的组件
fn cross_thread_cycle<L: Display>(ctx: &ApplicationContext, labels: Vec<L>) -> ContextError {
    InnerStats::bump(&ctx.inner_stats().cycles_rejected);
    let mut chain: Vec<String> = labels.iter().map(ToString::to_string).collect();
    if let Some(last) = chain.last().cloned() {
        chain.insert(0, last);
    }
    tracing::warn!(chain = %chain.join(" -> "), "Cross-thread cyclic dependency rejected");
    ContextError::CyclicDependency { chain }
}

/// 单例策略
///
/// 每个标识对应一个 `OnceCell`，并发首次解析时只有一个线程执行构造，其余线程等待结果。
#[derive(Default)]
pub struct SingletonFactory {
    cells: DashMap<ComponentId, Arc<OnceCell<Instance>>>,
    builds: WaitGraph<ComponentId>,
}

impl SingletonFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, id: &ComponentId) -> Arc<OnceCell<Instance>> {
        self.cells
            .entry(id.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// 预置实例；标识已有实例时返回 `false`
    pub fn seed(&self, id: &ComponentId, instance: Instance) -> bool {
        self.cell(id).set(instance).is_ok()
    }

    /// 查询已缓存的实例
    pub fn cached(&self, id: &ComponentId) -> Option<Instance> {
        self.cells.get(id).and_then(|cell| cell.value().get().cloned())
    }

    /// 已构造的单例数量
    pub fn len(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.value().get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FactoryStrategy for SingletonFactory {
    fn lifetime(&self) -> Lifetime {
        Lifetime::Singleton
    }

    fn get_component(
        &self,
        ctx: &ApplicationContext,
        registration: &Registration,
        args: Vec<Value>,
        _scope: Option<&Scope>,
        chain: &mut ResolutionChain,
    ) -> ContextResult<Instance> {
        let stats = ctx.inner_stats();
        let cell = self.cell(registration.id());
        if let Some(instance) = cell.get() {
            InnerStats::bump(&stats.singleton_hits);
            tracing::trace!(component = %registration.id(), "Singleton cache hit");
            return Ok(instance.clone());
        }

        let _waiting = self
            .builds
            .wait_for(registration.id())
            .map_err(|cycle| cross_thread_cycle(ctx, cycle))?;
        let mut created = false;
        // 单例构造不继承调用方的作用域
        let instance = cell.get_or_try_init(|| {
            created = true;
            let _building = self.builds.begin_build(registration.id());
            ctx.build_registered(registration, args, None, chain)
        })?;

        if created {
            InnerStats::bump(&stats.singleton_creations);
            tracing::debug!(component = %registration.id(), "Singleton created");
        } else {
            InnerStats::bump(&stats.singleton_hits);
        }
        Ok(instance.clone())
    }
}

/// 按次创建策略，不持有任何缓存
#[derive(Debug, Default)]
pub struct PerCallFactory;

impl PerCallFactory {
    pub fn new() -> Self {
        Self
    }
}

impl FactoryStrategy for PerCallFactory {
    fn lifetime(&self) -> Lifetime {
        Lifetime::PerCall
    }

    fn get_component(
        &self,
        ctx: &ApplicationContext,
        registration: &Registration,
        args: Vec<Value>,
        scope: Option<&Scope>,
        chain: &mut ResolutionChain,
    ) -> ContextResult<Instance> {
        let instance = ctx.build_registered(registration, args, scope, chain)?;
        InnerStats::bump(&ctx.inner_stats().per_call_creations);
        Ok(instance)
    }
}

type ScopedKey = (uuid::Uuid, ComponentId);

/// 作用域策略
///
/// 缓存以作用域 ID 为键，只持有作用域到实例的单向关联；
/// 销毁回调持有缓存的弱引用，作用域从不反向持有工厂。
#[derive(Default)]
pub struct ScopedFactory {
    cells: Arc<DashMap<ScopedKey, Arc<OnceCell<Instance>>>>,
    evictions: Arc<AtomicU64>,
    builds: WaitGraph<ScopedKey>,
}

impl ScopedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前缓存的 (作用域, 标识) 数量
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// 因作用域销毁而清理的条目数
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    fn cell(&self, scope: &Scope, registration: &Registration) -> ContextResult<Arc<OnceCell<Instance>>> {
        let key: ScopedKey = (scope.id(), registration.id().clone());
        let (cell, inserted) = match self.cells.entry(key.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let cell = Arc::new(OnceCell::new());
                entry.insert(cell.clone());
                (cell, true)
            }
        };

        if inserted {
            let cells = Arc::downgrade(&self.cells);
            let evictions = self.evictions.clone();
            let evict_key = key.clone();
            let subscribed = scope.on_destroy(move |_| {
                if let Some(cells) = cells.upgrade() {
                    if cells.remove(&evict_key).is_some() {
                        evictions.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
            if !subscribed {
                self.cells.remove(&key);
                return Err(destroyed_scope(registration, scope));
            }
        }
        Ok(cell)
    }
}

fn destroyed_scope(registration: &Registration, scope: &Scope) -> ContextError {
    ContextError::InvalidScope {
        type_ref: registration.descriptor().type_ref().clone(),
        reason: format!("scope '{}' ({}) has been destroyed", scope.name(), scope.id()),
    }
}

impl FactoryStrategy for ScopedFactory {
    fn lifetime(&self) -> Lifetime {
        Lifetime::Scoped
    }

    fn get_component(
        &self,
        ctx: &ApplicationContext,
        registration: &Registration,
        args: Vec<Value>,
        scope: Option<&Scope>,
        chain: &mut ResolutionChain,
    ) -> ContextResult<Instance> {
        let scope = scope.ok_or_else(|| ContextError::InvalidScope {
            type_ref: registration.descriptor().type_ref().clone(),
            reason: "scoped component requested without a scope".to_string(),
        })?;
        if scope.is_destroyed() {
            return Err(destroyed_scope(registration, scope));
        }

        let stats = ctx.inner_stats();
        let cell = self.cell(scope, registration)?;
        if let Some(instance) = cell.get() {
            InnerStats::bump(&stats.scoped_hits);
            tracing::trace!(component = %registration.id(), scope_id = %scope.id(), "Scoped cache hit");
            return Ok(instance.clone());
        }

        let key: ScopedKey = (scope.id(), registration.id().clone());
        let _waiting = self.builds.wait_for(&key).map_err(|cycle| {
            cross_thread_cycle(ctx, cycle.into_iter().map(|(_, id)| id).collect::<Vec<_>>())
        })?;
        let mut created = false;
        let instance = cell.get_or_try_init(|| {
            created = true;
            let _building = self.builds.begin_build(&key);
            ctx.build_registered(registration, args, Some(scope), chain)
        })?;

        if created {
            InnerStats::bump(&stats.scoped_creations);
            tracing::debug!(
                component = %registration.id(),
                scope_id = %scope.id(),
                scope_name = %scope.name(),
                "Scoped instance created"
            );
        } else {
            InnerStats::bump(&stats.scoped_hits);
        }
        Ok(instance.clone())
    }
}
