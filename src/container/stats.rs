use std::sync::atomic::{AtomicU64, Ordering};

/// 内部统计信息（原子计数器）
#[derive(Default)]
pub(crate) struct InnerStats {
    pub(crate) total_resolutions: AtomicU64,
    pub(crate) singleton_hits: AtomicU64,
    pub(crate) singleton_creations: AtomicU64,
    pub(crate) per_call_creations: AtomicU64,
    pub(crate) scoped_hits: AtomicU64,
    pub(crate) scoped_creations: AtomicU64,
    pub(crate) cycles_rejected: AtomicU64,
}

impl InnerStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, registered_components: usize, scoped_evictions: u64) -> ContextStats {
        ContextStats {
            total_resolutions: self.total_resolutions.load(Ordering::Relaxed),
            singleton_hits: self.singleton_hits.load(Ordering::Relaxed),
            singleton_creations: self.singleton_creations.load(Ordering::Relaxed),
            per_call_creations: self.per_call_creations.load(Ordering::Relaxed),
            scoped_hits: self.scoped_hits.load(Ordering::Relaxed),
            scoped_creations: self.scoped_creations.load(Ordering::Relaxed),
            scoped_evictions,
            cycles_rejected: self.cycles_rejected.load(Ordering::Relaxed),
            registered_components,
        }
    }
}

/// 上下文统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextStats {
    /// 总解析次数
    pub total_resolutions: u64,
    /// 单例缓存命中次数
    pub singleton_hits: u64,
    /// 单例创建次数
    pub singleton_creations: u64,
    /// 按次创建次数
    pub per_call_creations: u64,
    /// 作用域缓存命中次数
    pub scoped_hits: u64,
    /// 作用域实例创建次数
    pub scoped_creations: u64,
    /// 因作用域销毁而清理的实例数
    pub scoped_evictions: u64,
    /// 被拒绝的循环依赖次数
    pub cycles_rejected: u64,
    /// 已注册的组件数量
    pub registered_components: usize,
}

impl ContextStats {
    /// 单例缓存命中率（小数形式）
    pub fn singleton_hit_rate(&self) -> f64 {
        let total = self.singleton_hits + self.singleton_creations;
        if total == 0 {
            0.0
        } else {
            self.singleton_hits as f64 / total as f64
        }
    }

    /// 性能摘要
    pub fn summary(&self) -> String {
        format!(
            "Context: {} resolutions, {:.1}% singleton hit rate, {} registered components, {} per-call / {} scoped creations",
            self.total_resolutions,
            self.singleton_hit_rate() * 100.0,
            self.registered_components,
            self.per_call_creations,
            self.scoped_creations
        )
    }
}
