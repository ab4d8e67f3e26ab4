//! 作用域
//!
//! 由调用方持有的生命周期边界（例如一次会话）。作用域销毁时只触发一次通知，
//! 作用域缓存借此清理对应实例；容器从不持有作用域本身。

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type DestroyListener = Box<dyn FnOnce(uuid::Uuid) + Send>;

struct ScopeInner {
    id: uuid::Uuid,
    name: String,
    destroyed: AtomicBool,
    listeners: Mutex<Vec<DestroyListener>>,
}

impl ScopeInner {
    fn fire(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let listeners = std::mem::take(&mut *self.listeners.lock());
        tracing::debug!(
            scope_id = %self.id,
            scope_name = %self.name,
            listeners = listeners.len(),
            "Scope destroyed"
        );
        for listener in listeners {
            listener(self.id);
        }
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.fire();
    }
}

/// 作用域句柄，可克隆；最后一个句柄释放时若尚未销毁则自动销毁
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// 创建新的作用域
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: uuid::Uuid::new_v4(),
                name: name.into(),
                destroyed: AtomicBool::new(false),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// 订阅销毁通知
    ///
    /// 作用域已销毁时返回 `false`，回调不会被登记。
    pub fn on_destroy<F>(&self, listener: F) -> bool
    where
        F: FnOnce(uuid::Uuid) + Send + 'static,
    {
        let mut listeners = self.inner.listeners.lock();
        // 在锁内检查，保证与 destroy 的取出操作线性化
        if self.is_destroyed() {
            return false;
        }
        listeners.push(Box::new(listener));
        true
    }

    /// 销毁作用域并通知订阅者，重复调用无效果
    pub fn destroy(&self) {
        self.inner.fire();
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Scope {}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
