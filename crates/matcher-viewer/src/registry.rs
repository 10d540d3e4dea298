//! 二进制资源登记表
//!
//! 解码后的文档以 `blob:` 地址登记在这里，相当于宿主环境的对象URL表。
//! 每个登记项由唯一的 `ResourceHandle` 持有，句柄被丢弃时登记项随之释放。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

/// 二进制大对象
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl Blob {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    entries: Mutex<HashMap<String, Arc<Blob>>>,
    created: AtomicU64,
    released: AtomicU64,
}

impl RegistryInner {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<Blob>>> {
        // 登记表只做插入和删除，中毒后的数据依然一致
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn revoke(&self, uri: &str) {
        if self.entries().remove(uri).is_some() {
            self.released.fetch_add(1, Ordering::SeqCst);
            debug!("Released resource {}", uri);
        } else {
            warn!("Resource {} was already released", uri);
        }
    }
}

/// 资源登记表，可在多个查看器之间共享
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    inner: Arc<RegistryInner>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个对象并返回其唯一持有句柄
    pub fn create(&self, blob: Blob) -> ResourceHandle {
        let uri = format!("blob:matcher/{}", Uuid::new_v4());
        let size = blob.len();
        self.inner.entries().insert(uri.clone(), Arc::new(blob));
        self.inner.created.fetch_add(1, Ordering::SeqCst);
        debug!("Created resource {} ({} bytes)", uri, size);

        ResourceHandle {
            uri,
            registry: Arc::clone(&self.inner),
        }
    }

    /// 按地址读取对象，已释放的地址返回 None
    pub fn resolve(&self, uri: &str) -> Option<Arc<Blob>> {
        self.inner.entries().get(uri).cloned()
    }

    /// 当前存活的资源数
    pub fn live(&self) -> usize {
        self.inner.entries().len()
    }

    /// 累计创建数
    pub fn created(&self) -> u64 {
        self.inner.created.load(Ordering::SeqCst)
    }

    /// 累计释放数
    pub fn released(&self) -> u64 {
        self.inner.released.load(Ordering::SeqCst)
    }
}

/// 资源句柄，丢弃时释放对应登记项
#[derive(Debug)]
pub struct ResourceHandle {
    uri: String,
    registry: Arc<RegistryInner>,
}

impl ResourceHandle {
    /// 资源地址，可直接嵌入文档查看器
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// 显式释放
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        self.registry.revoke(&self.uri);
    }
}
