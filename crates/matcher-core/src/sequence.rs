//! 请求序号与存活标记
//!
//! 每个逻辑槽位（一个表单、一个查看器、一个上传会话）只保存最新请求的序号。
//! 响应到达时与当前序号比较，旧序号的响应直接丢弃。

use crate::error::{MatcherError, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// 单次请求的标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// 单调递增的请求序号发生器
#[derive(Debug)]
pub struct RequestSequencer {
    slot: &'static str,
    latest: AtomicU64,
    settled: AtomicU64,
}

impl RequestSequencer {
    /// 为指定槽位创建序号发生器
    pub fn new(slot: &'static str) -> Self {
        Self {
            slot,
            latest: AtomicU64::new(0),
            settled: AtomicU64::new(0),
        }
    }

    pub fn slot(&self) -> &'static str {
        self.slot
    }

    /// 发出新请求，之前的所有请求随即过期
    pub fn issue(&self) -> RequestToken {
        let value = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!("{}: issued request token {}", self.slot, value);
        RequestToken(value)
    }

    /// 最新发出的序号
    pub fn current(&self) -> Option<RequestToken> {
        match self.latest.load(Ordering::SeqCst) {
            0 => None,
            value => Some(RequestToken(value)),
        }
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        self.latest.load(Ordering::SeqCst) == token.0
    }

    /// 检查响应是否仍然有效，过期时返回 `StaleResponseIgnored`
    pub fn check(&self, token: RequestToken) -> Result<()> {
        let current = self.latest.load(Ordering::SeqCst);
        if current == token.0 {
            Ok(())
        } else {
            tracing::debug!(
                "{}: discarding stale response (token {}, current {})",
                self.slot,
                token.0,
                current
            );
            Err(MatcherError::StaleResponseIgnored {
                slot: self.slot,
                token: token.0,
                current,
            })
        }
    }

    /// 标记请求已完成（无论结果是否被采用）
    pub fn settle(&self, token: RequestToken) {
        self.settled.fetch_max(token.0, Ordering::SeqCst);
    }

    /// 最新请求是否仍在进行中
    pub fn in_flight(&self) -> bool {
        self.settled.load(Ordering::SeqCst) < self.latest.load(Ordering::SeqCst)
    }
}

/// 组件存活标记，组件拆除后完成回调不得再修改状态
#[derive(Debug, Clone)]
pub struct Liveness {
    alive: Arc<AtomicBool>,
}

impl Liveness {
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// 标记组件已拆除，返回之前是否存活
    pub fn teardown(&self) -> bool {
        self.alive.swap(false, Ordering::SeqCst)
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}
