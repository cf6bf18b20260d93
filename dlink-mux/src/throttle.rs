//! 节流门限
//!
//! 与批量文件下行服务共享物理链路时的协同流控。节流信号由外部子系统持有，
//! 本引擎只读。

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// 节流信号源
pub trait ThrottleSource: Send + Sync {
    /// 指定通道当前是否被节流
    fn is_throttled(&self, channel: usize) -> bool;
}

impl<F> ThrottleSource for F
where
    F: Fn(usize) -> bool + Send + Sync,
{
    fn is_throttled(&self, channel: usize) -> bool {
        self(channel)
    }
}

/// 从不节流
#[derive(Debug, Clone, Copy, Default)]
pub struct Unthrottled;

impl ThrottleSource for Unthrottled {
    fn is_throttled(&self, _channel: usize) -> bool {
        false
    }
}

/// 共享节流标志
///
/// 由外部子系统置位/清除：全局标志作用于所有通道，通道掩码只作用于对应位。
#[derive(Debug, Default)]
pub struct ThrottleFlag {
    all: AtomicBool,
    channels: AtomicU32,
}

impl ThrottleFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 节流全部通道
    pub fn assert_all(&self) {
        self.all.store(true, Ordering::Release);
    }

    /// 解除全局节流
    pub fn release_all(&self) {
        self.all.store(false, Ordering::Release);
    }

    pub fn assert_channel(&self, channel: usize) {
        if channel < 32 {
            self.channels.fetch_or(1 << channel, Ordering::AcqRel);
        }
    }

    pub fn release_channel(&self, channel: usize) {
        if channel < 32 {
            self.channels.fetch_and(!(1 << channel), Ordering::AcqRel);
        }
    }

    pub fn is_asserted(&self) -> bool {
        self.all.load(Ordering::Acquire) || self.channels.load(Ordering::Acquire) != 0
    }
}

impl ThrottleSource for ThrottleFlag {
    fn is_throttled(&self, channel: usize) -> bool {
        if self.all.load(Ordering::Acquire) {
            return true;
        }
        channel < 32 && self.channels.load(Ordering::Acquire) & (1 << channel) != 0
    }
}

/// 按名称共享的节流信号表
#[derive(Debug, Default)]
pub struct ThrottleRegistry {
    signals: Mutex<HashMap<String, Arc<ThrottleFlag>>>,
}

impl ThrottleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指定名称的信号，不存在时创建
    pub fn get_or_create(&self, name: &str) -> Arc<ThrottleFlag> {
        let mut signals = self.signals.lock();
        Arc::clone(
            signals
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(ThrottleFlag::new())),
        )
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<ThrottleFlag>> {
        self.signals.lock().get(name).cloned()
    }
}

/// 发送前的节流检查
#[derive(Clone)]
pub struct ThrottleGate {
    source: Arc<dyn ThrottleSource>,
}

impl ThrottleGate {
    pub fn new(source: Arc<dyn ThrottleSource>) -> Self {
        Self { source }
    }

    pub fn may_transmit(&self, channel: usize) -> bool {
        !self.source.is_throttled(channel)
    }
}

impl Default for ThrottleGate {
    fn default() -> Self {
        Self::new(Arc::new(Unthrottled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_per_channel_and_global() {
        let flag = Arc::new(ThrottleFlag::new());
        let gate = ThrottleGate::new(flag.clone());
        assert!(gate.may_transmit(0));

        flag.assert_channel(1);
        assert!(gate.may_transmit(0));
        assert!(!gate.may_transmit(1));

        flag.assert_all();
        assert!(!gate.may_transmit(0));

        flag.release_all();
        flag.release_channel(1);
        assert!(gate.may_transmit(1));
        assert!(!flag.is_asserted());
    }

    #[test]
    fn test_registry_shares_signal() {
        let registry = ThrottleRegistry::new();
        let a = registry.get_or_create("CFTOSemId");
        let b = registry.get_or_create("CFTOSemId");
        a.assert_all();
        assert!(b.is_asserted());
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn test_closure_source() {
        let gate = ThrottleGate::new(Arc::new(|channel: usize| channel == 2));
        assert!(gate.may_transmit(0));
        assert!(!gate.may_transmit(2));
    }
}
