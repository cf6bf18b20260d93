//! 输出端口
//!
//! 每个通道一个端口。传输句柄由 `EnableOutput` 命令提供，引擎自身不打开或关闭任何套接字。

use bytes::Bytes;
use dlink_core::TransportError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 传输层抽象
///
/// `send` 必须是非阻塞的；失败由调用方计数，不在周期内重试。
pub trait Transport: Send {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// 目的地址描述
    fn destination(&self) -> String;
}

/// 端口发送结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// 端口未使能，帧被静默丢弃
    Discarded,
}

/// 输出端口
pub struct OutputPort {
    transport: Option<Box<dyn Transport>>,
    destination: String,
    enabled: bool,
}

impl OutputPort {
    /// 未连接的端口
    pub fn detached() -> Self {
        Self {
            transport: None,
            destination: String::new(),
            enabled: false,
        }
    }

    /// 挂接传输句柄并使能
    pub fn attach(&mut self, transport: Box<dyn Transport>) {
        self.destination = transport.destination();
        self.transport = Some(transport);
        self.enabled = true;
    }

    /// 禁止输出，传输句柄一并释放
    pub fn disable(&mut self) {
        self.enabled = false;
        self.transport = None;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && self.transport.is_some()
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn send(&mut self, frame: &[u8]) -> Result<SendOutcome, TransportError> {
        if !self.enabled {
            return Ok(SendOutcome::Discarded);
        }
        match self.transport.as_mut() {
            Some(transport) => {
                transport.send(frame)?;
                Ok(SendOutcome::Sent)
            }
            None => Ok(SendOutcome::Discarded),
        }
    }
}

impl Default for OutputPort {
    fn default() -> Self {
        Self::detached()
    }
}

/// 内存传输，记录发送的每一帧
///
/// 用于测试和本地回环。
pub struct CaptureTransport {
    label: String,
    log: CaptureLog,
}

/// `CaptureTransport` 的共享记录
#[derive(Clone, Default)]
pub struct CaptureLog {
    frames: Arc<Mutex<Vec<Bytes>>>,
    failures: Arc<AtomicUsize>,
}

impl CaptureTransport {
    pub fn new(label: impl Into<String>) -> (Self, CaptureLog) {
        let log = CaptureLog::default();
        (
            Self {
                label: label.into(),
                log: log.clone(),
            },
            log,
        )
    }
}

impl Transport for CaptureTransport {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let pending = self.log.failures.load(Ordering::Acquire);
        if pending > 0 {
            self.log.failures.store(pending - 1, Ordering::Release);
            return Err(TransportError::WouldBlock);
        }
        self.log.frames.lock().push(Bytes::copy_from_slice(frame));
        Ok(())
    }

    fn destination(&self) -> String {
        format!("capture:{}", self.label)
    }
}

impl CaptureLog {
    /// 已发送帧的副本
    pub fn frames(&self) -> Vec<Bytes> {
        self.frames.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 取出并清空已记录的帧
    pub fn take(&self) -> Vec<Bytes> {
        std::mem::take(&mut *self.frames.lock())
    }

    /// 让接下来的 `count` 次发送失败
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::Release);
    }
}
