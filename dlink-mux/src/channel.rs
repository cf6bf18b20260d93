//! 输出通道状态
//!
//! 每个已配置通道一个组帧上下文：定长数据域缓冲、帧计数、延迟队列和统计。

use bytes::Bytes;
use dlink_core::{ChannelConfig, FramingMode};
use std::collections::VecDeque;

use crate::frame::{FrameKind, FrameLayout};
use crate::housekeeping::ChannelCounters;

/// 已组好但尚未发送的帧
#[derive(Debug, Clone)]
pub struct PendingFrame {
    pub frame: Bytes,
    pub kind: FrameKind,
    /// 帧内消息数（帧被丢弃时用于计数）
    pub messages: u64,
}

/// 通道组帧上下文
pub struct Channel {
    index: usize,
    config: ChannelConfig,
    layout: FrameLayout,
    /// 数据域缓冲，容量固定为正常帧的数据域长度
    buffer: Box<[u8]>,
    used: usize,
    buffered_messages: u64,
    vc_count: u8,
    last_flush_ms: Option<u64>,
    enabled: bool,
    /// 节流期间被推迟的刷新
    held: Option<FrameKind>,
    deferred: VecDeque<PendingFrame>,
    pub(crate) counters: ChannelCounters,
}

impl Channel {
    /// 创建新的通道上下文
    ///
    /// # 参数
    /// - `index`: 通道索引
    /// - `config`: 已校验的通道配置
    pub fn new(index: usize, config: ChannelConfig) -> Self {
        let layout = FrameLayout::from_config(&config);
        let capacity = match config.framing {
            FramingMode::TransferFrame => layout.data_capacity(config.frame_size),
            FramingMode::RawPacket => 0,
        };
        let deferred_depth = config.deferred_depth;
        Self {
            index,
            enabled: config.enabled,
            layout,
            buffer: vec![0u8; capacity].into_boxed_slice(),
            used: 0,
            buffered_messages: 0,
            vc_count: 0,
            last_flush_ms: None,
            held: None,
            deferred: VecDeque::with_capacity(deferred_depth),
            counters: ChannelCounters::default(),
            config,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn counters(&self) -> &ChannelCounters {
        &self.counters
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_framed(&self) -> bool {
        self.config.framing == FramingMode::TransferFrame
    }

    /// 正常帧数据域容量
    pub fn data_capacity(&self) -> usize {
        self.buffer.len()
    }

    /// 单条消息允许的最大长度
    pub fn overflow_capacity(&self) -> usize {
        self.config.data_capacity(self.config.overflow_size())
    }

    /// 缓冲中待发字节数
    pub fn pending_bytes(&self) -> usize {
        self.used
    }

    pub fn pending_messages(&self) -> u64 {
        self.buffered_messages
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.used
    }

    pub fn vc_count(&self) -> u8 {
        self.vc_count
    }

    pub fn last_flush_ms(&self) -> Option<u64> {
        self.last_flush_ms
    }

    pub fn held(&self) -> Option<FrameKind> {
        self.held
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// 追加一条消息到数据域
    ///
    /// # 返回
    /// - `true`: 追加成功
    /// - `false`: 剩余空间不足，缓冲不变
    pub fn append(&mut self, data: &[u8], now_ms: u64) -> bool {
        if data.len() > self.remaining() {
            return false;
        }
        self.buffer[self.used..self.used + data.len()].copy_from_slice(data);
        self.used += data.len();
        self.buffered_messages += 1;
        self.counters.messages_packed += 1;
        if self.last_flush_ms.is_none() {
            self.last_flush_ms = Some(now_ms);
        }
        true
    }

    /// 自上次刷新起是否已达到空闲超时
    pub fn idle_due(&self, now_ms: u64) -> bool {
        match self.last_flush_ms {
            Some(last) => now_ms.saturating_sub(last) >= self.config.idle_timeout_ms,
            None => false,
        }
    }

    /// 开始计时空闲超时（尚无刷新记录时）
    pub fn arm_idle_clock(&mut self, now_ms: u64) {
        if self.last_flush_ms.is_none() {
            self.last_flush_ms = Some(now_ms);
        }
    }

    /// 分配下一个虚拟信道帧计数
    pub fn next_vc_count(&mut self) -> u8 {
        let count = self.vc_count;
        self.vc_count = self.vc_count.wrapping_add(1);
        count
    }

    /// 取出数据域并复位缓冲
    ///
    /// # 返回
    /// - (数据域内容, 消息数)
    pub fn take_data(&mut self, now_ms: u64) -> (Vec<u8>, u64) {
        let data = self.buffer[..self.used].to_vec();
        let messages = self.buffered_messages;
        self.used = 0;
        self.buffered_messages = 0;
        self.held = None;
        self.last_flush_ms = Some(now_ms);
        (data, messages)
    }

    /// 标记节流推迟的刷新
    ///
    /// # 返回
    /// - `true`: 本次为新推迟
    pub fn hold(&mut self, kind: FrameKind) -> bool {
        match self.held {
            Some(current) => {
                self.held = Some(current.merge(kind));
                false
            }
            None => {
                self.held = Some(kind);
                true
            }
        }
    }

    /// 延迟队列是否还有空间
    pub fn can_defer(&self) -> bool {
        self.deferred.len() < self.config.deferred_depth
    }

    pub fn push_deferred(&mut self, pending: PendingFrame) {
        self.deferred.push_back(pending);
    }

    pub fn pop_deferred(&mut self) -> Option<PendingFrame> {
        self.deferred.pop_front()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// 丢弃缓冲和延迟队列中的全部内容
    ///
    /// # 返回
    /// - 被丢弃的消息数
    pub fn discard_all(&mut self) -> u64 {
        let mut messages = self.buffered_messages;
        messages += self.deferred.drain(..).map(|p| p.messages).sum::<u64>();
        self.used = 0;
        self.buffered_messages = 0;
        self.held = None;
        messages
    }

    pub fn reset_counters(&mut self) {
        self.counters = ChannelCounters::default();
    }
}
