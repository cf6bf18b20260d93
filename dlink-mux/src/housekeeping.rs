//! 内务遥测计数
//!
//! 操作员只能通过这些计数观察丢弃和失败。

use serde::Serialize;

use crate::frame::FrameKind;

/// 消息丢弃原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    ChannelDisabled,
    OversizedMessage,
    EmptyMessage,
    ChannelBackpressure,
}

/// 单通道计数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelCounters {
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub full_frames: u64,
    pub overflow_frames: u64,
    pub critical_frames: u64,
    pub idle_frames: u64,
    pub fill_frames: u64,
    pub packets: u64,
    pub messages_packed: u64,
    pub dropped_disabled: u64,
    pub dropped_oversized: u64,
    pub dropped_empty: u64,
    pub dropped_backpressure: u64,
    pub transport_errors: u64,
    /// 端口未使能时丢弃的帧
    pub frames_discarded: u64,
    pub throttle_deferrals: u64,
}

impl ChannelCounters {
    pub fn record_frame(&mut self, kind: FrameKind) {
        match kind {
            FrameKind::Full => self.full_frames += 1,
            FrameKind::Overflow => self.overflow_frames += 1,
            FrameKind::Critical => self.critical_frames += 1,
            FrameKind::Idle => self.idle_frames += 1,
            FrameKind::Fill => self.fill_frames += 1,
            FrameKind::Packet => self.packets += 1,
        }
    }

    pub fn record_drop(&mut self, reason: DropReason, messages: u64) {
        match reason {
            DropReason::ChannelDisabled => self.dropped_disabled += messages,
            DropReason::OversizedMessage => self.dropped_oversized += messages,
            DropReason::EmptyMessage => self.dropped_empty += messages,
            DropReason::ChannelBackpressure => self.dropped_backpressure += messages,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped_disabled
            + self.dropped_oversized
            + self.dropped_empty
            + self.dropped_backpressure
    }
}

/// 调度循环计数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineCounters {
    pub cycles: u64,
    pub missed_wakeups: u64,
    pub wakeup_timeouts: u64,
    pub commands_accepted: u64,
    pub commands_rejected: u64,
    pub table_loads_ok: u64,
    pub table_loads_failed: u64,
    pub messages_routed: u64,
    pub messages_unrouted: u64,
}

/// 输入队列溢出计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueOverruns {
    pub wakeup: u64,
    pub command: u64,
    pub telemetry: u64,
}

/// 通道状态快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub index: usize,
    pub vcid: u8,
    pub enabled: bool,
    pub port_enabled: bool,
    pub destination: String,
    pub pending_bytes: usize,
    pub deferred_frames: usize,
    pub held: bool,
    pub vc_count: u8,
    pub counters: ChannelCounters,
}

/// 内务遥测包
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HousekeepingPacket {
    pub engine: EngineCounters,
    pub queue_overruns: QueueOverruns,
    pub table_entries: usize,
    pub last_table_error: Option<String>,
    pub channels: Vec<ChannelStatus>,
}

impl HousekeepingPacket {
    /// 所有通道已发送帧总数
    pub fn total_frames_sent(&self) -> u64 {
        self.channels.iter().map(|c| c.counters.frames_sent).sum()
    }

    /// 所有通道丢弃消息总数
    pub fn total_dropped(&self) -> u64 {
        self.channels.iter().map(|c| c.counters.dropped()).sum()
    }
}
