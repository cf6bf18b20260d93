//! 下行链路错误定义
//!
//! 除 `ConfigError` 外，所有错误都只在本地计数并通过遥测上报，不会中断处理周期。

use thiserror::Error;

/// 队列已满（生产者侧溢出，消息被丢弃）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Queue '{queue}' is full (depth: {depth})")]
pub struct QueueFull {
    pub queue: &'static str,
    pub depth: usize,
}

/// 路由表校验错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("Routing table has {count} entries (max: {max})")]
    TooManyEntries { count: usize, max: usize },

    #[error("Entry {index} (mid 0x{mid:04X}) routes to no channel")]
    EmptyMask { index: usize, mid: u16 },

    #[error("Entry {index} (mid 0x{mid:04X}) references channel {channel}, only {channel_count} configured")]
    ChannelOutOfRange {
        index: usize,
        mid: u16,
        channel: usize,
        channel_count: usize,
    },

    #[error("Entry {index} duplicates mid 0x{mid:04X} on channel {channel}")]
    DuplicateRoute { index: usize, mid: u16, channel: usize },

    #[error("Routing table declares {count} critical mids (max: {max})")]
    TooManyCritical { count: usize, max: usize },
}

/// 传输层发送失败
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport would block")]
    WouldBlock,

    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport closed")]
    Closed,
}

/// 静态配置错误，仅在初始化阶段出现且为致命错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid channel count {count} (must be 1..={max})")]
    ChannelCount { count: usize, max: usize },

    #[error("Channel {channel}: {reason}")]
    Channel { channel: usize, reason: String },

    #[error("Queue '{queue}' depth must be greater than zero")]
    QueueDepth { queue: &'static str },

    #[error("Invalid limits: {0}")]
    Limits(String),

    #[error("Default routing table rejected: {0}")]
    DefaultTable(#[from] TableError),
}

/// 下行链路统一错误类型
#[derive(Debug, Error)]
pub enum DownlinkError {
    #[error(transparent)]
    QueueFull(#[from] QueueFull),

    #[error("Message 0x{mid:04X} of {size} bytes exceeds channel {channel} overflow capacity of {capacity} bytes")]
    OversizedMessage {
        mid: u16,
        channel: usize,
        size: usize,
        capacity: usize,
    },

    #[error("Message 0x{mid:04X} on channel {channel} has an empty payload")]
    EmptyMessage { mid: u16, channel: usize },

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("Channel {channel} buffer saturated while throttled")]
    ChannelBackpressure { channel: usize },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
