//! 总线消息定义
//!
//! 定义消息标识、遥测消息和唤醒信号

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// 消息标识（MID）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u16);

impl MessageId {
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl From<u16> for MessageId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = crate::config::deserialize_hex_u32(deserializer)?;
        u16::try_from(raw)
            .map(MessageId)
            .map_err(|_| serde::de::Error::custom(format!("message id {raw:#X} exceeds 16 bits")))
    }
}

/// 遥测消息
///
/// 入队后不可变；载荷通常是完整的空间包（含包头）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryMessage {
    pub mid: MessageId,
    pub payload: Bytes,
}

impl TelemetryMessage {
    pub fn new(mid: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            mid: MessageId(mid),
            payload: payload.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// 调度器唤醒信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeupSignal {
    /// 调度节拍编号
    pub tick: u64,
    /// 单调时基下的时间戳（毫秒）
    pub time_ms: u64,
}
