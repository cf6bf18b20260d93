//! 传输帧组装
//!
//! 导头 + 数据域（消息首尾相接）+ 可选差错控制域，最后可选整帧伪随机化。

pub mod header;
pub mod randomizer;

pub use header::{FrameHeader, FHP_IDLE_DATA};
pub use randomizer::{derandomize, randomize};

use bytes::{BufMut, Bytes, BytesMut};
use dlink_core::config::{FRAME_ERROR_CONTROL_SIZE, FRAME_HEADER_SIZE};
use dlink_core::utils::calculate_ccsds_crc;
use dlink_core::ChannelConfig;
use serde::Serialize;
use std::fmt;

/// 帧类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// 数据域已满（或放不下下一条消息）
    Full,
    /// 单条超长消息使用溢出帧长度
    Overflow,
    /// 关键消息立即刷新
    Critical,
    /// 空闲超时刷新
    Idle,
    /// 无数据的填充帧
    Fill,
    /// 原始包模式
    Packet,
}

impl FrameKind {
    /// 节流保持期间合并刷新原因时的优先级
    fn rank(self) -> u8 {
        match self {
            FrameKind::Critical => 3,
            FrameKind::Full | FrameKind::Overflow => 2,
            FrameKind::Idle => 1,
            FrameKind::Fill | FrameKind::Packet => 0,
        }
    }

    /// 取优先级较高者
    pub fn merge(self, other: FrameKind) -> FrameKind {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameKind::Full => "full",
            FrameKind::Overflow => "overflow",
            FrameKind::Critical => "critical",
            FrameKind::Idle => "idle",
            FrameKind::Fill => "fill",
            FrameKind::Packet => "packet",
        };
        f.write_str(name)
    }
}

/// 通道的帧格式参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub spacecraft_id: u16,
    pub vcid: u8,
    pub error_control: bool,
    pub randomize: bool,
}

impl FrameLayout {
    pub fn from_config(config: &ChannelConfig) -> Self {
        Self {
            spacecraft_id: config.spacecraft_id,
            vcid: config.vcid,
            error_control: config.error_control,
            randomize: config.randomize,
        }
    }

    pub fn trailer_len(&self) -> usize {
        if self.error_control {
            FRAME_ERROR_CONTROL_SIZE
        } else {
            0
        }
    }

    /// 给定帧长度下的数据域容量
    pub fn data_capacity(&self, frame_len: usize) -> usize {
        frame_len.saturating_sub(FRAME_HEADER_SIZE + self.trailer_len())
    }

    /// 组装一帧
    ///
    /// # 参数
    /// - `master_count`, `vc_count`: 帧计数
    /// - `data`: 数据域内容，不足部分零填充
    /// - `frame_len`: 帧总长度
    ///
    /// 调用方保证 `data.len() <= self.data_capacity(frame_len)`。
    pub fn build(&self, master_count: u8, vc_count: u8, data: &[u8], frame_len: usize) -> Bytes {
        debug_assert!(data.len() <= self.data_capacity(frame_len));

        let header = FrameHeader {
            spacecraft_id: self.spacecraft_id,
            vcid: self.vcid,
            master_count,
            vc_count,
            first_header_pointer: if data.is_empty() { FHP_IDLE_DATA } else { 0 },
        };

        let mut buf = BytesMut::with_capacity(frame_len);
        header.encode(&mut buf);
        buf.put_slice(data);
        buf.resize(frame_len - self.trailer_len(), 0);

        if self.error_control {
            let crc = calculate_ccsds_crc(&buf);
            buf.put_u16(crc);
        }
        if self.randomize {
            randomize(&mut buf);
        }

        buf.freeze()
    }

    /// 接收端校验：去随机化并检查差错控制域
    ///
    /// # 返回
    /// - `Some(frame)`: 去随机化后的帧
    /// - `None`: 长度不足或校验失败
    pub fn verify(&self, frame: &[u8]) -> Option<Vec<u8>> {
        if frame.len() < FRAME_HEADER_SIZE + self.trailer_len() {
            return None;
        }
        let mut plain = frame.to_vec();
        if self.randomize {
            derandomize(&mut plain);
        }
        if self.error_control {
            let body_len = plain.len() - FRAME_ERROR_CONTROL_SIZE;
            let expected = u16::from_be_bytes([plain[body_len], plain[body_len + 1]]);
            if calculate_ccsds_crc(&plain[..body_len]) != expected {
                return None;
            }
        }
        Some(plain)
    }
}
