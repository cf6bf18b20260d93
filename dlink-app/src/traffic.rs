//! 演示遥测流量
//!
//! 为路由表中的每个消息标识生成带空间包主导头的遥测消息

use bytes::{BufMut, BytesMut};
use dlink_core::{MessageId, TelemetryMessage};

/// 空间包主导头长度
const PRIMARY_HEADER_LEN: usize = 6;

/// 流量类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficType {
    Constant, // 恒定大小
    Burst,    // 偶尔大包
    Periodic, // 周期性大包
}

/// 流量配置
#[derive(Debug, Clone)]
pub struct TrafficConfig {
    pub traffic_type: TrafficType,
    pub packet_size_min: usize, // 最小包大小（字节）
    pub packet_size_max: usize, // 最大包大小（字节）
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            traffic_type: TrafficType::Burst,
            packet_size_min: 16,
            packet_size_max: 256,
        }
    }
}

/// 流量生成器
pub struct TrafficGenerator {
    config: TrafficConfig,
    mids: Vec<MessageId>,
    sequence_number: u16,
}

impl TrafficGenerator {
    pub fn new(config: TrafficConfig, mids: Vec<MessageId>) -> Self {
        Self {
            config,
            mids,
            sequence_number: 0,
        }
    }

    /// 为每个消息标识各生成一条消息
    pub fn generate_batch(&mut self) -> Vec<TelemetryMessage> {
        let mids = self.mids.clone();
        mids.into_iter().map(|mid| self.generate(mid)).collect()
    }

    /// 生成单条消息
    pub fn generate(&mut self, mid: MessageId) -> TelemetryMessage {
        self.sequence_number = (self.sequence_number + 1) & 0x3FFF;

        let packet_size = self.current_packet_size().max(PRIMARY_HEADER_LEN + 1);
        let data_len = packet_size - PRIMARY_HEADER_LEN;

        let mut packet = BytesMut::with_capacity(packet_size);
        // 版本0，遥测包，带副导头，APID取消息标识低11位
        packet.put_u16(0x0800 | (mid.value() & 0x07FF));
        // 独立包 + 包序列计数
        packet.put_u16(0xC000 | self.sequence_number);
        packet.put_u16((data_len - 1) as u16);
        for i in 0..data_len {
            packet.put_u8(((i + self.sequence_number as usize) % 256) as u8);
        }

        TelemetryMessage::new(mid.value(), packet.freeze())
    }

    fn current_packet_size(&self) -> usize {
        let seq = self.sequence_number as usize;
        match self.config.traffic_type {
            TrafficType::Constant => {
                (self.config.packet_size_min + self.config.packet_size_max) / 2
            }
            TrafficType::Burst => {
                if seq % 10 == 0 {
                    self.config.packet_size_max
                } else {
                    self.config.packet_size_min
                }
            }
            TrafficType::Periodic => {
                if seq % 5 == 0 {
                    self.config.packet_size_max
                } else {
                    self.config.packet_size_min
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_header() {
        let config = TrafficConfig {
            traffic_type: TrafficType::Constant,
            packet_size_min: 16,
            packet_size_max: 16,
        };
        let mut generator = TrafficGenerator::new(config, vec![MessageId(0x0880)]);
        let batch = generator.generate_batch();
        assert_eq!(batch.len(), 1);

        let msg = &batch[0];
        assert_eq!(msg.mid, MessageId(0x0880));
        assert_eq!(msg.len(), 16);
        assert_eq!(&msg.payload[..6], &[0x08, 0x80, 0xC0, 0x01, 0x00, 0x09]);
    }

    #[test]
    fn test_burst_sizes() {
        let mut generator = TrafficGenerator::new(TrafficConfig::default(), vec![MessageId(1)]);
        let sizes: Vec<usize> = (0..10).map(|_| generator.generate(MessageId(1)).len()).collect();
        assert_eq!(sizes[..9], [16; 9]);
        assert_eq!(sizes[9], 256);
    }
}
