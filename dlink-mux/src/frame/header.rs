//! 传输帧主导头
//!
//! 6字节定长导头，大端序：
//! - 版本号(2) + 航天器标识(10) + 虚拟信道标识(3) + OCF标志(1)
//! - 主信道帧计数(8)
//! - 虚拟信道帧计数(8)
//! - 帧数据域状态：二级导头标志(1) + 同步标志(1) + 包顺序标志(1) + 段长标识(2) + 首导头指针(11)

use bytes::BufMut;
use dlink_core::config::FRAME_HEADER_SIZE;
use dlink_core::utils::bit_ops;

/// 首导头指针：数据域只有填充数据
pub const FHP_IDLE_DATA: u16 = 0x07FE;
/// 段长标识（不分段）
const SEGMENT_LENGTH_ID: u16 = 0b11;

/// 传输帧主导头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub spacecraft_id: u16,
    pub vcid: u8,
    pub master_count: u8,
    pub vc_count: u8,
    pub first_header_pointer: u16,
}

impl FrameHeader {
    /// 写入导头
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        // 版本号、OCF标志及二级导头/同步/包顺序标志均为0
        let mut header = [0u8; FRAME_HEADER_SIZE];
        bit_ops::set_bits(&mut header, 2, 10, u64::from(self.spacecraft_id));
        bit_ops::set_bits(&mut header, 12, 3, u64::from(self.vcid));
        bit_ops::set_bits(&mut header, 16, 8, u64::from(self.master_count));
        bit_ops::set_bits(&mut header, 24, 8, u64::from(self.vc_count));
        bit_ops::set_bits(&mut header, 35, 2, u64::from(SEGMENT_LENGTH_ID));
        bit_ops::set_bits(&mut header, 37, 11, u64::from(self.first_header_pointer));
        buf.put_slice(&header);
    }

    /// 解析导头
    ///
    /// # 返回
    /// - `Some(header)`: 解析成功
    /// - `None`: 数据不足6字节
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < FRAME_HEADER_SIZE {
            return None;
        }
        Some(Self {
            spacecraft_id: bit_ops::extract_bits(data, 2, 10) as u16,
            vcid: bit_ops::extract_bits(data, 12, 3) as u8,
            master_count: data[2],
            vc_count: data[3],
            first_header_pointer: bit_ops::extract_bits(data, 37, 11) as u16,
        })
    }
}
