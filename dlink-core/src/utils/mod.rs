//! 工具模块
//!
//! 帧差错控制和位操作

/// CRC-16 帧差错控制（CCITT，多项式0x1021，初值0xFFFF）
pub fn calculate_ccsds_crc(data: &[u8]) -> u16 {
    let mut crc = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// 位操作工具
///
/// 位序为大端：第0位是首字节最高位。超出数据长度的位读为0，写入时忽略。
pub mod bit_ops {
    /// 读取 `start_bit` 起 `bit_count` 位的字段
    pub fn extract_bits(data: &[u8], start_bit: usize, bit_count: usize) -> u64 {
        debug_assert!(bit_count <= 64);
        (start_bit..start_bit + bit_count)
            .fold(0u64, |field, pos| (field << 1) | u64::from(bit_at(data, pos)))
    }

    /// 将 `value` 的低 `bit_count` 位写入 `start_bit` 起的字段
    pub fn set_bits(data: &mut [u8], start_bit: usize, bit_count: usize, value: u64) {
        debug_assert!(bit_count <= 64);
        for (offset, pos) in (start_bit..start_bit + bit_count).enumerate() {
            let Some(byte) = data.get_mut(pos / 8) else {
                break;
            };
            let mask = 0x80u8 >> (pos % 8);
            if (value >> (bit_count - 1 - offset)) & 1 == 1 {
                *byte |= mask;
            } else {
                *byte &= !mask;
            }
        }
    }

    fn bit_at(data: &[u8], pos: usize) -> u8 {
        data.get(pos / 8).map_or(0, |byte| (byte >> (7 - pos % 8)) & 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_ccsds_crc() {
        // CRC-16/CCITT-FALSE 标准校验值
        assert_eq!(calculate_ccsds_crc(b"123456789"), 0x29B1);
        assert_eq!(calculate_ccsds_crc(&[]), 0xFFFF);
    }

    #[test]
    fn test_set_and_extract_bits() {
        let mut header = [0u8; 2];
        bit_ops::set_bits(&mut header, 2, 10, 0x042); // 航天器标识
        bit_ops::set_bits(&mut header, 12, 3, 5); // 虚拟信道
        assert_eq!(header, [0x04, 0x2A]);
        assert_eq!(bit_ops::extract_bits(&header, 2, 10), 0x042);
        assert_eq!(bit_ops::extract_bits(&header, 12, 3), 5);
    }

    #[test]
    fn test_set_bits_truncates_and_clears() {
        let mut data = [0xFFu8; 2];
        // 只写入低4位，其余位保持
        bit_ops::set_bits(&mut data, 4, 4, 0x1A);
        assert_eq!(data, [0xFA, 0xFF]);
        bit_ops::set_bits(&mut data, 12, 8, 0);
        assert_eq!(data, [0xFA, 0xF0]);
        assert_eq!(bit_ops::extract_bits(&data, 12, 8), 0);
    }
}
