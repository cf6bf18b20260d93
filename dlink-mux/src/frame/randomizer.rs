//! 伪随机化
//!
//! 发送前将整帧与固定伪随机序列异或，以保证足够的比特跳变密度。
//! 生成多项式 h(x) = x^8 + x^7 + x^5 + x^3 + 1，初始状态全1，周期255字节。

/// 伪随机序列周期（字节）
pub const SEQUENCE_PERIOD: usize = 255;

/// 预先生成的一个周期的伪随机序列
pub static PSEUDO_RANDOM_SEQUENCE: [u8; SEQUENCE_PERIOD] = generate_sequence();

const fn generate_sequence() -> [u8; SEQUENCE_PERIOD] {
    let mut sequence = [0u8; SEQUENCE_PERIOD];
    let mut state: u8 = 0xFF;
    let mut i = 0;
    while i < SEQUENCE_PERIOD {
        let mut byte = 0u8;
        let mut bit = 0;
        while bit < 8 {
            byte = (byte << 1) | (state >> 7);
            let feedback = (state ^ (state >> 2) ^ (state >> 4) ^ (state >> 7)) & 1;
            state = (state << 1) | feedback;
            bit += 1;
        }
        sequence[i] = byte;
        i += 1;
    }
    sequence
}

/// 对帧数据进行伪随机化（原地）
pub fn randomize(frame: &mut [u8]) {
    for (byte, pn) in frame.iter_mut().zip(PSEUDO_RANDOM_SEQUENCE.iter().cycle()) {
        *byte ^= pn;
    }
}

/// 去随机化，与随机化互逆
pub fn derandomize(frame: &mut [u8]) {
    randomize(frame);
}
