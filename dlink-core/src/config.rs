//! 静态配置
//!
//! 配置在进程生命周期内不可变，初始化时从 JSON 加载并校验。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::message::MessageId;

/// 通道掩码可选择的最大通道数（多组掩码低24位）
pub const MAX_CHANNELS: usize = 24;
/// 传输帧主导头长度
pub const FRAME_HEADER_SIZE: usize = 6;
/// 帧差错控制域长度
pub const FRAME_ERROR_CONTROL_SIZE: usize = 2;
/// 传输帧最大长度（首导头指针为11位）
pub const MAX_FRAME_SIZE: usize = 2048;
/// 原始包模式下单包最大长度
pub const MAX_PACKET_SIZE: usize = 65542;
/// 本子系统自身遥测的消息标识
pub const HOUSEKEEPING_MID: MessageId = MessageId(0x0880);

/// 通道成帧模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingMode {
    /// 组装为传输帧
    #[default]
    TransferFrame,
    /// 不成帧，逐包直接发送
    RawPacket,
}

/// 空闲帧长度模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleFrameMode {
    /// 零填充到空闲帧长度
    #[default]
    Padded,
    /// 按实际数据长度发送
    Variable,
}

/// 节流期间的帧保持策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottlePolicy {
    /// 推迟刷新，缓冲区继续累积直至填满
    #[default]
    HoldBuffer,
    /// 完成的帧进入有界延迟队列
    DeferFrames,
}

/// 单个输出通道配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// 虚拟信道标识（0..=7）
    #[serde(default)]
    pub vcid: u8,
    /// 航天器标识（10位）
    #[serde(default)]
    pub spacecraft_id: u16,
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
    /// 溢出帧长度，缺省等于帧长度
    #[serde(default)]
    pub overflow_frame_size: Option<usize>,
    /// 空闲帧长度，缺省等于帧长度
    #[serde(default)]
    pub idle_frame_size: Option<usize>,
    #[serde(default)]
    pub error_control: bool,
    #[serde(default)]
    pub randomize: bool,
    #[serde(default)]
    pub framing: FramingMode,
    #[serde(default)]
    pub idle_mode: IdleFrameMode,
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// 无待发数据时也按空闲超时发送填充帧
    #[serde(default)]
    pub idle_fill: bool,
    /// 节流延迟队列深度
    #[serde(default = "default_deferred_depth")]
    pub deferred_depth: usize,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 目的地址（由驱动程序用于创建传输端口）
    #[serde(default)]
    pub destination: Option<String>,
}

fn default_frame_size() -> usize {
    1000
}

fn default_idle_timeout_ms() -> u64 {
    1000
}

fn default_deferred_depth() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            vcid: 0,
            spacecraft_id: 0,
            frame_size: default_frame_size(),
            overflow_frame_size: None,
            idle_frame_size: None,
            error_control: false,
            randomize: false,
            framing: FramingMode::TransferFrame,
            idle_mode: IdleFrameMode::Padded,
            idle_timeout_ms: default_idle_timeout_ms(),
            idle_fill: false,
            deferred_depth: default_deferred_depth(),
            enabled: true,
            destination: None,
        }
    }
}

impl ChannelConfig {
    /// 溢出帧长度
    pub fn overflow_size(&self) -> usize {
        self.overflow_frame_size.unwrap_or(self.frame_size)
    }

    /// 空闲帧长度
    pub fn idle_size(&self) -> usize {
        self.idle_frame_size.unwrap_or(self.frame_size)
    }

    /// 帧尾长度（差错控制域）
    pub fn trailer_len(&self) -> usize {
        if self.error_control {
            FRAME_ERROR_CONTROL_SIZE
        } else {
            0
        }
    }

    /// 帧头与帧尾之外的开销
    pub fn overhead(&self) -> usize {
        match self.framing {
            FramingMode::TransferFrame => FRAME_HEADER_SIZE + self.trailer_len(),
            FramingMode::RawPacket => 0,
        }
    }

    /// 给定帧长度下的数据域容量
    pub fn data_capacity(&self, frame_len: usize) -> usize {
        frame_len.saturating_sub(self.overhead())
    }

    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let fail = |reason: String| ConfigError::Channel {
            channel: index,
            reason,
        };

        if self.vcid > 7 {
            return Err(fail(format!("vcid {} exceeds 3 bits", self.vcid)));
        }
        if self.spacecraft_id > 0x3FF {
            return Err(fail(format!(
                "spacecraft id {:#X} exceeds 10 bits",
                self.spacecraft_id
            )));
        }
        if self.idle_timeout_ms == 0 {
            return Err(fail("idle timeout must be greater than zero".to_string()));
        }

        match self.framing {
            FramingMode::TransferFrame => {
                let min = self.overhead() + 1;
                if self.frame_size < min || self.frame_size > MAX_FRAME_SIZE {
                    return Err(fail(format!(
                        "frame size {} outside {}..={}",
                        self.frame_size, min, MAX_FRAME_SIZE
                    )));
                }
                let overflow = self.overflow_size();
                if overflow < self.frame_size || overflow > MAX_FRAME_SIZE {
                    return Err(fail(format!(
                        "overflow frame size {} outside {}..={}",
                        overflow, self.frame_size, MAX_FRAME_SIZE
                    )));
                }
                let idle = self.idle_size();
                if idle < self.overhead() || idle > self.frame_size {
                    return Err(fail(format!(
                        "idle frame size {} outside {}..={}",
                        idle,
                        self.overhead(),
                        self.frame_size
                    )));
                }
            }
            FramingMode::RawPacket => {
                let overflow = self.overflow_size();
                if overflow == 0 || overflow > MAX_PACKET_SIZE {
                    return Err(fail(format!(
                        "packet size limit {overflow} outside 1..={MAX_PACKET_SIZE}"
                    )));
                }
            }
        }

        Ok(())
    }
}

/// 三个输入队列的深度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepths {
    #[serde(default = "default_queue_depth")]
    pub wakeup: usize,
    #[serde(default = "default_queue_depth")]
    pub command: usize,
    #[serde(default = "default_queue_depth")]
    pub telemetry: usize,
}

fn default_queue_depth() -> usize {
    10
}

impl Default for QueueDepths {
    fn default() -> Self {
        Self {
            wakeup: default_queue_depth(),
            command: default_queue_depth(),
            telemetry: default_queue_depth(),
        }
    }
}

/// 路由表条目
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingEntry {
    pub mid: MessageId,
    /// 通道位掩码，第 c 位置位表示路由到通道 c
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub channel_mask: u32,
    #[serde(default)]
    pub critical: bool,
}

impl RoutingEntry {
    /// 由通道列表构造条目
    pub fn new(mid: u16, channels: &[usize], critical: bool) -> Self {
        let channel_mask = channels
            .iter()
            .filter(|&&c| c < 32)
            .fold(0u32, |mask, &c| mask | (1 << c));
        Self {
            mid: MessageId(mid),
            channel_mask,
            critical,
        }
    }

    /// 条目选中的通道索引
    pub fn channels(&self) -> impl Iterator<Item = usize> + '_ {
        (0..32).filter(move |c| self.channel_mask & (1 << c) != 0)
    }
}

/// 编译内置的缺省路由表
pub fn builtin_routes() -> Vec<RoutingEntry> {
    vec![RoutingEntry {
        mid: HOUSEKEEPING_MID,
        channel_mask: 0b1,
        critical: false,
    }]
}

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelConfig>,
    #[serde(default)]
    pub queues: QueueDepths,
    #[serde(default = "default_wakeup_timeout_ms")]
    pub wakeup_timeout_ms: u64,
    #[serde(default = "default_max_table_entries")]
    pub max_table_entries: usize,
    /// 保留的关键消息标识数量
    #[serde(default = "default_critical_mids")]
    pub critical_mids: usize,
    #[serde(default = "default_throttle_signal")]
    pub throttle_signal: String,
    #[serde(default)]
    pub throttle_policy: ThrottlePolicy,
    /// 初始路由表，缺省使用内置表
    #[serde(default)]
    pub default_table: Option<Vec<RoutingEntry>>,
}

fn default_channels() -> Vec<ChannelConfig> {
    vec![
        ChannelConfig::default(),
        ChannelConfig {
            vcid: 1,
            ..ChannelConfig::default()
        },
    ]
}

fn default_wakeup_timeout_ms() -> u64 {
    500
}

fn default_max_table_entries() -> usize {
    100
}

fn default_critical_mids() -> usize {
    3
}

fn default_throttle_signal() -> String {
    "CFTOSemId".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            queues: QueueDepths::default(),
            wakeup_timeout_ms: default_wakeup_timeout_ms(),
            max_table_entries: default_max_table_entries(),
            critical_mids: default_critical_mids(),
            throttle_signal: default_throttle_signal(),
            throttle_policy: ThrottlePolicy::default(),
            default_table: None,
        }
    }
}

impl EngineConfig {
    /// 从 JSON 文本解析并校验配置
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文件加载配置
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// 初始路由表条目
    pub fn initial_routes(&self) -> Vec<RoutingEntry> {
        self.default_table.clone().unwrap_or_else(builtin_routes)
    }

    /// 校验静态配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        let count = self.channels.len();
        if count == 0 || count > MAX_CHANNELS {
            return Err(ConfigError::ChannelCount {
                count,
                max: MAX_CHANNELS,
            });
        }

        for (index, channel) in self.channels.iter().enumerate() {
            channel.validate(index)?;

            // 同一航天器下的虚拟信道不能重复
            let clash = self.channels[..index].iter().position(|other| {
                other.framing == FramingMode::TransferFrame
                    && channel.framing == FramingMode::TransferFrame
                    && other.spacecraft_id == channel.spacecraft_id
                    && other.vcid == channel.vcid
            });
            if let Some(other) = clash {
                return Err(ConfigError::Channel {
                    channel: index,
                    reason: format!("vcid {} already used by channel {}", channel.vcid, other),
                });
            }
        }

        if self.queues.wakeup == 0 {
            return Err(ConfigError::QueueDepth { queue: "wakeup" });
        }
        if self.queues.command == 0 {
            return Err(ConfigError::QueueDepth { queue: "command" });
        }
        if self.queues.telemetry == 0 {
            return Err(ConfigError::QueueDepth { queue: "telemetry" });
        }

        if self.wakeup_timeout_ms == 0 {
            return Err(ConfigError::Limits(
                "wakeup timeout must be greater than zero".to_string(),
            ));
        }
        if self.max_table_entries == 0 {
            return Err(ConfigError::Limits(
                "routing table capacity must be greater than zero".to_string(),
            ));
        }
        if self.critical_mids > self.max_table_entries {
            return Err(ConfigError::Limits(format!(
                "{} critical mids reserved but table holds only {} entries",
                self.critical_mids, self.max_table_entries
            )));
        }
        if self.throttle_signal.trim().is_empty() {
            return Err(ConfigError::Limits(
                "throttle signal name must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// 自定义反序列化：支持数字或十六进制字符串
pub fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct HexVisitor;

    impl<'de> Visitor<'de> for HexVisitor {
        type Value = u32;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number or a hex string")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<u32, E> {
            u32::try_from(value).map_err(|_| E::custom(format!("value {value} exceeds 32 bits")))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<u32, E> {
            u32::try_from(value).map_err(|_| E::custom(format!("value {value} out of range")))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<u32, E> {
            let s = value.trim();
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                u32::from_str_radix(hex, 16)
                    .map_err(|_| E::custom(format!("invalid hex string: {s}")))
            } else if let Some(bin) = s.strip_prefix("0b") {
                u32::from_str_radix(bin, 2)
                    .map_err(|_| E::custom(format!("invalid binary string: {s}")))
            } else {
                s.parse::<u32>()
                    .map_err(|_| E::custom(format!("invalid number string: {s}")))
            }
        }
    }

    deserializer.deserialize_any(HexVisitor)
}
