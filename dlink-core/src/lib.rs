//! 遥测下行核心库
//!
//! 提供下行链路各组件共享的错误类型、静态配置和消息定义。

pub mod config;
pub mod error;
pub mod message;
pub mod utils;

pub use config::{
    ChannelConfig, EngineConfig, FramingMode, IdleFrameMode, QueueDepths, RoutingEntry,
    ThrottlePolicy,
};
pub use error::{ConfigError, DownlinkError, QueueFull, TableError, TransportError};
pub use message::{MessageId, TelemetryMessage, WakeupSignal};
