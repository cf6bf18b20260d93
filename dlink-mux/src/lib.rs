//! 遥测下行复用引擎
//!
//! 按路由表把总线上的遥测消息分发到各输出通道，组装传输帧，
//! 在节流约束下经输出端口发送。

pub mod assembler;
pub mod channel;
pub mod command;
pub mod dispatch;
pub mod frame;
pub mod housekeeping;
pub mod port;
pub mod queue;
pub mod routing;
pub mod throttle;

pub use assembler::FrameAssembler;
pub use channel::{Channel, PendingFrame};
pub use command::Command;
pub use dispatch::{BusEndpoints, CycleReport, DispatchState, Engine};
pub use frame::{FrameKind, FrameLayout};
pub use housekeeping::{
    ChannelCounters, ChannelStatus, DropReason, EngineCounters, HousekeepingPacket, QueueOverruns,
};
pub use port::{CaptureLog, CaptureTransport, OutputPort, SendOutcome, Transport};
pub use queue::{bounded_queue, QueueReceiver, QueueSender};
pub use routing::{ChannelSet, Route, RoutingTable};
pub use throttle::{ThrottleFlag, ThrottleGate, ThrottleRegistry, ThrottleSource, Unthrottled};
