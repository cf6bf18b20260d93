//! 地面命令
//!
//! 命令经命令队列进入引擎，每条独立成功或失败，只通过接收/拒绝计数应答。

use dlink_core::RoutingEntry;
use std::fmt;

use crate::port::Transport;

/// 引擎命令
pub enum Command {
    /// 挂接传输句柄并使能端口
    EnableOutput {
        channel: usize,
        transport: Box<dyn Transport>,
    },
    /// 禁止一个端口，`None` 表示全部
    DisableOutput { channel: Option<usize> },
    /// 整表替换路由表
    LoadRoutingTable { entries: Vec<RoutingEntry> },
    /// 使能或禁止通道组帧
    SetChannelEnabled { channel: usize, enabled: bool },
    Noop,
    ResetCounters,
    SendHousekeeping,
}

impl Command {
    /// 命令名称（日志用）
    pub fn name(&self) -> &'static str {
        match self {
            Command::EnableOutput { .. } => "EnableOutput",
            Command::DisableOutput { .. } => "DisableOutput",
            Command::LoadRoutingTable { .. } => "LoadRoutingTable",
            Command::SetChannelEnabled { .. } => "SetChannelEnabled",
            Command::Noop => "Noop",
            Command::ResetCounters => "ResetCounters",
            Command::SendHousekeeping => "SendHousekeeping",
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::EnableOutput { channel, transport } => f
                .debug_struct("EnableOutput")
                .field("channel", channel)
                .field("destination", &transport.destination())
                .finish(),
            Command::DisableOutput { channel } => f
                .debug_struct("DisableOutput")
                .field("channel", channel)
                .finish(),
            Command::LoadRoutingTable { entries } => f
                .debug_struct("LoadRoutingTable")
                .field("entries", &entries.len())
                .finish(),
            Command::SetChannelEnabled { channel, enabled } => f
                .debug_struct("SetChannelEnabled")
                .field("channel", channel)
                .field("enabled", enabled)
                .finish(),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::CaptureTransport;

    #[test]
    fn test_debug_hides_transport() {
        let (transport, _log) = CaptureTransport::new("vc0");
        let cmd = Command::EnableOutput {
            channel: 0,
            transport: Box::new(transport),
        };
        assert_eq!(cmd.name(), "EnableOutput");
        assert_eq!(
            format!("{cmd:?}"),
            "EnableOutput { channel: 0, destination: \"capture:vc0\" }"
        );
        assert_eq!(format!("{:?}", Command::Noop), "Noop");
    }
}
