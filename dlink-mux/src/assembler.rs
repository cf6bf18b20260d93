//! 帧组装器
//!
//! 将路由到各通道的遥测消息装入通道数据域，按以下规则刷新：
//! 1. 通道禁止：丢弃消息（计数，不是错误）
//! 2. 空消息：`EmptyMessage`，丢弃
//! 3. 超过溢出帧容量：`OversizedMessage`，丢弃
//! 4. 关键消息：先刷新当前帧，再单独成帧并立即刷新
//! 5. 超过正常帧容量但不超过溢出帧容量：单独放入溢出帧
//! 6. 其余情况放不下时先刷新满帧，再开始新帧
//!
//! 节流期间关键帧不并入保持缓冲，总是进入延迟队列，
//! 延迟队列已满时按背压丢弃。
//!
//! 周期末的扫描负责空闲超时刷新和节流解除后的补发。

use bytes::Bytes;
use dlink_core::{
    ChannelConfig, DownlinkError, IdleFrameMode, TelemetryMessage, ThrottlePolicy,
};
use std::collections::HashMap;
use tracing::{debug, info, trace, warn};

use crate::channel::{Channel, PendingFrame};
use crate::frame::FrameKind;
use crate::housekeeping::{ChannelStatus, DropReason};
use crate::port::{OutputPort, SendOutcome, Transport};
use crate::throttle::ThrottleGate;

/// 多通道帧组装器
pub struct FrameAssembler {
    channels: Vec<Channel>,
    ports: Vec<OutputPort>,
    gate: ThrottleGate,
    policy: ThrottlePolicy,
    /// 各航天器的主信道帧计数
    master_counts: HashMap<u16, u8>,
}

impl FrameAssembler {
    pub fn new(configs: &[ChannelConfig], policy: ThrottlePolicy, gate: ThrottleGate) -> Self {
        let channels = configs
            .iter()
            .enumerate()
            .map(|(index, config)| Channel::new(index, config.clone()))
            .collect();
        let ports = configs.iter().map(|_| OutputPort::detached()).collect();
        Self {
            channels,
            ports,
            gate,
            policy,
            master_counts: HashMap::new(),
        }
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn port(&self, index: usize) -> Option<&OutputPort> {
        self.ports.get(index)
    }

    pub fn gate(&self) -> &ThrottleGate {
        &self.gate
    }

    /// 为通道挂接传输句柄
    ///
    /// # 返回
    /// - `false`: 通道索引无效
    pub fn attach_port(&mut self, index: usize, transport: Box<dyn Transport>) -> bool {
        match self.ports.get_mut(index) {
            Some(port) => {
                port.attach(transport);
                info!(channel = index, destination = port.destination(), "output enabled");
                true
            }
            None => false,
        }
    }

    /// 禁止一个或全部端口
    pub fn disable_port(&mut self, index: Option<usize>) -> bool {
        match index {
            Some(index) => match self.ports.get_mut(index) {
                Some(port) => {
                    port.disable();
                    info!(channel = index, "output disabled");
                    true
                }
                None => false,
            },
            None => {
                for port in &mut self.ports {
                    port.disable();
                }
                info!("all outputs disabled");
                true
            }
        }
    }

    /// 使能或禁止通道组帧，禁止时丢弃待发内容
    pub fn set_channel_enabled(&mut self, index: usize, enabled: bool) -> bool {
        let Some(channel) = self.channels.get_mut(index) else {
            return false;
        };
        if !enabled {
            let discarded = channel.discard_all();
            channel
                .counters
                .record_drop(DropReason::ChannelDisabled, discarded);
        }
        channel.set_enabled(enabled);
        info!(channel = index, enabled, "channel state changed");
        true
    }

    pub fn reset_counters(&mut self) {
        for channel in &mut self.channels {
            channel.reset_counters();
        }
    }

    /// 各通道状态快照
    pub fn status(&self) -> Vec<ChannelStatus> {
        self.channels
            .iter()
            .zip(&self.ports)
            .map(|(channel, port)| ChannelStatus {
                index: channel.index(),
                vcid: channel.config().vcid,
                enabled: channel.is_enabled(),
                port_enabled: port.is_enabled(),
                destination: port.destination().to_string(),
                pending_bytes: channel.pending_bytes(),
                deferred_frames: channel.deferred_len(),
                held: channel.held().is_some(),
                vc_count: channel.vc_count(),
                counters: channel.counters().clone(),
            })
            .collect()
    }

    /// 将一条消息装入指定通道
    ///
    /// # 返回
    /// - `Ok(n)`: 处理过程中成功发送的帧数
    /// - `Err(DownlinkError)`: 本条消息被丢弃的原因（已计数）
    pub fn pack(
        &mut self,
        index: usize,
        message: &TelemetryMessage,
        critical: bool,
        now_ms: u64,
    ) -> Result<usize, DownlinkError> {
        let Some(channel) = self.channels.get_mut(index) else {
            return Ok(0);
        };

        if !channel.is_enabled() {
            channel
                .counters
                .record_drop(DropReason::ChannelDisabled, 1);
            trace!(channel = index, mid = %message.mid, "channel disabled, message dropped");
            return Ok(0);
        }

        let size = message.len();
        if size == 0 {
            channel.counters.record_drop(DropReason::EmptyMessage, 1);
            return Err(DownlinkError::EmptyMessage {
                mid: message.mid.value(),
                channel: index,
            });
        }

        let capacity = channel.overflow_capacity();
        if size > capacity {
            channel
                .counters
                .record_drop(DropReason::OversizedMessage, 1);
            return Err(DownlinkError::OversizedMessage {
                mid: message.mid.value(),
                channel: index,
                size,
                capacity,
            });
        }

        if !channel.is_framed() {
            channel.counters.messages_packed += 1;
            channel.counters.record_frame(FrameKind::Packet);
            let pending = PendingFrame {
                frame: message.payload.clone(),
                kind: FrameKind::Packet,
                messages: 1,
            };
            return self.dispatch(index, pending);
        }

        let flush_kind = if critical {
            FrameKind::Critical
        } else {
            FrameKind::Full
        };

        if size > channel.data_capacity() {
            // 当前帧先发出，超长消息单独使用溢出帧
            let mut sent = self.flush(index, flush_kind, now_ms);
            let frame_len = self.channels[index].config().overflow_size();
            let frame = self.build(index, &message.payload, frame_len);
            let channel = &mut self.channels[index];
            channel.counters.messages_packed += 1;
            channel.counters.record_frame(FrameKind::Overflow);
            sent += self.dispatch(
                index,
                PendingFrame {
                    frame,
                    kind: FrameKind::Overflow,
                    messages: 1,
                },
            )?;
            return Ok(sent);
        }

        let mut sent = 0;
        if critical || size > channel.remaining() {
            sent += self.flush(index, flush_kind, now_ms);
        }

        let channel = &mut self.channels[index];
        if !channel.append(&message.payload, now_ms) {
            // 节流保持中的缓冲已无空间
            channel
                .counters
                .record_drop(DropReason::ChannelBackpressure, 1);
            return Err(DownlinkError::ChannelBackpressure { channel: index });
        }

        if critical {
            // 关键帧无法发出也无法延迟时，本条消息随帧丢弃
            sent += self.try_flush(index, flush_kind, now_ms)?;
        } else if channel.remaining() == 0 {
            sent += self.flush(index, flush_kind, now_ms);
        }

        Ok(sent)
    }

    /// 周期末扫描
    ///
    /// 节流解除的通道先补发延迟帧和被保持的帧，再处理空闲超时。
    ///
    /// # 返回
    /// - 本次扫描成功发送的帧数
    pub fn sweep(&mut self, now_ms: u64) -> usize {
        let mut sent = 0;

        for index in 0..self.channels.len() {
            if !self.channels[index].is_enabled() {
                continue;
            }

            let open = self.gate.may_transmit(index);
            if open {
                sent += self.release_deferred(index);
                if let Some(kind) = self.channels[index].held() {
                    sent += self.flush(index, kind, now_ms);
                }
            }

            let channel = &mut self.channels[index];
            if !channel.is_framed() {
                continue;
            }

            if channel.pending_bytes() > 0 {
                if channel.idle_due(now_ms) {
                    sent += self.flush(index, FrameKind::Idle, now_ms);
                }
            } else if channel.config().idle_fill {
                channel.arm_idle_clock(now_ms);
                // 填充帧只在链路空闲时发送，节流期间跳过
                if open && channel.idle_due(now_ms) {
                    sent += self.emit_fill(index, now_ms);
                }
            }
        }

        sent
    }

    /// 刷新通道当前帧，丢帧只记日志
    fn flush(&mut self, index: usize, kind: FrameKind, now_ms: u64) -> usize {
        self.try_flush(index, kind, now_ms).unwrap_or_else(|err| {
            warn!(channel = index, %kind, error = %err, "frame dropped");
            0
        })
    }

    /// 刷新通道当前帧
    ///
    /// 保持缓冲策略下节流时非关键帧并入保持缓冲；
    /// 关键帧照常组帧，由 `dispatch` 放入延迟队列。
    ///
    /// # 返回
    /// - `Ok(n)`: 成功发送的帧数
    /// - `Err(DownlinkError)`: 帧被丢弃（已计数）
    fn try_flush(
        &mut self,
        index: usize,
        kind: FrameKind,
        now_ms: u64,
    ) -> Result<usize, DownlinkError> {
        let channel = &mut self.channels[index];
        if channel.pending_bytes() == 0 {
            return Ok(0);
        }

        let holding = self.policy == ThrottlePolicy::HoldBuffer && kind != FrameKind::Critical;
        if holding && !self.gate.may_transmit(index) {
            if channel.hold(kind) {
                channel.counters.throttle_deferrals += 1;
                debug!(
                    channel = index,
                    %kind,
                    pending = channel.pending_bytes(),
                    "flush held by throttle"
                );
            }
            return Ok(0);
        }

        let frame_len = flush_len(channel.config(), kind, channel.pending_bytes());
        let (data, messages) = channel.take_data(now_ms);
        let frame = self.build(index, &data, frame_len);
        self.channels[index].counters.record_frame(kind);

        self.dispatch(
            index,
            PendingFrame {
                frame,
                kind,
                messages,
            },
        )
    }

    /// 发送无数据的填充帧
    fn emit_fill(&mut self, index: usize, now_ms: u64) -> usize {
        let channel = &mut self.channels[index];
        let frame_len = flush_len(channel.config(), FrameKind::Fill, 0);
        channel.take_data(now_ms);
        let frame = self.build(index, &[], frame_len);
        self.channels[index].counters.record_frame(FrameKind::Fill);

        let pending = PendingFrame {
            frame,
            kind: FrameKind::Fill,
            messages: 0,
        };
        usize::from(self.transmit(index, &pending))
    }

    /// 分配帧计数并组帧
    fn build(&mut self, index: usize, data: &[u8], frame_len: usize) -> Bytes {
        let channel = &mut self.channels[index];
        let layout = *channel.layout();
        let vc_count = channel.next_vc_count();
        let master = self.master_counts.entry(layout.spacecraft_id).or_insert(0);
        let master_count = *master;
        *master = master.wrapping_add(1);
        layout.build(master_count, vc_count, data, frame_len)
    }

    /// 经节流检查后交给端口，节流时进入延迟队列
    fn dispatch(&mut self, index: usize, pending: PendingFrame) -> Result<usize, DownlinkError> {
        if !self.gate.may_transmit(index) {
            let channel = &mut self.channels[index];
            if channel.can_defer() {
                channel.counters.throttle_deferrals += 1;
                debug!(
                    channel = index,
                    kind = %pending.kind,
                    deferred = channel.deferred_len() + 1,
                    "frame deferred by throttle"
                );
                channel.push_deferred(pending);
                return Ok(0);
            }
            channel
                .counters
                .record_drop(DropReason::ChannelBackpressure, pending.messages);
            return Err(DownlinkError::ChannelBackpressure { channel: index });
        }

        let mut sent = self.release_deferred(index);
        if self.transmit(index, &pending) {
            sent += 1;
        }
        Ok(sent)
    }

    /// 按先后顺序补发延迟帧
    fn release_deferred(&mut self, index: usize) -> usize {
        let mut sent = 0;
        while let Some(pending) = self.channels[index].pop_deferred() {
            if self.transmit(index, &pending) {
                sent += 1;
            }
        }
        sent
    }

    /// 非阻塞发送，失败只计数不重试
    fn transmit(&mut self, index: usize, pending: &PendingFrame) -> bool {
        let channel = &mut self.channels[index];
        match self.ports[index].send(&pending.frame) {
            Ok(SendOutcome::Sent) => {
                channel.counters.frames_sent += 1;
                channel.counters.bytes_sent += pending.frame.len() as u64;
                debug!(
                    channel = index,
                    kind = %pending.kind,
                    len = pending.frame.len(),
                    head = %hex::encode(&pending.frame[..pending.frame.len().min(8)]),
                    "frame sent"
                );
                true
            }
            Ok(SendOutcome::Discarded) => {
                channel.counters.frames_discarded += 1;
                false
            }
            Err(err) => {
                channel.counters.transport_errors += 1;
                warn!(channel = index, kind = %pending.kind, error = %err, "transport send failed");
                false
            }
        }
    }
}

/// 刷新时的帧长度
fn flush_len(config: &ChannelConfig, kind: FrameKind, pending: usize) -> usize {
    match kind {
        FrameKind::Idle | FrameKind::Fill => match config.idle_mode {
            IdleFrameMode::Padded => {
                let idle = config.idle_size();
                if pending <= config.data_capacity(idle) {
                    idle
                } else {
                    config.frame_size
                }
            }
            IdleFrameMode::Variable => config.overhead() + pending,
        },
        FrameKind::Overflow => config.overflow_size(),
        FrameKind::Full | FrameKind::Critical | FrameKind::Packet => config.frame_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{CaptureLog, CaptureTransport};
    use crate::throttle::ThrottleFlag;
    use std::sync::Arc;

    fn config(frame_size: usize) -> ChannelConfig {
        ChannelConfig {
            frame_size,
            idle_timeout_ms: 100,
            ..ChannelConfig::default()
        }
    }

    fn assembler(
        configs: &[ChannelConfig],
        policy: ThrottlePolicy,
    ) -> (FrameAssembler, Vec<CaptureLog>, Arc<ThrottleFlag>) {
        let flag = Arc::new(ThrottleFlag::new());
        let mut assembler =
            FrameAssembler::new(configs, policy, ThrottleGate::new(flag.clone()));
        let logs = (0..configs.len())
            .map(|i| {
                let (transport, log) = CaptureTransport::new(format!("vc{i}"));
                assembler.attach_port(i, Box::new(transport));
                log
            })
            .collect();
        (assembler, logs, flag)
    }

    fn msg(mid: u16, len: usize) -> TelemetryMessage {
        TelemetryMessage::new(mid, vec![mid as u8; len])
    }

    #[test]
    fn test_full_frame_scenario() {
        let (mut asm, logs, _) = assembler(&[config(100)], ThrottlePolicy::HoldBuffer);

        assert_eq!(asm.pack(0, &msg(1, 60), false, 0).unwrap(), 0);
        assert_eq!(asm.channel(0).unwrap().pending_bytes(), 60);

        assert_eq!(asm.pack(0, &msg(2, 50), false, 0).unwrap(), 1);
        let frames = logs[0].frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 100);
        assert!(frames[0][6..66].iter().all(|&b| b == 1));
        assert!(frames[0][66..].iter().all(|&b| b == 0));
        assert_eq!(asm.channel(0).unwrap().pending_bytes(), 50);
        assert_eq!(asm.channel(0).unwrap().counters().full_frames, 1);
    }

    #[test]
    fn test_exactly_full_frame_flushes() {
        let (mut asm, logs, _) = assembler(&[config(16)], ThrottlePolicy::HoldBuffer);
        asm.pack(0, &msg(1, 10), false, 0).unwrap();
        assert_eq!(logs[0].len(), 1);
        assert_eq!(asm.channel(0).unwrap().pending_bytes(), 0);
    }

    #[test]
    fn test_oversized_and_overflow() {
        let cfg = ChannelConfig {
            overflow_frame_size: Some(64),
            ..config(32)
        };
        let (mut asm, logs, _) = assembler(&[cfg], ThrottlePolicy::HoldBuffer);

        asm.pack(0, &msg(1, 4), false, 0).unwrap();
        // 40字节超过正常帧数据域26字节，使用溢出帧
        assert_eq!(asm.pack(0, &msg(2, 40), false, 0).unwrap(), 2);
        let frames = logs[0].take();
        assert_eq!(frames[0].len(), 32);
        assert_eq!(frames[1].len(), 64);

        let err = asm.pack(0, &msg(3, 59), false, 0).unwrap_err();
        assert!(matches!(
            err,
            DownlinkError::OversizedMessage {
                size: 59,
                capacity: 58,
                ..
            }
        ));
        assert!(logs[0].is_empty());
        let counters = asm.channel(0).unwrap().counters();
        assert_eq!(counters.dropped_oversized, 1);
        assert_eq!(counters.overflow_frames, 1);
    }

    #[test]
    fn test_critical_flushes_immediately() {
        let (mut asm, logs, _) = assembler(&[config(64)], ThrottlePolicy::HoldBuffer);
        asm.pack(0, &msg(1, 10), false, 0).unwrap();
        assert_eq!(asm.pack(0, &msg(2, 5), true, 0).unwrap(), 2);
        asm.pack(0, &msg(3, 5), false, 0).unwrap();

        let frames = logs[0].frames();
        assert_eq!(frames.len(), 2);
        assert!(frames[0][6..16].iter().all(|&b| b == 1));
        assert!(frames[1][6..11].iter().all(|&b| b == 2));
        // 关键消息所在帧不含后续消息
        assert!(frames[1][11..].iter().all(|&b| b == 0));
        assert_eq!(asm.channel(0).unwrap().counters().critical_frames, 2);
    }

    #[test]
    fn test_idle_flush_and_padding_modes() {
        let padded = ChannelConfig {
            idle_frame_size: Some(32),
            ..config(64)
        };
        let variable = ChannelConfig {
            vcid: 1,
            idle_mode: IdleFrameMode::Variable,
            ..config(64)
        };
        let (mut asm, logs, _) =
            assembler(&[padded, variable], ThrottlePolicy::HoldBuffer);

        asm.pack(0, &msg(1, 10), false, 0).unwrap();
        asm.pack(1, &msg(2, 10), false, 0).unwrap();
        assert_eq!(asm.sweep(50), 0);
        assert_eq!(asm.sweep(100), 2);

        assert_eq!(logs[0].frames()[0].len(), 32);
        assert_eq!(logs[1].frames()[0].len(), 16);
        assert_eq!(asm.channel(0).unwrap().counters().idle_frames, 1);
    }

    #[test]
    fn test_idle_fill_frames() {
        let cfg = ChannelConfig {
            idle_fill: true,
            ..config(32)
        };
        let (mut asm, logs, flag) = assembler(&[cfg], ThrottlePolicy::HoldBuffer);
        assert_eq!(asm.sweep(0), 0);
        assert_eq!(asm.sweep(100), 1);
        assert_eq!(logs[0].frames()[0].len(), 32);

        flag.assert_all();
        assert_eq!(asm.sweep(200), 0);
        assert_eq!(asm.channel(0).unwrap().deferred_len(), 0);
    }

    #[test]
    fn test_hold_buffer_backpressure() {
        let (mut asm, logs, flag) = assembler(&[config(26)], ThrottlePolicy::HoldBuffer);
        flag.assert_all();

        asm.pack(0, &msg(1, 12), false, 0).unwrap();
        asm.pack(0, &msg(2, 8), false, 0).unwrap();
        // 缓冲20字节已满，保持不发送
        assert!(logs[0].is_empty());
        assert_eq!(asm.channel(0).unwrap().held(), Some(FrameKind::Full));

        let err = asm.pack(0, &msg(3, 1), false, 0).unwrap_err();
        assert!(matches!(err, DownlinkError::ChannelBackpressure { channel: 0 }));
        assert_eq!(asm.channel(0).unwrap().counters().dropped_backpressure, 1);

        flag.release_all();
        assert_eq!(asm.sweep(10), 1);
        assert_eq!(logs[0].len(), 1);
        assert_eq!(asm.channel(0).unwrap().pending_bytes(), 0);
    }

    #[test]
    fn test_critical_not_merged_into_held_buffer() {
        let (mut asm, logs, flag) = assembler(&[config(64)], ThrottlePolicy::HoldBuffer);
        flag.assert_all();

        asm.pack(0, &msg(1, 5), false, 0).unwrap();
        assert_eq!(asm.pack(0, &msg(2, 5), true, 0).unwrap(), 0);
        asm.pack(0, &msg(3, 5), false, 0).unwrap();

        // 当前帧和关键帧各自进入延迟队列，后续消息开始新缓冲
        assert!(logs[0].is_empty());
        let channel = asm.channel(0).unwrap();
        assert_eq!(channel.deferred_len(), 2);
        assert_eq!(channel.pending_bytes(), 5);
        assert_eq!(channel.held(), None);

        flag.release_all();
        assert_eq!(asm.sweep(100), 3);
        let frames = logs[0].frames();
        assert!(frames[0][6..11].iter().all(|&b| b == 1));
        assert!(frames[1][6..11].iter().all(|&b| b == 2));
        assert!(frames[1][11..].iter().all(|&b| b == 0));
        assert!(frames[2][6..11].iter().all(|&b| b == 3));
    }

    #[test]
    fn test_critical_dropped_when_deferral_full() {
        let cfg = ChannelConfig {
            deferred_depth: 1,
            ..config(64)
        };
        let (mut asm, logs, flag) = assembler(&[cfg], ThrottlePolicy::HoldBuffer);
        flag.assert_all();

        asm.pack(0, &msg(1, 5), false, 0).unwrap();
        let err = asm.pack(0, &msg(2, 5), true, 0).unwrap_err();
        assert!(matches!(err, DownlinkError::ChannelBackpressure { channel: 0 }));

        let channel = asm.channel(0).unwrap();
        assert_eq!(channel.deferred_len(), 1);
        assert_eq!(channel.pending_bytes(), 0);
        assert_eq!(channel.counters().dropped_backpressure, 1);
        assert!(logs[0].is_empty());
    }

    #[test]
    fn test_empty_message_rejected() {
        let (mut asm, logs, _) = assembler(&[config(16)], ThrottlePolicy::HoldBuffer);
        let empty = TelemetryMessage::new(0x0801, Vec::<u8>::new());

        let err = asm.pack(0, &empty, true, 0).unwrap_err();
        assert!(matches!(
            err,
            DownlinkError::EmptyMessage {
                mid: 0x0801,
                channel: 0
            }
        ));
        assert!(logs[0].is_empty());
        let counters = asm.channel(0).unwrap().counters();
        assert_eq!(counters.dropped_empty, 1);
        assert_eq!(counters.messages_packed, 0);
        assert_eq!(asm.sweep(1000), 0);
    }

    #[test]
    fn test_defer_frames_bounded() {
        let cfg = ChannelConfig {
            deferred_depth: 2,
            ..config(16)
        };
        let (mut asm, logs, flag) = assembler(&[cfg], ThrottlePolicy::DeferFrames);
        flag.assert_channel(0);

        for mid in 1..=3 {
            let _ = asm.pack(0, &msg(mid, 10), false, 0);
        }
        assert!(logs[0].is_empty());
        let channel = asm.channel(0).unwrap();
        assert_eq!(channel.deferred_len(), 2);
        assert_eq!(channel.counters().dropped_backpressure, 1);
        assert_eq!(channel.counters().throttle_deferrals, 2);

        flag.release_channel(0);
        assert_eq!(asm.sweep(0), 2);
        let frames = logs[0].frames();
        assert_eq!(frames[0][6], 1);
        assert_eq!(frames[1][6], 2);
    }

    #[test]
    fn test_disabled_channel_and_port() {
        let (mut asm, logs, _) = assembler(&[config(16), config(16)], ThrottlePolicy::HoldBuffer);
        asm.set_channel_enabled(0, false);
        asm.pack(0, &msg(1, 10), false, 0).unwrap();
        assert_eq!(asm.channel(0).unwrap().counters().dropped_disabled, 1);

        asm.disable_port(Some(1));
        asm.pack(1, &msg(2, 10), false, 0).unwrap();
        assert!(logs[1].is_empty());
        assert_eq!(asm.channel(1).unwrap().counters().frames_discarded, 1);
    }

    #[test]
    fn test_transport_error_counted_not_retried() {
        let (mut asm, logs, _) = assembler(&[config(16)], ThrottlePolicy::HoldBuffer);
        logs[0].fail_next(1);
        assert_eq!(asm.pack(0, &msg(1, 10), false, 0).unwrap(), 0);
        assert_eq!(asm.pack(0, &msg(2, 10), false, 0).unwrap(), 1);
        assert_eq!(logs[0].len(), 1);
        assert_eq!(asm.channel(0).unwrap().counters().transport_errors, 1);
    }

    #[test]
    fn test_raw_packet_mode() {
        let cfg = ChannelConfig {
            framing: dlink_core::FramingMode::RawPacket,
            overflow_frame_size: Some(8),
            ..ChannelConfig::default()
        };
        let (mut asm, logs, _) = assembler(&[cfg], ThrottlePolicy::HoldBuffer);
        assert_eq!(asm.pack(0, &msg(1, 8), false, 0).unwrap(), 1);
        assert!(asm.pack(0, &msg(2, 9), false, 0).is_err());
        assert_eq!(logs[0].frames(), vec![Bytes::from(vec![1u8; 8])]);
    }

    #[test]
    fn test_counters_shared_master_count() {
        let a = config(16);
        let b = ChannelConfig { vcid: 1, ..config(16) };
        let (mut asm, logs, _) = assembler(&[a, b], ThrottlePolicy::HoldBuffer);
        asm.pack(0, &msg(1, 10), false, 0).unwrap();
        asm.pack(1, &msg(2, 10), false, 0).unwrap();
        asm.pack(0, &msg(3, 10), false, 0).unwrap();

        let vc0 = logs[0].frames();
        let vc1 = logs[1].frames();
        // 主信道计数跨虚拟信道递增，虚拟信道计数各自递增
        assert_eq!((vc0[0][2], vc0[0][3]), (0, 0));
        assert_eq!((vc1[0][2], vc1[0][3]), (1, 0));
        assert_eq!((vc0[1][2], vc0[1][3]), (2, 1));
    }
}
