//! 调度循环
//!
//! 每次唤醒执行一个控制周期：
//! `Idle → DrainingCommands → DrainingTelemetry → Flushing → Idle`。
//! 命令先于遥测处理，遥测按周期开始时的队列深度取空，新到的消息留给下个周期。
//! 引擎不持有定时器，时间由驱动方以参数传入。

use dlink_core::{ConfigError, EngineConfig, MessageId, TelemetryMessage, WakeupSignal};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::assembler::FrameAssembler;
use crate::channel::Channel;
use crate::command::Command;
use crate::housekeeping::{EngineCounters, HousekeepingPacket, QueueOverruns};
use crate::queue::{bounded_queue, QueueReceiver, QueueSender};
use crate::routing::RoutingTable;
use crate::throttle::{ThrottleGate, ThrottleSource};

/// 调度状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Idle,
    DrainingCommands,
    DrainingTelemetry,
    Flushing,
}

/// 总线侧入队句柄
#[derive(Clone)]
pub struct BusEndpoints {
    pub wakeup: QueueSender<WakeupSignal>,
    pub command: QueueSender<Command>,
    pub telemetry: QueueSender<TelemetryMessage>,
}

/// 单个周期的处理结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// 唤醒信号序号；直接调用 `run_cycle` 时为周期序号
    pub tick: u64,
    pub now_ms: u64,
    pub commands_processed: usize,
    pub messages_routed: usize,
    pub frames_sent: usize,
    pub housekeeping: Option<HousekeepingPacket>,
}

struct Inputs {
    wakeup: QueueReceiver<WakeupSignal>,
    command: QueueReceiver<Command>,
    telemetry: QueueReceiver<TelemetryMessage>,
}

/// 命令处理后延迟到周期内执行的动作
#[derive(Default)]
struct Deferred {
    housekeeping: bool,
    reset_queues: bool,
}

struct Core {
    table: Arc<RoutingTable>,
    assembler: FrameAssembler,
    counters: EngineCounters,
    last_table_error: Option<String>,
    max_table_entries: usize,
    critical_mids: usize,
}

impl Core {
    fn execute(&mut self, command: Command, deferred: &mut Deferred) {
        let name = command.name();
        trace!(?command, "executing command");

        let accepted = match command {
            Command::EnableOutput { channel, transport } => {
                self.assembler.attach_port(channel, transport)
            }
            Command::DisableOutput { channel } => self.assembler.disable_port(channel),
            Command::LoadRoutingTable { entries } => self.load_table(entries),
            Command::SetChannelEnabled { channel, enabled } => {
                self.assembler.set_channel_enabled(channel, enabled)
            }
            Command::Noop => {
                info!("no-op command received");
                true
            }
            Command::ResetCounters => {
                // 复位命令本身不计入接收计数
                self.counters = EngineCounters::default();
                self.assembler.reset_counters();
                self.last_table_error = None;
                deferred.reset_queues = true;
                info!("counters reset");
                return;
            }
            Command::SendHousekeeping => {
                deferred.housekeeping = true;
                true
            }
        };

        if accepted {
            self.counters.commands_accepted += 1;
        } else {
            self.counters.commands_rejected += 1;
            warn!(command = name, "command rejected");
        }
    }

    /// 校验并整表替换，失败时保留旧表
    fn load_table(&mut self, entries: Vec<dlink_core::RoutingEntry>) -> bool {
        let loaded = RoutingTable::load(
            entries,
            self.assembler.channel_count(),
            self.max_table_entries,
            self.critical_mids,
        );

        match loaded {
            Ok(table) => {
                self.counters.table_loads_ok += 1;
                self.last_table_error = None;
                if table == *self.table {
                    debug!(entries = table.len(), "routing table unchanged");
                } else {
                    info!(entries = table.len(), "routing table loaded");
                    self.table = Arc::new(table);
                }
                true
            }
            Err(err) => {
                self.counters.table_loads_failed += 1;
                warn!(error = %err, "routing table rejected, previous table retained");
                self.last_table_error = Some(err.to_string());
                false
            }
        }
    }

    fn route(
        &mut self,
        table: &RoutingTable,
        message: &TelemetryMessage,
        now_ms: u64,
        report: &mut CycleReport,
    ) {
        let Some(route) = table.lookup(message.mid) else {
            self.counters.messages_unrouted += 1;
            trace!(mid = %message.mid, "no route for message");
            return;
        };

        self.counters.messages_routed += 1;
        report.messages_routed += 1;

        // 每个目的通道独立拷贝
        for channel in route.channels.iter() {
            let critical = route.is_critical_on(channel);
            match self.assembler.pack(channel, message, critical, now_ms) {
                Ok(sent) => report.frames_sent += sent,
                Err(err) => {
                    warn!(
                        channel,
                        mid = %message.mid,
                        len = message.len(),
                        error = %err,
                        "message dropped"
                    );
                }
            }
        }
    }
}

/// 下行复用引擎
pub struct Engine {
    inputs: Inputs,
    core: Core,
    state: DispatchState,
}

impl Engine {
    /// 根据静态配置创建引擎
    ///
    /// # 参数
    /// - `config`: 引擎配置
    /// - `throttle`: 外部节流信号源
    ///
    /// # 返回
    /// - `Ok((Engine, BusEndpoints))`: 引擎及总线侧入队句柄
    /// - `Err(ConfigError)`: 配置或缺省路由表无效
    pub fn new(
        config: EngineConfig,
        throttle: Arc<dyn ThrottleSource>,
    ) -> Result<(Self, BusEndpoints), ConfigError> {
        config.validate()?;

        let table = RoutingTable::load(
            config.initial_routes(),
            config.channels.len(),
            config.max_table_entries,
            config.critical_mids,
        )?;

        let (wakeup_tx, wakeup_rx) = bounded_queue("wakeup", config.queues.wakeup);
        let (command_tx, command_rx) = bounded_queue("command", config.queues.command);
        let (telemetry_tx, telemetry_rx) = bounded_queue("telemetry", config.queues.telemetry);

        let assembler = FrameAssembler::new(
            &config.channels,
            config.throttle_policy,
            ThrottleGate::new(throttle),
        );

        info!(
            channels = config.channels.len(),
            routes = table.len(),
            policy = ?config.throttle_policy,
            "engine initialized"
        );

        let engine = Self {
            inputs: Inputs {
                wakeup: wakeup_rx,
                command: command_rx,
                telemetry: telemetry_rx,
            },
            core: Core {
                table: Arc::new(table),
                assembler,
                counters: EngineCounters::default(),
                last_table_error: None,
                max_table_entries: config.max_table_entries,
                critical_mids: config.critical_mids,
            },
            state: DispatchState::Idle,
        };
        let endpoints = BusEndpoints {
            wakeup: wakeup_tx,
            command: command_tx,
            telemetry: telemetry_tx,
        };
        Ok((engine, endpoints))
    }

    /// 处理排队的唤醒信号
    ///
    /// 多个唤醒合并为一个周期，多出的计为错过的唤醒。
    ///
    /// # 返回
    /// - `None`: 没有排队的唤醒
    pub fn poll(&mut self) -> Option<CycleReport> {
        let mut latest: Option<WakeupSignal> = None;
        while let Some(signal) = self.inputs.wakeup.try_recv() {
            if latest.is_some() {
                self.core.counters.missed_wakeups += 1;
            }
            latest = Some(signal);
        }
        let signal = latest?;
        Some(self.cycle(signal.tick, signal.time_ms))
    }

    /// 直接执行一个周期
    pub fn run_cycle(&mut self, now_ms: u64) -> CycleReport {
        let tick = self.core.counters.cycles + 1;
        self.cycle(tick, now_ms)
    }

    /// 等待唤醒超时，仍执行一个周期使队列不积压
    pub fn on_wakeup_timeout(&mut self, now_ms: u64) -> CycleReport {
        self.core.counters.wakeup_timeouts += 1;
        debug!(now_ms, "wakeup timeout");
        self.run_cycle(now_ms)
    }

    fn cycle(&mut self, tick: u64, now_ms: u64) -> CycleReport {
        self.core.counters.cycles += 1;
        let mut report = CycleReport {
            tick,
            now_ms,
            ..CycleReport::default()
        };
        let mut deferred = Deferred::default();

        self.state = DispatchState::DrainingCommands;
        let core = &mut self.core;
        report.commands_processed = self
            .inputs
            .command
            .drain_current(|command| core.execute(command, &mut deferred));

        if deferred.reset_queues {
            self.inputs.wakeup.reset_dropped();
            self.inputs.command.reset_dropped();
            self.inputs.telemetry.reset_dropped();
        }

        self.state = DispatchState::DrainingTelemetry;
        // 本次取空期间只使用同一张表
        let table = Arc::clone(&self.core.table);
        let core = &mut self.core;
        let report_ref = &mut report;
        self.inputs
            .telemetry
            .drain_current(|message| core.route(&table, &message, now_ms, report_ref));

        self.state = DispatchState::Flushing;
        report.frames_sent += self.core.assembler.sweep(now_ms);

        self.state = DispatchState::Idle;

        if deferred.housekeeping {
            report.housekeeping = Some(self.housekeeping());
        }

        trace!(
            tick,
            commands = report.commands_processed,
            routed = report.messages_routed,
            frames = report.frames_sent,
            "cycle complete"
        );
        report
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// 当前路由表
    pub fn routing_table(&self) -> Arc<RoutingTable> {
        Arc::clone(&self.core.table)
    }

    /// 需要在总线上订阅的消息标识
    pub fn subscriptions(&self) -> Vec<MessageId> {
        self.core.table.subscriptions()
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.core.assembler.channel(index)
    }

    pub fn assembler(&self) -> &FrameAssembler {
        &self.core.assembler
    }

    pub fn counters(&self) -> &EngineCounters {
        &self.core.counters
    }

    /// 内务遥测快照
    pub fn housekeeping(&self) -> HousekeepingPacket {
        HousekeepingPacket {
            engine: self.core.counters.clone(),
            queue_overruns: QueueOverruns {
                wakeup: self.inputs.wakeup.dropped(),
                command: self.inputs.command.dropped(),
                telemetry: self.inputs.telemetry.dropped(),
            },
            table_entries: self.core.table.len(),
            last_table_error: self.core.last_table_error.clone(),
            channels: self.core.assembler.status(),
        }
    }
}
