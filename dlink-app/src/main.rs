//! 遥测下行复用引擎
//!
//! 周期调度任务发布唤醒信号，引擎在主任务中按周期运行，
//! 配置了目的地址的通道经 UDP 发出传输帧。

mod traffic;
mod udp;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dlink_core::{EngineConfig, RoutingEntry, WakeupSignal};
use dlink_mux::{BusEndpoints, Command, CycleReport, Engine, ThrottleRegistry};
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

use traffic::{TrafficConfig, TrafficGenerator};
use udp::UdpTransport;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 引擎配置文件（JSON）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 启动后加载的路由表文件（JSON 数组）
    #[arg(short, long)]
    table: Option<PathBuf>,

    /// 运行指定周期数后退出
    #[arg(short = 'n', long)]
    cycles: Option<u64>,

    /// 唤醒周期（毫秒）
    #[arg(long, default_value_t = 100)]
    period_ms: u64,

    /// 每隔多少个周期请求一次内务遥测
    #[arg(long, default_value_t = 10)]
    housekeeping_every: u64,

    /// 生成演示遥测流量
    #[arg(long)]
    demo_traffic: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if args.verbose { Level::DEBUG } else { Level::INFO };
        EnvFilter::new(format!("dlink={level},dlink_mux={level},dlink_core={level}"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => {
            info!("no configuration file given, using defaults");
            EngineConfig::default()
        }
    };

    let registry = ThrottleRegistry::new();
    let throttle = registry.get_or_create(&config.throttle_signal);
    info!(signal = %config.throttle_signal, "throttle signal attached");

    let wakeup_timeout = Duration::from_millis(config.wakeup_timeout_ms);
    let destinations: Vec<(usize, Option<String>)> = config
        .channels
        .iter()
        .enumerate()
        .map(|(i, c)| (i, c.destination.clone()))
        .collect();

    let (mut engine, bus) = Engine::new(config, throttle).context("initializing engine")?;
    let start = Instant::now();

    let socket = Arc::new(
        UdpSocket::bind("0.0.0.0:0")
            .await
            .context("binding output socket")?,
    );
    for (channel, destination) in destinations {
        let Some(destination) = destination else {
            continue;
        };
        let target: SocketAddr = destination
            .parse()
            .with_context(|| format!("channel {channel}: invalid destination '{destination}'"))?;
        submit(
            &mut engine,
            &bus,
            Command::EnableOutput {
                channel,
                transport: Box::new(UdpTransport::new(Arc::clone(&socket), target)),
            },
        )?;
    }

    if let Some(path) = &args.table {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading routing table {}", path.display()))?;
        let entries: Vec<RoutingEntry> = serde_json::from_str(&text)
            .with_context(|| format!("parsing routing table {}", path.display()))?;
        submit(&mut engine, &bus, Command::LoadRoutingTable { entries })?;
    }

    info!(subscriptions = ?engine.subscriptions(), "bus subscriptions");

    let notify = Arc::new(Notify::new());
    let scheduler = tokio::spawn(schedule(
        bus.clone(),
        Arc::clone(&notify),
        start,
        Duration::from_millis(args.period_ms.max(1)),
        args.housekeeping_every,
    ));

    let traffic = args.demo_traffic.then(|| {
        let generator = TrafficGenerator::new(TrafficConfig::default(), engine.subscriptions());
        tokio::spawn(demo_traffic(
            bus.clone(),
            generator,
            Duration::from_millis(args.period_ms.max(1)),
        ))
    });

    let mut cycles = 0u64;
    loop {
        let report = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            woke = tokio::time::timeout(wakeup_timeout, notify.notified()) => match woke {
                Ok(()) => engine.poll(),
                Err(_) => Some(engine.on_wakeup_timeout(elapsed_ms(start))),
            },
        };

        let Some(report) = report else {
            continue;
        };
        log_report(&report)?;

        cycles += 1;
        if args.cycles.is_some_and(|limit| cycles >= limit) {
            break;
        }
    }

    scheduler.abort();
    if let Some(traffic) = traffic {
        traffic.abort();
    }

    let hk = engine.housekeeping();
    println!("{}", serde_json::to_string_pretty(&hk)?);
    info!(
        cycles,
        frames = hk.total_frames_sent(),
        dropped = hk.total_dropped(),
        "shutdown"
    );
    Ok(())
}

/// 启动阶段提交命令，每条命令随即执行一个周期
fn submit(engine: &mut Engine, bus: &BusEndpoints, command: Command) -> anyhow::Result<()> {
    let name = command.name();
    bus.command
        .try_send(command)
        .with_context(|| format!("queueing {name}"))?;
    engine.run_cycle(0);
    Ok(())
}

/// 周期唤醒
async fn schedule(
    bus: BusEndpoints,
    notify: Arc<Notify>,
    start: Instant,
    period: Duration,
    housekeeping_every: u64,
) {
    let mut interval = tokio::time::interval(period);
    let mut tick = 0u64;
    loop {
        interval.tick().await;
        tick += 1;

        if housekeeping_every > 0 && tick % housekeeping_every == 0 {
            if let Err(err) = bus.command.try_send(Command::SendHousekeeping) {
                warn!(error = %err, "housekeeping request dropped");
            }
        }

        let signal = WakeupSignal {
            tick,
            time_ms: elapsed_ms(start),
        };
        if let Err(err) = bus.wakeup.try_send(signal) {
            warn!(error = %err, "wakeup dropped");
        }
        notify.notify_one();
    }
}

async fn demo_traffic(bus: BusEndpoints, mut generator: TrafficGenerator, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        for message in generator.generate_batch() {
            if let Err(err) = bus.telemetry.try_send(message) {
                debug!(error = %err, "demo message dropped");
            }
        }
    }
}

fn log_report(report: &CycleReport) -> anyhow::Result<()> {
    debug!(
        tick = report.tick,
        commands = report.commands_processed,
        routed = report.messages_routed,
        frames = report.frames_sent,
        "cycle"
    );
    if let Some(hk) = &report.housekeeping {
        info!(housekeeping = %serde_json::to_string(hk)?, "housekeeping");
    }
    Ok(())
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
