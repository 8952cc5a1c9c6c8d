//! Latency receiver entry point.
//!
//! Joins the feed and reports one-way latency until Ctrl-C:
//! - `kernel` mode: UDP multicast socket, one blocking receive per message
//! - `bypass` mode: raw capture socket polled in bursts, optionally one
//!   worker per core sharing the interface through a fanout group

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use common::logging::{LogLevel, Logger};
use receiver::source::KernelSource;
use receiver::{
    BypassSourceConfig, CancellationToken, KernelSourceConfig, SupervisorConfig, Supervisor,
    Termination, UdpFilter,
};
use receiver::config::DEFAULT_BURST_SIZE;
use std::io;
use std::net::Ipv4Addr;
use std::thread;
use std::time::Duration;

/// Packet acquisition path
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Kernel UDP socket, blocking receive
    Kernel,
    /// Raw capture socket, non-blocking burst polling
    Bypass,
}

/// Multicast market data latency receiver
#[derive(Parser, Debug)]
#[command(name = "receiver")]
#[command(about = "Measure one-way latency of a multicast market data feed")]
struct Args {
    /// Acquisition path
    #[arg(short, long, value_enum, default_value_t = Mode::Kernel)]
    mode: Mode,

    /// Multicast group address
    #[arg(short, long, default_value = "239.1.1.1")]
    group: Ipv4Addr,

    /// Multicast port
    #[arg(short, long, default_value_t = 12345)]
    port: u16,

    /// Local interface address for the group join (kernel mode)
    #[arg(short, long, default_value = "0.0.0.0")]
    interface: Ipv4Addr,

    /// Capture device name (bypass mode). The device is switched to
    /// promiscuous mode unless --no-promisc is given.
    #[arg(short, long, default_value = "eth0")]
    device: String,

    /// Seconds between periodic reports
    #[arg(short, long, default_value_t = 5)]
    report_interval: u64,

    /// Frames requested per poll (bypass mode) [default: 32]
    #[arg(short, long)]
    burst: Option<usize>,

    /// Frame buffers per worker (bypass mode)
    #[arg(long, default_value_t = 256)]
    pool: usize,

    /// Independent receive loops sharing the device (bypass mode) [default: 1]
    #[arg(short, long)]
    workers: Option<usize>,

    /// Fanout group id used when running more than one worker
    #[arg(long, default_value_t = 42)]
    fanout_group: u16,

    /// Pin each worker to its own core (bypass mode)
    #[arg(long)]
    pin_cores: bool,

    /// Leave the capture device out of promiscuous mode (bypass mode)
    #[arg(long)]
    no_promisc: bool,

    /// Measure every UDP datagram on the device, not only the configured group and port
    #[arg(long)]
    any_flow: bool,

    /// Kernel socket receive buffer in bytes
    #[arg(long)]
    recv_buffer: Option<usize>,

    /// Log lifecycle details at debug level
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn burst(&self) -> usize {
        self.burst.unwrap_or(DEFAULT_BURST_SIZE)
    }

    fn workers(&self) -> usize {
        self.workers.unwrap_or(1)
    }

    /// Bypass-only flags given on a kernel mode command line
    fn kernel_mode_conflicts(&self) -> Vec<&'static str> {
        let mut given = Vec::new();
        if self.mode == Mode::Kernel {
            if self.burst.is_some() {
                given.push("--burst");
            }
            if self.workers.is_some() {
                given.push("--workers");
            }
            if self.pin_cores {
                given.push("--pin-cores");
            }
            if self.no_promisc {
                given.push("--no-promisc");
            }
        }
        given
    }

    fn log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }

    fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig::default()
            .with_report_interval(Duration::from_secs(self.report_interval))
            .with_burst_size(self.burst())
    }

    fn kernel_config(&self) -> KernelSourceConfig {
        let config = KernelSourceConfig::new(self.group, self.port).with_interface(self.interface);
        match self.recv_buffer {
            Some(bytes) => config.with_recv_buffer(bytes),
            None => config,
        }
    }

    fn bypass_config(&self) -> BypassSourceConfig {
        let filter = if self.any_flow {
            UdpFilter::ANY
        } else {
            UdpFilter::ANY.with_destination(self.group).with_port(self.port)
        };

        let mut config = BypassSourceConfig::new(self.device.as_str())
            .with_filter(filter)
            .with_promiscuous(!self.no_promisc)
            .with_pool_capacity(self.pool);
        if self.workers() > 1 {
            config = config.with_fanout_group(self.fanout_group);
        }
        if let Some(bytes) = self.recv_buffer {
            config = config.with_recv_buffer(bytes);
        }
        config
    }
}

fn main() {
    let args = Args::parse();

    let conflicts = args.kernel_mode_conflicts();
    if !conflicts.is_empty() {
        Args::command()
            .error(
                ErrorKind::ArgumentConflict,
                format!("{} only apply to --mode bypass", conflicts.join(", ")),
            )
            .exit();
    }

    println!("Starting latency receiver...");
    println!("  Mode: {:?}", args.mode);
    println!("  Multicast: {}:{}", args.group, args.port);
    match args.mode {
        Mode::Kernel => println!("  Interface: {}", args.interface),
        Mode::Bypass => {
            println!("  Device: {}", args.device);
            println!("  Burst: {}", args.burst());
            println!("  Workers: {}", args.workers());
            println!("  Promiscuous: {}", !args.no_promisc);
        }
    }
    println!("  Report interval: {}s", args.report_interval);

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();

    ctrlc::set_handler(move || {
        println!("\nShutdown signal received...");
        handler_token.cancel();
    })
    .expect("Failed to set Ctrl-C handler");

    let exit_code = match args.mode {
        Mode::Kernel => run_kernel(&args, cancel),
        Mode::Bypass => run_bypass(&args, cancel),
    };

    std::process::exit(exit_code);
}

fn run_kernel(args: &Args, cancel: CancellationToken) -> i32 {
    let mut logger = Logger::with_writer(args.log_level(), None, io::stdout());
    let mut supervisor = Supervisor::new(args.supervisor_config(), cancel.clone());
    let config = args.kernel_config();

    println!("Receiving. Press Ctrl-C to stop.");
    let termination = supervisor.run_blocking(|| KernelSource::open(config, cancel), &mut logger);
    logger.flush();

    report_dropped(&logger, "receiver");
    report_outcome(&termination, "receiver");
    termination.exit_code()
}

#[cfg(target_os = "linux")]
fn run_bypass(args: &Args, cancel: CancellationToken) -> i32 {
    use receiver::source::BypassSource;

    let workers = args.workers();
    if workers == 0 {
        eprintln!("Error: --workers must be at least 1");
        return 1;
    }

    let cores = if args.pin_cores {
        core_affinity::get_core_ids().unwrap_or_default()
    } else {
        Vec::new()
    };
    if args.pin_cores && cores.len() < workers {
        eprintln!(
            "Warning: {} workers requested but only {} cores available for pinning",
            workers,
            cores.len()
        );
    }

    println!("Polling. Press Ctrl-C to stop.");

    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let supervisor_config = args.supervisor_config();
        let source_config = args.bypass_config();
        let level = args.log_level();
        let core = cores.get(worker).copied();
        let worker_cancel = cancel.clone();

        let spawned = thread::Builder::new()
            .name(format!("receiver-{}", worker))
            .spawn(move || {
                if let Some(core) = core {
                    if !core_affinity::set_for_current(core) {
                        eprintln!("Warning: failed to pin worker {} to core {:?}", worker, core.id);
                    }
                }

                let label = Some(format!("worker-{}", worker));
                let mut logger = Logger::with_writer(level, label, io::stdout());
                let mut supervisor = Supervisor::new(supervisor_config, worker_cancel.clone());
                let termination =
                    supervisor.run_burst(|| BypassSource::open(source_config), &mut logger);
                logger.flush();
                report_dropped(&logger, &format!("worker {}", worker));

                // One failed worker stops the others
                if !termination.is_success() {
                    worker_cancel.cancel();
                }
                termination
            });

        match spawned {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                eprintln!("Failed to start worker {}: {}", worker, e);
                cancel.cancel();
                break;
            }
        }
    }

    let mut exit_code = if handles.len() == workers { 0 } else { 1 };
    for (worker, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(termination) => {
                report_outcome(&termination, &format!("worker {}", worker));
                exit_code = exit_code.max(termination.exit_code());
            }
            Err(_) => {
                eprintln!("Worker {} panicked", worker);
                cancel.cancel();
                exit_code = 1;
            }
        }
    }
    exit_code
}

#[cfg(not(target_os = "linux"))]
fn run_bypass(_args: &Args, _cancel: CancellationToken) -> i32 {
    eprintln!("Error: bypass mode requires Linux");
    1
}

fn report_dropped(logger: &Logger, name: &str) {
    let dropped = logger.dropped();
    if dropped > 0 {
        eprintln!("Warning: {} dropped {} log entries on a full queue", name, dropped);
    }
}

fn report_outcome(termination: &Termination, name: &str) {
    match termination {
        Termination::Cancelled { .. } => println!("{} stopped.", name),
        Termination::SourceFailed { error, .. } => eprintln!("{} failed: {}", name, error),
        Termination::StartupFailed(error) => eprintln!("Failed to start {}: {}", name, error),
    }
}
