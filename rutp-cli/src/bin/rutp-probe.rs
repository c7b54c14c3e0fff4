//! RUTP Probe - one-stream throughput, loss and jitter test
//!
//! Run one end with `--server` and the other with `--client <addr>`. The
//! client sends full-sized datagrams for the test duration; the server
//! reports loss, reordering and jitter.

use anyhow::Context;
use clap::Parser;
use rutp::{connect, Listener, RecvOutcome, SendOutcome, Stream, TestPhase};
use rutp_cli::{display_summary, receiver_line, sender_line, ProbeConfig, Role, SendSchedule};
use rutp_io::RutpSocket;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "rutp-probe")]
#[command(about = "RUTP stream probe", long_about = None)]
struct Args {
    /// Run as server
    #[arg(short, long, conflicts_with = "client")]
    server: bool,

    /// Run as client, connecting to this server
    #[arg(short, long)]
    client: Option<SocketAddr>,

    /// Server listen address
    #[arg(long, default_value = "0.0.0.0:5201")]
    listen: SocketAddr,

    /// Load settings from a TOML file (command-line flags are ignored)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write an example configuration for the chosen role and exit
    #[arg(long)]
    write_example: Option<PathBuf>,

    /// Datagram size in bytes
    #[arg(short = 'l', long, default_value = "1460")]
    length: usize,

    /// Target bitrate in bits per second (0 = unlimited)
    #[arg(short, long, default_value = "1000000")]
    bitrate: u64,

    /// Kernel fair-queue pacing rate in bits per second
    #[arg(long, default_value = "0")]
    fq_rate: u64,

    /// Socket buffer size in bytes (0 = platform default)
    #[arg(short, long, default_value = "0")]
    window: usize,

    /// Use 64-bit packet counters
    #[arg(long)]
    udp_counters_64bit: bool,

    /// Destination hint carried in every header
    #[arg(long)]
    proxy: Option<SocketAddr>,

    /// Test duration in seconds
    #[arg(short, long, default_value = "10")]
    time: u64,

    /// Statistics interval in seconds
    #[arg(short, long, default_value = "1")]
    interval: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn probe_config(&self) -> anyhow::Result<ProbeConfig> {
        if let Some(path) = &self.config {
            return ProbeConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()));
        }

        let role = if self.client.is_some() {
            Role::Client
        } else if self.server {
            Role::Server
        } else {
            anyhow::bail!("Either --server or --client is required");
        };

        let mut config = match role {
            Role::Server => ProbeConfig::example_server(),
            Role::Client => ProbeConfig::example_client(),
        };
        config.duration_secs = self.time;
        config.stats_interval_secs = self.interval;
        config.stream.block_size = self.length;
        config.stream.rate_bps = self.bitrate;
        config.stream.fq_rate_bps = self.fq_rate;
        config.stream.socket_bufsize = self.window;
        config.stream.counters_64bit = self.udp_counters_64bit;
        config.stream.proxy = self.proxy;
        config.stream.listen = self.listen;
        config.stream.server = self.client;
        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    if let Some(path) = &args.write_example {
        let example = if args.server {
            ProbeConfig::example_server()
        } else {
            ProbeConfig::example_client()
        };
        example.to_file(path)?;
        tracing::info!("Wrote example configuration to {}", path.display());
        return Ok(());
    }

    let config = args.probe_config()?;
    tracing::info!("RUTP probe starting as {:?}", config.role);

    match config.role {
        Role::Server => run_server(&config),
        Role::Client => run_client(&config),
    }
}

/// Accept one client and measure what it sends
fn run_server(config: &ProbeConfig) -> anyhow::Result<()> {
    let mut listener = Listener::bind(&config.stream)?;
    let established = listener.accept(&config.stream, &mut |next: &RutpSocket| {
        tracing::debug!("Listener {} ready for the next client", next.id())
    })?;
    if let Some(size) = established.tuning.escalated_to {
        tracing::info!("Socket buffers grown to {} bytes", size);
    }

    let mut stream = Stream::new(established.socket, &config.stream)?;
    let start = Instant::now();
    let mut last_report = start;
    let mut phase = TestPhase::Running;
    let drain_until = config.duration() + Duration::from_secs(1);

    loop {
        let elapsed = start.elapsed();
        if elapsed >= drain_until {
            break;
        }
        if phase == TestPhase::Running && elapsed >= config.duration() {
            phase = TestPhase::Ending;
        }

        match stream.recv(phase) {
            Ok(RecvOutcome::Idle) => thread::sleep(Duration::from_micros(100)),
            Ok(_) => {}
            Err(e) if !e.is_fatal() => tracing::debug!("{}", e),
            Err(e) => anyhow::bail!("{} (error code {})", e, e.code()),
        }

        if phase == TestPhase::Running && last_report.elapsed() >= config.stats_interval() {
            println!(
                "{}",
                receiver_line(&stream.snapshot(), elapsed, last_report.elapsed())
            );
            last_report = Instant::now();
            stream.reset_interval();
        }
    }

    display_summary(&stream.snapshot(), config.duration());
    Ok(())
}

/// Connect and send for the configured duration
fn run_client(config: &ProbeConfig) -> anyhow::Result<()> {
    let established = connect(&config.stream)?;
    let mut stream = Stream::new(established.socket, &config.stream)?;
    let block = stream.block_size();

    let start = Instant::now();
    let mut schedule = SendSchedule::new(config.stream.rate_bps, block, start);
    let mut last_report = start;

    while start.elapsed() < config.duration() {
        let wait = schedule.delay(Instant::now());
        if !wait.is_zero() {
            thread::sleep(wait);
            continue;
        }

        match stream.send() {
            Ok(SendOutcome::Sent(_)) => schedule.mark_sent(Instant::now()),
            Ok(SendOutcome::WouldBlock) => thread::sleep(Duration::from_micros(100)),
            Err(e) => anyhow::bail!("{} (error code {})", e, e.code()),
        }

        if last_report.elapsed() >= config.stats_interval() {
            println!(
                "{}",
                sender_line(&stream.snapshot(), start.elapsed(), last_report.elapsed())
            );
            last_report = Instant::now();
            stream.reset_interval();
        }
    }

    display_summary(&stream.snapshot(), start.elapsed());
    Ok(())
}
