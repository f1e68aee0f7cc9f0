use std::{
    io,
    net::{SocketAddr, ToSocketAddrs},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread,
    time::{Duration, Instant},
};

use clap::{Parser, Subcommand};
use log::{LevelFilter, error, info, warn};
use tangue::{
    AppConfig, SamplingLoop, TangueError, TelemetrySource, TelemetryStore,
    dashboard::ConsoleDashboard,
    replay::{self, DEFAULT_REPLAY_RATE_HZ, ReplayOptions},
    telemetry::Telemetry,
    writer::TelemetryWriter,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Listen for telemetry datagrams and show a live readout
    Listen {
        /// UDP port to listen on
        #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
        port: u16,

        /// Detailed readout and per-datagram logging
        #[arg(short, long)]
        verbose: bool,

        /// Record received telemetry to a JSON Lines file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Config file to use instead of the one in the config directory
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Send a recorded JSON Lines file as telemetry datagrams
    Replay {
        #[arg(short, long)]
        input: PathBuf,

        /// Destination, e.g. 127.0.0.1:10000
        #[arg(short, long)]
        target: String,

        #[arg(short, long, default_value_t = DEFAULT_REPLAY_RATE_HZ)]
        rate_hz: u32,

        /// Loop over the recording until interrupted
        #[arg(long)]
        repeat: bool,
    },
}

fn load_config(config_path: Option<&Path>) -> Result<AppConfig, TangueError> {
    if let Some(path) = config_path {
        return AppConfig::from_file(path);
    }
    match AppConfig::local_path() {
        Ok(path) => AppConfig::load_or_init(&path),
        Err(TangueError::NoConfigDir) => {
            warn!("No config directory on this platform, using defaults");
            Ok(AppConfig::default())
        }
        Err(e) => Err(e),
    }
}

fn listen(
    port: u16,
    verbose: bool,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
    running: Arc<AtomicBool>,
) -> Result<(), TangueError> {
    let config = load_config(config_path.as_deref())?;
    let telemetry_writer = output
        .as_deref()
        .map(TelemetryWriter::create)
        .transpose()?;
    let source = TelemetrySource::open(port)?;
    let store = TelemetryStore::with_stale_rejection(config.reject_stale_timestamps);
    let mut sampler =
        SamplingLoop::new(source, store).with_max_datagram_size(config.max_datagram_size);

    // with an output file the sampler also feeds every accepted sample to the writer thread
    let mut writer_handle = None;
    if let Some(telemetry_writer) = telemetry_writer {
        let (telemetry_writer_tx, telemetry_writer_rx) = mpsc::channel::<Telemetry>();
        sampler = sampler.with_recorder(telemetry_writer_tx);
        writer_handle = Some(thread::spawn(move || {
            telemetry_writer.write_from(telemetry_writer_rx)
        }));
    }

    let frame_budget = config.frame_budget();
    let mut dashboard = ConsoleDashboard::new(
        verbose,
        Some(port),
        Duration::from_millis(config.readout_interval_ms),
    );

    while running.load(Ordering::SeqCst) {
        let frame_start = Instant::now();
        sampler.tick();
        if sampler.is_halted() {
            break;
        }
        if let Some(readout) =
            dashboard.render(&sampler.store().snapshot(), sampler.stats(), frame_start)
        {
            println!("{readout}");
        }

        let elapsed = frame_start.elapsed();
        if elapsed < frame_budget {
            thread::sleep(frame_budget - elapsed);
        }
    }

    let halt_reason = sampler.take_halt_reason();
    let stats = sampler.stats();
    info!(
        "Stopped after {} ticks: {} received, {} parse errors, {} stale",
        stats.ticks, stats.received, stats.parse_errors, stats.stale
    );
    sampler.close();
    drop(sampler);

    if let Some(handle) = writer_handle {
        match handle.join() {
            Ok(result) => {
                result?;
            }
            Err(_) => error!("Telemetry writer thread panicked"),
        }
    }

    match halt_reason {
        Some(source) => Err(TangueError::TransportError { source }),
        None => Ok(()),
    }
}

fn resolve_target(target: &str) -> Result<SocketAddr, TangueError> {
    target
        .to_socket_addrs()
        .map_err(|e| TangueError::ReplaySendError { source: e })?
        .next()
        .ok_or_else(|| TangueError::ReplaySendError {
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{target} did not resolve to an address"),
            ),
        })
}

fn replay(
    input: &Path,
    target: &str,
    rate_hz: u32,
    repeat: bool,
    running: Arc<AtomicBool>,
) -> Result<(), TangueError> {
    let points = replay::load_telemetry_jsonl(input)?;
    let options = ReplayOptions {
        target: resolve_target(target)?,
        rate_hz,
        repeat,
    };
    let sent = replay::replay_telemetry(&points, &options, &running)?;
    info!("Sent {} datagrams to {}", sent, options.target);
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    colog::default_builder().filter_level(level).init();
}

fn main() {
    let cli = Args::parse();
    let verbose = matches!(cli.command, Commands::Listen { verbose: true, .. });
    init_logging(verbose);

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!("Exiting...");
        handler_flag.store(false, Ordering::SeqCst);
    }) {
        warn!("Could not set Ctrl-C handler: {}", e);
    }

    let result = match cli.command {
        Commands::Listen {
            port,
            verbose,
            output,
            config,
        } => listen(port, verbose, output, config, running),
        Commands::Replay {
            input,
            target,
            rate_hz,
            repeat,
        } => replay(&input, &target, rate_hz, repeat, running),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}
