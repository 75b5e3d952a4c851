use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use imud::{Daemon, DaemonConfig, EventSink, PipeSink, RecordingConfigSink, ScalingPassthrough};
use imud_driver_mock::MockImuSource;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "imud", about = "Inertial sensor daemon", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run for this many seconds, then shut down.
    #[arg(short, long, default_value_t = 5)]
    duration: u64,

    /// Write encoded event records here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("imud=debug,imud_core=debug,imud_driver_mock=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = DaemonConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if cli.print_config {
        print!(
            "{}",
            toml::to_string_pretty(&config).context("serializing configuration")?
        );
        return Ok(());
    }
    info!(?config, "Configuration loaded");

    let sink: Box<dyn EventSink> = match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating output file {}", path.display()))?;
            Box::new(PipeSink::new(BufWriter::new(file)))
        }
        None => Box::new(PipeSink::new(std::io::stdout())),
    };

    let source = MockImuSource::new(config.mock.clone());
    let engine = ScalingPassthrough::new(config.accel_range, config.gyro_range);

    let mut daemon = Daemon::start(
        &config,
        vec![Box::new(source)],
        Box::new(engine),
        sink,
        Box::new(RecordingConfigSink::default()),
    )
    .context("starting daemon")?;

    // Subscribe the three physical streams at their default rates.
    for id in [1, 2, 3] {
        daemon.activate(id, true)?;
        daemon.set_batch(id, 20_000_000, 200_000_000)?;
    }

    std::thread::sleep(Duration::from_secs(cli.duration));
    daemon.flush(1)?;
    daemon.shutdown();

    let stats = daemon.stats();
    info!(
        events = stats.events_delivered,
        frames = stats.frames_aligned,
        batches = stats.batches_merged,
        drops = stats.total_drops(),
        decode_errors = stats.decode_errors,
        "Pipeline summary"
    );
    Ok(())
}
