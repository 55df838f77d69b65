use anyhow::Result;
use clap::Parser;
use padelvision::report::{export_heatmap_png, SessionReport};
use padelvision::{
    LiveSession, PadelConfig, SceneSwitch, SyntheticCamera, VideoStreamManager, VideoStreamManagerBuilder,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "padelvision")]
#[command(about = "Live padel ball tracking with scene switching and court analytics")]
#[command(version)]
#[command(long_about = "Runs the live ball-tracking pipeline against a simulated court camera: \
frames are captured at the configured rate, the ball is located in each frame and its positions \
feed a heatmap and velocity statistics. Scenes can be cycled while the session runs.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "padelvision.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting a session")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Stop after this many processed frames
    #[arg(long, value_name = "N")]
    frames: Option<u64>,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,

    /// Scene to cycle through while running (repeatable)
    #[arg(long = "scene", value_name = "NAME")]
    scenes: Vec<String>,

    /// Seconds between scene switches
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    scene_interval: u64,

    /// Write the court heatmap as a PNG image
    #[arg(long, value_name = "PATH")]
    heatmap_png: Option<PathBuf>,

    /// Write a JSON session report ("-" for stdout)
    #[arg(long, value_name = "PATH")]
    report: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting padelvision v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match PadelConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }
    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let camera = Arc::new(SyntheticCamera::new(&config.synthetic));
    let manager = Arc::new(
        VideoStreamManagerBuilder::new()
            .config(config.stream.clone())
            .devices(camera)
            .build()?,
    );

    let mut session = LiveSession::new(Arc::clone(&manager), &config);
    if let Some(frames) = args.frames {
        session = session.with_frame_limit(frames);
    }

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());
    if let Some(secs) = args.duration {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            info!("Session duration of {}s reached", secs);
            cancel.cancel();
        });
    }
    if !args.scenes.is_empty() {
        tokio::spawn(cycle_scenes(
            Arc::clone(&manager),
            args.scenes.clone(),
            Duration::from_secs(args.scene_interval.max(1)),
            cancel.clone(),
        ));
    }

    let result = session
        .run(cancel.clone(), |detection| {
            debug!(
                "Ball at ({:.1}, {:.1}) in frame {}, speed {:.3} m/frame",
                detection.position.x,
                detection.position.y,
                detection.frame_id,
                detection.velocity.speed()
            );
        })
        .await;
    cancel.cancel();

    let summary = result.map_err(|e| {
        error!("Session failed: {}", e);
        e
    })?;

    let analytics = session.analytics();
    let analytics = analytics.lock();

    if let Some(path) = &args.heatmap_png {
        export_heatmap_png(&analytics, path)?;
    }

    let report = SessionReport::build(
        summary,
        manager.stream_stats(),
        &analytics,
        session.monitor(),
        manager.error_handler().recovery_attempts(),
    );
    match args.report.as_deref() {
        Some("-") => println!("{}", report.to_json()?),
        Some(path) => report.write_to(path)?,
        None => info!(
            "Processed {} frames, {} detections, average speed {:.3} px/ms",
            report.session.frames_processed, report.session.detections, report.velocity.average
        ),
    }

    Ok(())
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping session");
                cancel.cancel();
            }
            Err(e) => warn!("Failed to listen for interrupt: {}", e),
        }
    });
}

async fn cycle_scenes(
    manager: Arc<VideoStreamManager>,
    scenes: Vec<String>,
    interval: Duration,
    cancel: CancellationToken,
) {
    for scene in scenes.iter().cycle() {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        if manager.current_stream().is_none() {
            continue;
        }

        match manager.switch_scene(scene).await {
            Ok(SceneSwitch::Switched(stream)) => info!("Scene '{}' live on {}", scene, stream.device_id()),
            Ok(SceneSwitch::Busy(_)) => debug!("Scene switch to '{}' skipped, transition running", scene),
            Err(e) => warn!("Failed to switch to scene '{}': {}", scene, e),
        }
    }
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("padelvision={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# padelvision configuration file");
    println!("# Every option with its default value; PADEL_<SECTION>__<KEY> overrides any of them");
    println!();
    println!("{}", toml::to_string_pretty(&PadelConfig::default())?);
    Ok(())
}
