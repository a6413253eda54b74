//! Gesture Stream CLI
//!
//! Streaming hand-gesture recognition server and tools.

use clap::{Parser, Subcommand};
use gesture_stream::{
    config::Config,
    core::FEATURE_DIM,
    inference::{InferencePort, TARGET_LATENCY_MS},
    VERSION,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gesture-stream")]
#[command(version = VERSION)]
#[command(about = "Near-real-time hand gesture recognition over WebSocket", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the per-user config path)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the streaming recognition server
    Serve {
        /// Address to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Model file (.json linear weights or .onnx)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Frames per inference window
        #[arg(long)]
        window_size: Option<usize>,

        /// Frames between inferences
        #[arg(long)]
        stride: Option<usize>,

        /// Drop candidates below this confidence
        #[arg(long)]
        min_confidence: Option<f32>,

        /// Number of ranked candidates per window
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Measure inference latency on a synthetic window
    Benchmark {
        /// Timed iterations (after warm-up)
        #[arg(long, default_value = "100")]
        iterations: usize,

        /// Model file (.json linear weights or .onnx)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Frames per window
        #[arg(long)]
        window_size: Option<usize>,
    },

    /// Show configuration
    Config {
        /// Write the default configuration to the config file first
        #[arg(long)]
        init: bool,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            model,
            window_size,
            stride,
            min_confidence,
            top_k,
        } => {
            let mut config = load_config(cli.config.as_deref());
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if model.is_some() {
                config.inference.model_path = model;
            }
            if let Some(window_size) = window_size {
                config.recognition.window_size = window_size;
            }
            if let Some(stride) = stride {
                config.recognition.stride = stride;
            }
            if let Some(min_confidence) = min_confidence {
                config.recognition.min_confidence = min_confidence;
            }
            if let Some(top_k) = top_k {
                config.recognition.top_k = top_k;
            }
            cmd_serve(config);
        }
        Commands::Benchmark {
            iterations,
            model,
            window_size,
        } => {
            let mut config = load_config(cli.config.as_deref());
            if model.is_some() {
                config.inference.model_path = model;
            }
            if let Some(window_size) = window_size {
                config.recognition.window_size = window_size;
            }
            cmd_benchmark(&config, iterations);
        }
        Commands::Config { init } => {
            cmd_config(cli.config.as_deref(), init);
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&std::path::Path>) -> Config {
    let result = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    match result {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn build_port(config: &Config) -> InferencePort {
    match InferencePort::from_config(&config.inference) {
        Ok(port) => port,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "server")]
fn cmd_serve(config: Config) {
    use std::sync::Arc;

    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    println!("Gesture Stream v{VERSION}");
    println!();

    let port = Arc::new(build_port(&config));
    println!("  Backend: {}", port.status());
    println!(
        "  Window: {} frames, stride {}",
        config.recognition.window_size, config.recognition.stride
    );
    println!("  Min confidence: {}", config.recognition.min_confidence);
    println!("  Data path: {}", config.data_path.display());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: Failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    let result: anyhow::Result<()> = runtime.block_on(async move {
        let (addr, shutdown_tx) = gesture_stream::server::run(config, port).await?;
        println!("  Listening on: ws://{addr}/ws/recognize");
        println!();
        println!("Press Ctrl+C to stop");

        tokio::signal::ctrl_c().await?;
        println!();
        println!("Shutting down...");
        let _ = shutdown_tx.send(());
        Ok(())
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "server"))]
fn cmd_serve(_config: Config) {
    eprintln!("Error: this build does not include the server feature");
    std::process::exit(1);
}

fn cmd_benchmark(config: &Config, iterations: usize) {
    let port = build_port(config);
    let window_size = config.recognition.window_size;

    println!("Benchmarking {} backend", port.status());
    println!("  Window: {window_size} x {FEATURE_DIM}");
    println!("  Iterations: {iterations}");
    println!();

    let report = match port.benchmark(iterations, window_size, FEATURE_DIM) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let s = &report.summary;
    println!("  Mean:   {:.2} ms", s.mean_ms);
    println!("  Median: {:.2} ms", s.median_ms);
    println!("  Std:    {:.2} ms", report.std_ms);
    println!("  Min:    {:.2} ms", s.min_ms);
    println!("  Max:    {:.2} ms", s.max_ms);
    println!("  P95:    {:.2} ms", s.p95_ms);
    println!("  P99:    {:.2} ms", s.p99_ms);
    println!();
    if report.target_met {
        println!("Median latency is within the {TARGET_LATENCY_MS} ms target");
    } else {
        println!("Median latency exceeds the {TARGET_LATENCY_MS} ms target");
    }
}

fn cmd_config(path: Option<&std::path::Path>, init: bool) {
    let config_path = path.map(PathBuf::from).unwrap_or_else(Config::config_path);

    if init {
        if config_path.exists() {
            eprintln!("Error: {} already exists", config_path.display());
            std::process::exit(1);
        }
        if let Err(e) = Config::default().save_to(&config_path) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        println!("Wrote default configuration to {}", config_path.display());
        println!();
    }

    let config = load_config(Some(&config_path));

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", config_path);
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}
