use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use foot_sizer_lib::engine::{Capabilities, Engine};
use foot_sizer_lib::image_io::get_image_files_in_dir;
use foot_sizer_lib::output::{shoe_size, write_summary_csv};
use foot_sizer_lib::pipeline::{process_path, process_paths, MeasurementRecord};
use foot_sizer_lib::Config;

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "FootSizer - foot length from a photo on A4 paper")]
struct Args {
    /// Path to input image or directory
    #[clap(short, long)]
    input: Option<String>,

    /// Path to output directory
    #[clap(short, long)]
    output: Option<String>,

    /// Path to configuration file
    #[clap(short, long, default_value = "config.toml")]
    config: String,

    /// Restrict measurement to one backend
    #[clap(short, long, value_enum, default_value_t = BackendArg::Auto)]
    backend: BackendArg,

    /// Print single-image results as JSON
    #[clap(long)]
    json: bool,

    /// Enable debug mode (save masks and overlays, verbose logging)
    #[clap(short, long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Auto,
    Threshold,
    Edge,
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    if Path::new(path).exists() {
        Ok(Config::from_file(path)?)
    } else {
        tracing::info!(config = path, "No config file found, using defaults");
        Ok(Config::default())
    }
}

fn build_engine(config: Config, backend: BackendArg) -> anyhow::Result<Engine> {
    let detected = Capabilities::detect().restrict(&config);
    let capabilities = match backend {
        BackendArg::Auto => detected,
        BackendArg::Threshold => Capabilities {
            edge: false,
            ..detected
        },
        BackendArg::Edge => Capabilities {
            threshold: false,
            ..detected
        },
    };
    Ok(Engine::with_capabilities(config, capabilities)?)
}

fn print_single(record: &MeasurementRecord, json: bool) -> bool {
    match &record.outcome {
        Ok(result) => {
            if json {
                match serde_json::to_string(result) {
                    Ok(line) => println!("{}", line),
                    Err(e) => eprintln!("Failed to serialize result: {}", e),
                }
            } else {
                println!("Foot Size: {:.1} cm", result.foot_size_cm);
                println!("Estimated Nigerian Shoe Size: {}", shoe_size(result.foot_size_cm));
                println!("Backend: {}", result.backend);
            }
            true
        }
        Err(err) => {
            if json {
                println!("{}", serde_json::json!({ "error": "Processing failed", "kind": err.kind().as_str() }));
            } else {
                println!("Processing failed ({}). Please retake the photo and try again.", err.kind());
            }
            false
        }
    }
}

fn run(args: Args) -> anyhow::Result<bool> {
    let mut config = load_config(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config))?;

    if let Some(input) = args.input.clone() {
        config.input_path = input;
    }

    if let Some(output) = args.output.clone() {
        config.output_base_dir = output;
    }

    let use_parallel = config.use_parallel;
    let input_path = PathBuf::from(&config.input_path);
    let output_base = PathBuf::from(&config.output_base_dir);
    let debug_dir = args.debug.then(|| output_base.join("debug"));

    let engine = build_engine(config, args.backend)?;

    if input_path.is_file() {
        let record = process_path(&input_path, &engine, debug_dir.as_deref());
        return Ok(print_single(&record, args.json));
    }

    if !input_path.is_dir() {
        bail!("Invalid input path: {}", input_path.display());
    }

    let start_time = Instant::now();
    let files = get_image_files_in_dir(&input_path)?;
    println!("Found {} image files in {}", files.len(), input_path.display());

    let records = process_paths(&files, &engine, debug_dir.as_deref(), use_parallel);
    let succeeded = records.iter().filter(|r| r.outcome.is_ok()).count();

    let summary = write_summary_csv(&records, &output_base)
        .with_context(|| format!("writing summary to {}", output_base.display()))?;

    println!(
        "Measured {}/{} images in {:.2} seconds, summary written to {}",
        succeeded,
        records.len(),
        start_time.elapsed().as_secs_f64(),
        summary.display()
    );

    Ok(succeeded == records.len())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
