use clap::{Parser, Subcommand};
use multilateration::api::{FixFormatter, PositionBoard};
use multilateration::transport::{LineSource, Simulator};
use multilateration::{position_channel, EngineConfig, OutputFormat, PositioningEngine};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "multilateration")]
#[command(about = "Range aggregation and multilateration engine")]
struct Cli {
    /// Engine configuration (JSON); the built-in layout when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine against simulated tags
    Simulate {
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<usize>,
        /// Pause between cycles in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Uniform range noise amplitude
        #[arg(long, default_value_t = 0.0)]
        noise: f64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Replay captured `topic payload` lines (stdin when no file is given)
    Replay { file: Option<PathBuf> },
    /// Validate a configuration file
    CheckConfig { file: PathBuf },
    /// Print the configured anchor table
    Anchors,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckConfig { file } => check_config(&file),
        command => {
            let config = match load_config(cli.config.as_deref()) {
                Ok(config) => config,
                Err(code) => return code,
            };
            match command {
                Commands::Simulate {
                    cycles,
                    interval_ms,
                    noise,
                    seed,
                } => simulate(config, cli.format, cycles, Duration::from_millis(interval_ms), noise, seed),
                Commands::Replay { file } => replay(config, cli.format, file.as_deref()),
                Commands::Anchors => anchors(config),
                Commands::CheckConfig { .. } => ExitCode::SUCCESS,
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, ExitCode> {
    match path {
        None => Ok(EngineConfig::default()),
        Some(path) => EngineConfig::from_file(path).map_err(|e| {
            eprintln!("Configuration error: {}", e);
            ExitCode::FAILURE
        }),
    }
}

fn check_config(path: &Path) -> ExitCode {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let config: EngineConfig = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = config.validate();
    for summary in config.summary() {
        println!(
            "  {}: topic '{}', {} anchors (solve at {}), geometry {:?}",
            summary.technology, summary.topic, summary.anchor_count, summary.required_anchors, summary.geometry
        );
    }
    for warning in &result.warnings {
        println!("  warning: {}", warning);
    }
    for error in &result.errors {
        eprintln!("  error: {}", error);
    }

    if result.is_valid {
        println!("Configuration is valid");
        ExitCode::SUCCESS
    } else {
        eprintln!("Configuration is invalid ({} errors)", result.errors.len());
        ExitCode::FAILURE
    }
}

fn simulate(
    config: EngineConfig,
    format: OutputFormat,
    cycles: Option<usize>,
    interval: Duration,
    noise: f64,
    seed: u64,
) -> ExitCode {
    let (publisher, drain) = position_channel();
    let mut engine = match PositioningEngine::new(&config, publisher) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut simulator = Simulator::new(engine.layouts().clone(), Simulator::default_tags(), seed).with_noise(noise);
    if let Some(cycles) = cycles {
        simulator = simulator.with_max_cycles(cycles);
    }

    let done = Arc::new(AtomicBool::new(false));

    let ingest_done = Arc::clone(&done);
    let ingestion = thread::spawn(move || {
        log::info!("simulation started");
        let mut failed = false;
        while !simulator.is_finished() {
            if let Err(e) = engine.pump(&mut simulator) {
                log::error!("simulation stopped: {}", e);
                failed = true;
                break;
            }
            thread::sleep(interval);
        }
        log::info!("simulation finished after {} cycles: {:?}", simulator.cycles(), engine.stats());
        ingest_done.store(true, Ordering::SeqCst);
        failed
    });

    let consumer = thread::spawn(move || {
        let formatter = format.formatter();
        let mut board = PositionBoard::new();
        loop {
            let finished = done.load(Ordering::SeqCst);
            if board.absorb(&drain) > 0 {
                print_positions(formatter.as_ref(), &board);
            }
            if finished {
                break;
            }
            thread::sleep(DRAIN_INTERVAL);
        }
    });

    let failed = ingestion.join().unwrap_or(true);
    if consumer.join().is_err() {
        return ExitCode::FAILURE;
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_positions(formatter: &dyn FixFormatter, board: &PositionBoard) {
    match formatter.format_positions(&board.positions()) {
        Ok(output) => println!("{}", output.trim_end()),
        Err(e) => log::error!("failed to format positions: {}", e),
    }
}

fn replay(config: EngineConfig, format: OutputFormat, file: Option<&Path>) -> ExitCode {
    let reader: Box<dyn BufRead> = match file {
        Some(path) => match File::open(path) {
            Ok(f) => Box::new(BufReader::new(f)),
            Err(e) => {
                eprintln!("Error reading file: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => Box::new(io::stdin().lock()),
    };
    let source_id = file.map_or_else(|| "stdin".to_string(), |p| p.display().to_string());
    let mut source = LineSource::new(source_id, reader);

    let (publisher, drain) = position_channel();
    let mut engine = match PositioningEngine::new(&config, publisher) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let summary = match engine.pump(&mut source) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Replay failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let formatter = format.formatter();
    let fixes = drain.drain();
    if let Some(header) = formatter.fix_header().filter(|_| !fixes.is_empty()) {
        println!("{}", header);
    }
    for fix in fixes {
        match formatter.format_fix(&fix) {
            Ok(output) => println!("{}", output.trim_end()),
            Err(e) => log::error!("failed to format fix: {}", e),
        }
    }

    log::info!(
        "replayed {} messages: {} fixes, {} dropped, {} bad lines",
        summary.messages,
        summary.fixes,
        summary.dropped,
        summary.skipped_frames
    );
    ExitCode::SUCCESS
}

fn anchors(config: EngineConfig) -> ExitCode {
    let (publisher, _drain) = position_channel();
    let engine = match PositioningEngine::new(&config, publisher) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&engine.beacon_table()) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Serialization error: {}", e);
            ExitCode::FAILURE
        }
    }
}
