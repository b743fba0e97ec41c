use chrono::{DateTime, Local, TimeZone};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "resonance-cli", version, about = "Resonance energy engine CLI")]
struct Cli {
    /// Evaluate as of this instant (RFC 3339) instead of the local clock
    #[arg(long, global = true)]
    at: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Energy ledger
    Energy {
        #[command(subcommand)]
        action: commands::energy::EnergyAction,
    },
    /// Inactivity decay
    Decay {
        #[command(subcommand)]
        action: commands::decay::DecayAction,
    },
    /// Forecast today's closing energy against a goal color
    Predict(commands::predict::PredictArgs),
    /// Adaptive difficulty
    Difficulty {
        #[command(subcommand)]
        action: commands::difficulty::DifficultyAction,
    },
    /// Circadian calibration samples
    Calibration {
        #[command(subcommand)]
        action: commands::calibration::CalibrationAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run the engine with its timers and stream signals until Ctrl-C
    Watch,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("RESONANCE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn dispatch<Tz: TimeZone>(
    command: Commands,
    now: DateTime<Tz>,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Energy { action } => commands::energy::run(action, now),
        Commands::Decay { action } => commands::decay::run(action, now),
        Commands::Predict(args) => commands::predict::run(args, now),
        Commands::Difficulty { action } => commands::difficulty::run(action, now),
        Commands::Calibration { action } => commands::calibration::run(action, now),
        Commands::Config { action } => commands::config::run(action),
        Commands::Watch => commands::watch::run(),
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    // Without --at, days follow the local zone, including its DST changes
    let result = match cli.at.as_deref() {
        Some(at) => DateTime::parse_from_rfc3339(at)
            .map_err(|e| -> Box<dyn std::error::Error> {
                format!("invalid --at '{at}': {e}").into()
            })
            .and_then(|now| dispatch(cli.command, now)),
        None => dispatch(cli.command, Local::now()),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
