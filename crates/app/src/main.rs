use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use numvox_app::console::ConsoleAdapter;
use numvox_app::runtime::{AppRuntime, RuntimeOptions};
use numvox_core::SettingsPatch;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "numvox", about = "Spoken number drill", version)]
struct Cli {
    /// Settings persistence file
    #[arg(long, default_value = "numvox-settings.json")]
    settings_file: PathBuf,

    /// JSON file with default settings, merged over the built-ins
    #[arg(long)]
    defaults_file: Option<PathBuf>,

    /// Preferred voice name (exact or substring match)
    #[arg(long)]
    voice: Option<String>,

    /// Language tag for voice selection, e.g. nl-NL
    #[arg(long)]
    language: Option<String>,

    /// Number of grid cells to play
    #[arg(long)]
    count: Option<u32>,

    /// Full passes over the selection
    #[arg(long)]
    repeat: Option<u32>,

    /// Pause after each item, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Speech rate multiplier
    #[arg(long)]
    rate: Option<f32>,

    /// Print the available voices and exit
    #[arg(long)]
    list_voices: bool,
}

fn init_logging() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(log_level).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    info!("Starting numvox");

    let options = RuntimeOptions {
        settings_path: cli.settings_file.clone(),
        defaults_path: cli.defaults_file.clone(),
        ..RuntimeOptions::default()
    };
    let runtime = AppRuntime::start(options).await;

    if cli.list_voices {
        let snapshot = runtime.catalog.snapshot();
        if snapshot.voices.is_empty() {
            println!("no voices available");
        } else {
            for voice in &snapshot.voices {
                println!("{}  [{}]", voice.name, voice.lang);
            }
        }
        runtime.shutdown();
        return Ok(());
    }

    // CLI flags override persisted settings for this run (and persist,
    // matching every other settings mutation)
    let patch = SettingsPatch {
        voice_name: cli.voice,
        language_code: cli.language,
        count: cli.count,
        repeat: cli.repeat,
        delay_ms: cli.delay_ms,
        rate: cli.rate,
        ..Default::default()
    };
    runtime.store.update(patch);

    let (quit_tx, mut quit_rx) = mpsc::unbounded_channel();
    let console = ConsoleAdapter::spawn(
        Arc::clone(&runtime.bus),
        Arc::clone(&runtime.grid),
        quit_tx,
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        _ = quit_rx.recv() => info!("Quit requested"),
    }

    console.shutdown();
    runtime.shutdown();
    Ok(())
}
