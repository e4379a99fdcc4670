//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands;
use crate::config;
use crate::logging;
use anyhow::anyhow;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;

/// Creates or migrates the config file before any command reads it.
fn check_and_run_setup() -> Result<(), anyhow::Error> {
    let config_path = config::config_path()?;
    crate::setup::ensure_config(&config_path).map_err(|e| {
        tracing::error!("Setup failed: {e}");
        anyhow!("Setup failed: {e}")
    })
}

/// Live audio stream viewer with a scrolling terminal waveform
#[derive(Parser)]
#[command(name = "wavetap")]
#[command(version)]
#[command(about = "Live audio stream viewer with a scrolling terminal waveform")]
#[command(long_about = "Live audio stream viewer with a scrolling terminal waveform.\n\nConnects to an audio source over a WebSocket, draws the incoming sample\nchunks as a continuously scrolling waveform and acknowledges every chunk\nback to the source. When the stream ends, the final counts are posted once.\n\nDEFAULT COMMAND:\n    If no command is specified, 'watch' is used by default.\n    Watch options (--url, --api-base) can be used without saying 'watch'.\n\nKEYS:\n    + / -     amplitude up / down\n    ] / [     scroll speed up / down\n    q, Esc    quit\n\nEXAMPLES:\n    # Watch the default local source\n    $ wavetap\n\n    # Watch another host\n    $ wavetap --url ws://studio:8000/audio --api-base http://studio:8000\n\n    # Replay a raw f32 capture at 50 chunks per second\n    $ wavetap replay capture.f32 --rate 50\n\n    # Edit configuration file\n    $ wavetap config")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/wavetap/wavetap.toml\n    Logs:               ~/.local/state/wavetap/wavetap.log.*"
)]
struct Cli {
    /// WebSocket URL of the audio stream (watch default command)
    #[arg(long, value_name = "URL", global = true)]
    url: Option<String>,

    /// Base URL of the acknowledgment API (watch default command)
    #[arg(long, value_name = "URL", global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the live stream (default)
    ///
    /// Press +/- to change amplitude, ]/[ to change speed, Escape/q to quit.
    #[command(visible_alias = "w")]
    Watch,

    /// Replay a capture of raw little-endian f32 samples
    ///
    /// The file is cut into chunks and played through the viewer at a fixed
    /// rate. Acknowledgments are handled locally.
    #[command(visible_alias = "rp")]
    Replay {
        /// Path to the capture file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Samples per chunk
        #[arg(long, value_name = "N")]
        chunk_len: Option<usize>,

        /// Chunks per second
        #[arg(long, value_name = "R")]
        rate: Option<f64>,
    },

    /// Open configuration file in your preferred editor
    ///
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   wavetap completions bash > wavetap.bash
    ///   wavetap completions zsh > _wavetap
    ///   wavetap completions fish > wavetap.fish
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Exit Codes
/// - 0: Success
/// - 1: General error
/// - 2: Usage error (invalid arguments)
///
/// # Errors
/// - If setup fails
/// - If logging initialization fails
/// - If command execution fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Commands that need neither logging nor config
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "wavetap", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::Logs) => {
            return match commands::handle_logs() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        _ => {}
    }

    logging::init_logging()?;
    check_and_run_setup()?;

    match cli.command {
        None | Some(Commands::Watch) => {
            commands::handle_watch(cli.url, cli.api_base).await?;
        }
        Some(Commands::Replay {
            file,
            chunk_len,
            rate,
        }) => {
            commands::handle_replay(file, chunk_len, rate).await?;
        }
        Some(Commands::Config) => {
            commands::handle_config()?;
        }
        Some(Commands::Completions { .. }) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}
