//! CLI for rngtoolbox: operate a hardware random-number generator.

mod commands;
mod tui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::ConfigOverrides;

#[derive(Parser)]
#[command(name = "rngtoolbox")]
#[command(about = "rngtoolbox: collect, condition, and use randomness from a hardware RNG")]
#[command(version = rngtoolbox_core::VERSION)]
struct Cli {
    /// Settings file (default: <config dir>/rngtoolbox/collect_settings.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List selectable sources: the OS entropy pool, the remote endpoint, serial ports
    Ports,

    /// List available conditioners
    Conditioners,

    /// Show, change, or reset the saved collection settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run one collection session with the saved settings
    Collect {
        #[command(flatten)]
        overrides: ConfigOverrides,

        /// Show the interactive collection view
        #[arg(long)]
        tui: bool,

        /// Use the overrides for this run only
        #[arg(long)]
        no_save: bool,
    },

    /// Draw a uniform random integer in [start, end)
    Draw {
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        start: i64,

        #[arg(long, allow_hyphen_values = true)]
        end: i64,
    },

    /// Flip a coin
    Flip,

    /// Generate a symmetric key (hex)
    Key {
        #[arg(long, default_value = "AES")]
        algorithm: String,
    },

    /// Generate a numeric one-time password
    Otp {
        /// Number of digits
        #[arg(long, default_value_t = rngtoolbox_core::DEFAULT_OTP_LENGTH)]
        length: usize,
    },

    /// Encrypt a message with AES-256-GCM (hex key in, hex ciphertext out)
    Encrypt {
        /// Key as 64 hex characters (see `rngtoolbox key`)
        #[arg(long)]
        key: String,

        #[arg(long, default_value = "AES")]
        algorithm: String,

        message: String,
    },

    /// Decrypt a message produced by `encrypt`
    Decrypt {
        /// Key as 64 hex characters
        #[arg(long)]
        key: String,

        #[arg(long, default_value = "AES")]
        algorithm: String,

        ciphertext: String,
    },

    /// Generate one-time-pad material (hex)
    Pad {
        /// Pad length in bytes
        #[arg(long, default_value = "32")]
        bytes: usize,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the saved settings
    Show,

    /// Change saved settings
    Set {
        #[command(flatten)]
        overrides: ConfigOverrides,
    },

    /// Restore the default settings
    Reset,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let settings = cli.config.as_deref();

    match cli.command {
        Commands::Ports => commands::ports::run(settings),
        Commands::Conditioners => commands::ports::run_conditioners(),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(settings),
            ConfigAction::Set { overrides } => commands::config::set(settings, &overrides),
            ConfigAction::Reset => commands::config::reset(settings),
        },
        Commands::Collect {
            overrides,
            tui,
            no_save,
        } => commands::collect::run(settings, &overrides, tui, no_save),
        Commands::Draw { start, end } => commands::tools::draw(settings, start, end),
        Commands::Flip => commands::tools::flip(settings),
        Commands::Key { algorithm } => commands::tools::key(settings, &algorithm),
        Commands::Otp { length } => commands::tools::otp(settings, length),
        Commands::Encrypt {
            key,
            algorithm,
            message,
        } => commands::tools::encrypt(settings, &algorithm, &key, &message),
        Commands::Decrypt {
            key,
            algorithm,
            ciphertext,
        } => commands::tools::decrypt(&algorithm, &key, &ciphertext),
        Commands::Pad { bytes } => commands::tools::pad(settings, bytes),
    }
}
