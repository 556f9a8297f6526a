mod cli;
mod core;

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::output::{detect_color, OutputFormat, OutputOptions};
use crate::core::config::AppConfig;

#[derive(Parser)]
#[command(name = "creditbar", about = "OpenRouter prepaid credit monitor", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format (text|json)
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Shorthand for --format json
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and display the current balance once
    Show,
    /// Keep the balance on screen, refreshing periodically
    Watch {
        /// Seconds between refreshes (default from config, 30)
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Store an API key (prompts when omitted)
    Set {
        /// The OpenRouter API key
        key: Option<String>,
    },
    /// Show the configured API key, masked
    Show,
    /// Remove the stored API key
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default config file
    Init,
    /// Validate config file
    Check,
}

fn init_logging(level: &str, verbose: bool) {
    let level = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("creditbar={}", level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_err) = match AppConfig::load() {
        Ok(c) => (c, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    init_logging(&config.settings.log_level, cli.verbose);
    if let Some(e) = config_err {
        warn!(error = %e, "using default config");
    }

    let output_opts = OutputOptions {
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::from_name(
                cli.format
                    .as_deref()
                    .unwrap_or(&config.settings.default_format),
            )
        },
        pretty: cli.pretty,
        use_color: detect_color(&config.settings.color, cli.no_color),
    };

    match cli.command {
        None | Some(Commands::Show) => cli::show_cmd::run(&config, &output_opts).await?,
        Some(Commands::Watch { interval }) => {
            cli::watch_cmd::run(&config, interval, &output_opts).await?
        }
        Some(Commands::Key { action }) => match action {
            KeyAction::Set { key } => cli::key_cmd::set(key, &output_opts)?,
            KeyAction::Show => cli::key_cmd::show(&output_opts)?,
            KeyAction::Clear => cli::key_cmd::clear(&output_opts)?,
        },
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init => cli::config_cmd::init(&output_opts)?,
            ConfigAction::Check => cli::config_cmd::check(&output_opts)?,
        },
    }

    Ok(())
}
