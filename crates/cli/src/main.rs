mod config_commands;
mod user_commands;

use std::{io::Read, path::PathBuf};

use {
    clap::{Parser, Subcommand},
    slackbridge_config::BridgeConfig,
    slackbridge_slackify::{QuoteEscape, Transcoder},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "slackbridge", about = "slackbridge: deliver notifications to Slack")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (default: discovered in ./ then ~/.config/slackbridge/).
    #[arg(long, global = true, env = "SLACKBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is provided).
    Serve,
    /// Send a message to a user.
    Send {
        #[arg(long)]
        user: String,
        #[arg(short, long)]
        message: String,
    },
    /// Connect a user through the "Add to Slack" flow in a browser.
    Link {
        #[arg(long)]
        user: String,
        /// Local callback port (default: server port).
        #[arg(long)]
        callback_port: Option<u16>,
    },
    /// Check a user's stored token with Slack.
    Validate {
        #[arg(long)]
        user: String,
    },
    /// Remove a user's stored connection.
    Disconnect {
        #[arg(long)]
        user: String,
    },
    /// Set a user's Slack username (direct mode). Empty clears it.
    SetUsername {
        #[arg(long)]
        user: String,
        name: String,
    },
    /// Convert markup to Slack text. Reads stdin when no text is given.
    Slackify {
        text: Option<String>,
        /// Also escape single quotes.
        #[arg(long, conflicts_with = "raw")]
        strict: bool,
        /// Do not escape quotes at all.
        #[arg(long)]
        raw: bool,
    },
    /// Validate the configuration file and report errors/warnings.
    CheckConfig {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<BridgeConfig> {
    let mut config = match cli.config {
        Some(ref path) => slackbridge_config::load_config(path)?,
        None => slackbridge_config::discover_and_load(),
    };
    if let Some(ref bind) = cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    Ok(config)
}

fn slackify(text: Option<String>, strict: bool, raw: bool) -> anyhow::Result<()> {
    let input = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        },
    };
    let quotes = match (strict, raw) {
        (_, true) => QuoteEscape::None,
        (true, _) => QuoteEscape::DoubleAndSingle,
        _ => QuoteEscape::Double,
    };
    println!("{}", Transcoder::new(quotes).transcode(&input));
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    match cli.command {
        Some(Commands::Slackify { text, strict, raw }) => return slackify(text, strict, raw),
        Some(Commands::CheckConfig { verbose }) => {
            return config_commands::check(cli.config.as_deref(), verbose);
        },
        _ => {},
    }

    info!(version = env!("CARGO_PKG_VERSION"), "slackbridge starting");
    let config = load_config(&cli)?;
    match cli.command {
        None | Some(Commands::Serve) => slackbridge_gateway::start_gateway(config).await,
        Some(Commands::Send { user, message }) => {
            user_commands::send(&config, &user, &message).await
        },
        Some(Commands::Link {
            user,
            callback_port,
        }) => {
            let port = callback_port.unwrap_or(config.server.port);
            user_commands::link(&config, &user, port).await
        },
        Some(Commands::Validate { user }) => user_commands::validate(&config, &user).await,
        Some(Commands::Disconnect { user }) => user_commands::disconnect(&config, &user).await,
        Some(Commands::SetUsername { user, name }) => {
            user_commands::set_username(&config, &user, &name).await
        },
        Some(Commands::Slackify { .. } | Commands::CheckConfig { .. }) => Ok(()),
    }
}
