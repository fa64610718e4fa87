use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Log filter when RUST_LOG is unset.
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Parser)]
#[command(name = "linebot")]
#[command(about = "LINE webhook relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config.json.
    Init {
        /// Config file path (default: LINEBOT_CONFIG_PATH or ~/.linebot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Run the webhook gateway. Credentials are read from LINE_CHANNEL_SECRET, LINE_ACCESS_TOKEN and OPENAI_API_KEY (or the config file).
    Serve {
        /// Config file path (default: LINEBOT_CONFIG_PATH or ~/.linebot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// HTTP port (default from config or 3000)
        #[arg(long, short)]
        port: Option<u16>,

        /// Bind address (default from config or 127.0.0.1)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print the x-line-signature for a payload file, for sending test webhooks.
    Sign {
        /// Channel secret (default: LINE_CHANNEL_SECRET or the config file)
        #[arg(long)]
        secret: Option<String>,

        /// Config file path (default: LINEBOT_CONFIG_PATH or ~/.linebot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// JSON payload to sign
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER)).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("linebot {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port, bind }) => {
            if let Err(e) = run_serve(config, port, bind).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Sign {
            secret,
            config,
            file,
        }) => {
            if let Err(e) = run_sign(secret, config, file) {
                log::error!("sign failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
) -> anyhow::Result<()> {
    let (mut config, _) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    if let Some(b) = bind {
        config.gateway.bind = b;
    }
    log::info!("starting gateway on {}:{}", config.gateway.bind, config.gateway.port);
    lib::gateway::run_gateway(config).await
}

fn run_sign(
    secret: Option<String>,
    config_path: Option<PathBuf>,
    file: PathBuf,
) -> anyhow::Result<()> {
    let secret = match secret {
        Some(s) => s,
        None => {
            let (config, _) = lib::config::load_config(config_path)?;
            lib::config::Credentials::resolve(&config)
                .channel_secret
                .context("no channel secret (pass --secret or set LINE_CHANNEL_SECRET)")?
        }
    };
    let body = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
    println!("{}", lib::channels::signature::sign(&secret, &body));
    Ok(())
}
