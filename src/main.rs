use anyhow::Result;
use clap::{Parser, Subcommand};
use socialauth_config::Config;
use socialauth_types::ProviderId;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "socialauth", about = "Sign in with a social identity provider")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authenticate in the browser and print the normalized profile.
    Login {
        /// Provider name (stackexchange / stackoverflow).
        provider: String,
        /// Path to the YAML configuration file.
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Print the authorization URL for a provider.
    Url {
        /// Provider name.
        provider: String,
        /// Path to the YAML configuration file.
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Redirect target (default: the local callback URL).
        #[arg(long, value_name = "URL")]
        success_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Login { provider, config } => cmd_login(provider, config).await,
        Commands::Url {
            provider,
            config,
            success_url,
        } => cmd_url(provider, config, success_url),
    }
}

async fn cmd_login(provider_str: String, config_path: Option<PathBuf>) -> Result<()> {
    let provider = parse_provider(&provider_str)?;
    let config = load_config(config_path)?;
    let profile = socialauth_auth::flow::login(provider, &config)
        .await
        .map_err(|e| anyhow::anyhow!("login failed: {e}"))?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

fn cmd_url(
    provider_str: String,
    config_path: Option<PathBuf>,
    success_url: Option<String>,
) -> Result<()> {
    let provider = parse_provider(&provider_str)?;
    let config = load_config(config_path)?;
    let success_url = success_url.unwrap_or_else(|| config.success_url());
    let url = socialauth_auth::flow::authorization_url(provider, &config, &success_url)
        .map_err(|e| anyhow::anyhow!("cannot build authorization url: {e}"))?;
    println!("{url}");
    Ok(())
}

fn parse_provider(provider_str: &str) -> Result<ProviderId> {
    provider_str
        .parse::<ProviderId>()
        .map_err(|e| anyhow::anyhow!("unknown provider '{provider_str}': {e}"))
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = config_path.unwrap_or_else(default_config_path);
    Config::from_file(&path).map_err(|e| anyhow::anyhow!("config error ({}): {e}", path.display()))
}

fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".socialauth").join("config.yaml")
}
