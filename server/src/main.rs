use {
    anyhow::Result,
    chunkcrypt_protocol::{AccessToken, util::log_writer},
    chunkcrypt_server::Config,
    clap::{Parser, Subcommand},
    std::{path::PathBuf, sync::Mutex},
    tracing_subscriber::EnvFilter,
};

#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Run the server with the specified config file.
    Serve {
        /// Defaults to `chunkcrypt-server.json5` in the system config directory.
        config: Option<PathBuf>,
    },
    /// Print a new random access token to be added to `access_tokens`.
    GenerateAccessToken,
}

fn default_config_path() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    let dir = PathBuf::from("/etc");
    #[cfg(not(target_os = "linux"))]
    let dir = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("failed to get config dir"))?;
    Ok(dir.join("chunkcrypt-server.json5"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config } => {
            let config_path = match config {
                Some(path) => path,
                None => default_config_path()?,
            };
            let config = Config::parse(&config_path)?;
            tracing_subscriber::fmt()
                .with_writer(Mutex::new(log_writer(config.log_file.as_deref())?))
                .with_env_filter(EnvFilter::try_new(&config.log_filter)?)
                .init();
            chunkcrypt_server::run(config).await?;
        }
        Command::GenerateAccessToken => {
            println!("{}", AccessToken::generate()?.as_unmasked_str());
        }
    }
    Ok(())
}
