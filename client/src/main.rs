use {
    anyhow::Result,
    chunkcrypt::{
        cli::{Cli, default_config_path},
        config::Config,
        run, setup_logger,
        term::clear_status,
    },
    clap::Parser,
    std::process,
    tracing::error,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = Config::parse(&config_path)?;
    setup_logger(config.log_file.as_deref(), &config.log_filter)?;
    if let Err(err) = run(cli, config).await {
        clear_status();
        error!("{err:#}");
        process::exit(1);
    }
    Ok(())
}
