//! Command-line client: encrypts local files in chunks and stores them on a
//! chunkcrypt server, or fetches and decrypts them back.

pub mod cli;
pub mod config;
mod download;
pub mod info;
pub mod term;
mod upload;

use {
    crate::{
        cli::{Cli, Command, default_log_path},
        config::Config,
        info::files_table,
        term::TermLayer,
    },
    anyhow::{Context as _, Result, bail, ensure},
    chunkcrypt_protocol::{
        AccessToken,
        util::{log_writer, maybe_block_in_place},
    },
    chunkcrypt_sdk::{Client, Passphrase, TransferOptions, list_files, remove_file},
    std::{
        io::{self, Write as _},
        path::{Path, PathBuf},
        sync::Mutex,
    },
    tracing::info,
    tracing_subscriber::{EnvFilter, prelude::*},
};

#[derive(Debug)]
pub struct Ctx {
    pub config: Config,
    pub client: Client,
    pub options: TransferOptions,
    pub passphrase_file: Option<PathBuf>,
}

impl Ctx {
    /// Reads the passphrase from `--passphrase-file` or prompts for it.
    /// A prompted passphrase for a new upload is asked twice.
    fn passphrase(&self, confirm: bool) -> Result<Passphrase> {
        if let Some(path) = &self.passphrase_file {
            let text = fs_err::read_to_string(path)?;
            let line = text.lines().next().unwrap_or_default();
            return Passphrase::new(line)
                .with_context(|| format!("invalid passphrase in {}", path.display()));
        }
        let value = rpassword::prompt_password("Passphrase: ")?;
        if confirm {
            let repeated = rpassword::prompt_password("Repeat passphrase: ")?;
            ensure!(value == repeated, "passphrases don't match");
        }
        Ok(Passphrase::new(value)?)
    }
}

#[cfg(feature = "keyring")]
const KEYRING_SERVICE: &str = "chunkcrypt";

#[cfg(feature = "keyring")]
fn fetch_keyring_access_token() -> Result<String> {
    use tracing::warn;

    const USER: &str = "chunkcrypt_access_token";

    let entry = keyring::Entry::new(KEYRING_SERVICE, USER)?;
    match entry.get_password() {
        Ok(password) => Ok(password),
        Err(keyring::Error::NoEntry) => {
            info!("entry {USER:?} not found in keyring");
            let value = rpassword::prompt_password("Input access token: ")?;
            if value.is_empty() {
                bail!("no value provided");
            }
            match entry.set_password(&value) {
                Ok(()) => info!("entry {USER:?} saved to keyring"),
                Err(err) => warn!("failed to save access token in keyring: {err}"),
            }
            Ok(value)
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(not(feature = "keyring"))]
fn fetch_keyring_access_token() -> Result<String> {
    bail!("`use_keyring` is set but this build has no keyring support")
}

fn access_token(config: &Config) -> Result<AccessToken> {
    if config.use_keyring {
        if config.access_token.is_some() {
            bail!(
                "invalid config: if `use_keyring` is true, \
                `access_token` cannot be specified in the config"
            );
        }
        return fetch_keyring_access_token()?
            .parse()
            .context("invalid access token in keyring");
    }
    config
        .access_token
        .clone()
        .context("missing `access_token` or `use_keyring` in config")
}

#[inline]
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let ctx = Ctx {
        client: Client::new(config.server_url.clone(), access_token(&config)?)?,
        options: config.transfer_options()?,
        passphrase_file: cli.passphrase_file,
        config,
    };
    handle_command(cli.command, &ctx).await
}

async fn handle_command(command: Command, ctx: &Ctx) -> Result<()> {
    match command {
        Command::Upload { path, name } => upload::upload(ctx, &path, name).await?,
        Command::Download { name, path } => download::download(ctx, &name, &path).await?,
        Command::Ls => {
            let files = list_files(&ctx.client, &ctx.options).await?;
            if files.is_empty() {
                info!("No files stored.");
            } else {
                info!("{}", files_table(&files));
            }
        }
        Command::Remove { name, yes } => {
            let question = format!("Are you sure you want to delete {name:?}?");
            if !yes && !maybe_block_in_place(|| confirm(&question))? {
                info!("Cancelled.");
                return Ok(());
            }
            remove_file(&ctx.client, &name, &ctx.options).await?;
            info!("Removed {name}.");
        }
    }
    Ok(())
}

/// Asks a yes/no question on the terminal. Anything but an explicit yes declines.
fn confirm(question: &str) -> Result<bool> {
    let mut stdout = io::stdout();
    write!(stdout, "{question} [y/N] ")?;
    stdout.flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[inline]
pub fn setup_logger(log_file: Option<&Path>, log_filter: &str) -> Result<()> {
    // Defaults to stdout if `data_dir()` fails.
    let log_file = log_file.map(Path::to_path_buf).or_else(|| {
        default_log_path()
            .inspect_err(|err| eprintln!("{err}"))
            .ok()
    });
    let fmt_layer =
        tracing_subscriber::fmt::layer().with_writer(Mutex::new(log_writer(log_file.as_deref())?));
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(EnvFilter::try_new(log_filter)?)
        .with(TermLayer)
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    static TOKEN: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789ab";

    fn config(text: &str) -> Config {
        json5::from_str(text).unwrap()
    }

    #[test]
    fn access_token_from_config() {
        let token = access_token(&config(&format!(
            "{{ server_url: 'http://localhost/', access_token: '{TOKEN}' }}"
        )))
        .unwrap();
        assert_eq!(token.as_unmasked_str(), TOKEN);

        access_token(&config("{ server_url: 'http://localhost/' }")).unwrap_err();
        access_token(&config(&format!(
            "{{ server_url: 'http://localhost/', access_token: '{TOKEN}', use_keyring: true }}"
        )))
        .unwrap_err();
    }

    #[test]
    fn passphrase_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret");
        fs_err::write(&path, "correct horse\nignored\n").unwrap();
        let config = config(&format!(
            "{{ server_url: 'http://localhost/', access_token: '{TOKEN}' }}"
        ));
        let ctx = Ctx {
            client: Client::new(config.server_url.clone(), access_token(&config).unwrap())
                .unwrap(),
            options: config.transfer_options().unwrap(),
            passphrase_file: Some(path.clone()),
            config,
        };
        assert_eq!(
            ctx.passphrase(true).unwrap().as_unmasked_str(),
            "correct horse"
        );

        fs_err::write(&path, "").unwrap();
        ctx.passphrase(false).unwrap_err();
    }

    #[test]
    fn confirmation_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES\r\n"));
        assert!(!is_yes("\n"));
        assert!(!is_yes("n\n"));
        assert!(!is_yes("yep\n"));
        assert!(!is_yes(""));
    }
}
