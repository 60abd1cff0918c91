use {
    anyhow::{Result, anyhow},
    clap::{Parser, Subcommand},
    std::path::PathBuf,
};

#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct Cli {
    /// Defaults to `chunkcrypt.json5` in the user config directory.
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Read the passphrase from the first line of this file instead of prompting for it.
    #[clap(long, global = true)]
    pub passphrase_file: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Encrypt a local file and store it.
    Upload {
        path: PathBuf,
        /// Name of the stored file. Defaults to the local file name.
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Fetch a stored file and decrypt it to a local path.
    Download {
        name: String,
        /// Target file, or an existing directory to save the file in.
        path: PathBuf,
    },
    /// List stored files.
    Ls,
    /// Delete a stored file.
    Remove {
        name: String,
        /// Don't ask for confirmation.
        #[arg(short, long)]
        yes: bool,
    },
}

#[inline]
pub fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().ok_or_else(|| anyhow!("failed to get config dir"))?;
    Ok(dir.join("chunkcrypt.json5"))
}

#[inline]
pub fn default_log_path() -> Result<PathBuf> {
    let dir = dirs::data_dir().ok_or_else(|| anyhow!("failed to get data dir"))?;
    Ok(dir.join("chunkcrypt.log"))
}
