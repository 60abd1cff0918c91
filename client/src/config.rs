use {
    anyhow::{Context as _, Result, ensure},
    byte_unit::Byte,
    chunkcrypt_protocol::AccessToken,
    chunkcrypt_sdk::{
        RetryPolicy, TransferOptions, TransferScheduler,
        chunker::DEFAULT_CHUNK_SIZE,
        retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY},
        scheduler::DEFAULT_CONCURRENCY,
    },
    derivative::Derivative,
    serde::{Deserialize, Serialize},
    std::{
        path::{Path, PathBuf},
        time::Duration,
    },
    url::Url,
};

#[derive(Derivative, Clone, Serialize, Deserialize)]
#[derivative(Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub server_url: Url,
    #[derivative(Debug = "ignore")]
    #[serde(default)]
    pub access_token: Option<AccessToken>,
    /// Keep the access token in the system keyring instead of the config.
    #[serde(default)]
    pub use_keyring: bool,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: Byte,
    /// Chunks transferred at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Attempts per chunk, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// The delay before attempt `n + 1` is `n` times this value.
    #[serde(with = "humantime_serde", default = "default_retry_base_delay")]
    pub retry_base_delay: Duration,

    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_chunk_size() -> Byte {
    Byte::from_u64(DEFAULT_CHUNK_SIZE as u64)
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_retry_base_delay() -> Duration {
    DEFAULT_RETRY_BASE_DELAY
}

fn default_log_filter() -> String {
    "info".into()
}

impl Config {
    #[inline]
    pub fn parse(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        json5::from_str(&fs_err::read_to_string(path)?)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    #[inline]
    pub fn transfer_options(&self) -> Result<TransferOptions> {
        let chunk_size = usize::try_from(self.chunk_size.as_u64())
            .context("`chunk_size` is too large for this platform")?;
        ensure!(chunk_size > 0, "`chunk_size` must be positive");
        ensure!(self.concurrency > 0, "`concurrency` must be positive");
        ensure!(self.max_attempts > 0, "`max_attempts` must be positive");
        Ok(TransferOptions {
            chunk_size,
            scheduler: TransferScheduler::new(
                self.concurrency,
                RetryPolicy::linear(self.max_attempts, self.retry_base_delay),
            ),
        })
    }
}
