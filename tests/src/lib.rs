//! Runs a real `chunkcrypt_server` on a free local port for end-to-end tests.

use {
    anyhow::{Context as _, Result, bail},
    byte_unit::Byte,
    chunkcrypt::config::Config as ClientConfig,
    chunkcrypt_protocol::AccessToken,
    chunkcrypt_sdk::Client,
    fs_err::create_dir_all,
    portpicker::pick_unused_port,
    std::{
        net::{Ipv4Addr, SocketAddr},
        path::PathBuf,
        time::Duration,
    },
    tempfile::TempDir,
    tokio::{net::TcpStream, time::sleep},
    tracing::error,
    url::Url,
};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestServer {
    pub url: Url,
    pub token: AccessToken,
    pub storage_path: PathBuf,
    pub dir: TempDir,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        let dir = TempDir::new()?;
        let storage_path = dir.path().join("storage");
        create_dir_all(&storage_path)?;
        let port = pick_unused_port().context("failed to pick port")?;
        let token = AccessToken::generate()?;
        let config = chunkcrypt_server::Config {
            bind_addr: SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port),
            storage_path: storage_path.clone(),
            access_tokens: vec![token.clone()],
            log_file: None,
            log_filter: "info".into(),
        };
        tokio::spawn(async move {
            if let Err(err) = chunkcrypt_server::run(config).await {
                error!("server failed: {err:?}");
            }
        });
        wait_for_port(port).await?;
        Ok(Self {
            url: format!("http://127.0.0.1:{port}/").parse()?,
            token,
            storage_path,
            dir,
        })
    }

    pub fn client(&self) -> Result<Client> {
        Client::new(self.url.clone(), self.token.clone())
    }

    /// Config for the command-line client with small chunks and fast retries.
    pub fn client_config(&self, chunk_size: u64) -> ClientConfig {
        ClientConfig {
            server_url: self.url.clone(),
            access_token: Some(self.token.clone()),
            use_keyring: false,
            chunk_size: Byte::from_u64(chunk_size),
            concurrency: 5,
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(50),
            log_file: None,
            log_filter: "info".into(),
        }
    }

    /// Writes `passphrase` to a file for `--passphrase-file`.
    pub fn passphrase_file(&self, passphrase: &str) -> Result<PathBuf> {
        let path = self.dir.path().join("passphrase");
        fs_err::write(&path, format!("{passphrase}\n"))?;
        Ok(path)
    }
}

async fn wait_for_port(port: u16) -> Result<()> {
    let started = tokio::time::Instant::now();
    loop {
        if TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await.is_ok() {
            return Ok(());
        }
        if started.elapsed() > STARTUP_TIMEOUT {
            bail!("server didn't start listening on port {port}");
        }
        sleep(Duration::from_millis(20)).await;
    }
}

/// Random bytes of random length up to `max_len`.
pub fn random_content(max_len: usize) -> Vec<u8> {
    let len = rand::random_range(0..=max_len);
    let mut data = vec![0_u8; len];
    rand::fill(&mut data[..]);
    data
}
