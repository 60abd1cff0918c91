use {
    anyhow::{Result, bail, ensure},
    chunkcrypt::{
        cli::{Cli, Command},
        term::clear_status,
    },
    chunkcrypt_protocol::util::log_writer,
    chunkcrypt_sdk::{TransferOptions, list_files},
    chunkcrypt_tests::{TestServer, random_content},
    clap::Parser,
    rand::seq::IteratorRandom,
    std::{collections::BTreeMap, path::PathBuf, sync::Mutex},
    tracing::{error, info},
    tracing_subscriber::EnvFilter,
};

/// Randomly uploads, downloads and removes files through the command-line
/// client and checks the results against a local model.
#[derive(Debug, Parser)]
struct Args {
    #[arg(long, default_value_t = 100)]
    iterations: u32,
    #[arg(long, default_value_t = 64 * 1024)]
    chunk_size: u64,
    /// Defaults to stdout.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let result = try_main().await;
    clear_status();
    if let Err(err) = result {
        error!("{err:?}");
        std::process::exit(1);
    }
}

async fn try_main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(log_writer(args.log_file.as_deref())?))
        .with_env_filter(EnvFilter::try_new("info,chunkcrypt_server=debug")?)
        .init();

    let server = TestServer::start().await?;
    info!("dir: {}", server.dir.path().display());
    let passphrase_file = server.passphrase_file("stress passphrase")?;
    let local_dir = server.dir.path().join("local");
    fs_err::create_dir_all(&local_dir)?;
    let max_len = usize::try_from(args.chunk_size * 3)?;

    let run = |command| {
        chunkcrypt::run(
            Cli {
                config: None,
                passphrase_file: Some(passphrase_file.clone()),
                command,
            },
            server.client_config(args.chunk_size),
        )
    };

    let mut expected = BTreeMap::<String, Vec<u8>>::new();
    for iteration in 0..args.iterations {
        let existing = expected.keys().choose(&mut rand::rng()).cloned();
        match (rand::random_range(0..4), existing) {
            (0, _) | (_, None) => {
                let name = format!("file{iteration}");
                let path = local_dir.join(&name);
                let data = random_content(max_len);
                fs_err::write(&path, &data)?;
                info!("uploading {name} ({} bytes)", data.len());
                run(Command::Upload { path, name: None }).await?;
                expected.insert(name, data);
            }
            (1, Some(name)) => {
                info!("uploading {name} again");
                let path = local_dir.join(&name);
                if run(Command::Upload { path, name: None }).await.is_ok() {
                    bail!("duplicate upload of {name} succeeded");
                }
            }
            (2, Some(name)) => {
                let target = local_dir.join(format!("{name}.downloaded"));
                info!("downloading {name}");
                run(Command::Download {
                    name: name.clone(),
                    path: target.clone(),
                })
                .await?;
                ensure!(
                    fs_err::read(&target)? == expected[&name],
                    "content mismatch for {name}"
                );
                fs_err::remove_file(&target)?;
            }
            (_, Some(name)) => {
                info!("removing {name}");
                run(Command::Remove {
                    name: name.clone(),
                    yes: true,
                })
                .await?;
                expected.remove(&name);
            }
        }

        let stored: Vec<String> = list_files(&server.client()?, &TransferOptions::default())
            .await?
            .into_iter()
            .map(|file| file.name)
            .collect();
        let expected_names: Vec<String> = expected.keys().cloned().collect();
        ensure!(
            stored == expected_names,
            "stored files differ after iteration {iteration}: {stored:?} != {expected_names:?}"
        );
    }
    info!("{} iterations passed", args.iterations);
    Ok(())
}
