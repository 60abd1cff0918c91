use {
    crate::{
        Ctx,
        info::{pretty_size, transfer_status},
        term::set_status_updater,
    },
    anyhow::{Result, bail, ensure},
    chunkcrypt_protocol::util::maybe_block_in_place,
    chunkcrypt_sdk::DownloadJob,
    std::{
        ffi::OsStr,
        io::Write,
        path::{Path, PathBuf},
    },
    tempfile::NamedTempFile,
    tracing::info,
};

/// Resolves the local file to write. A directory target receives a file named after the stored one.
fn target_path(name: &str, path: &Path) -> Result<PathBuf> {
    let target = if path.is_dir() {
        ensure!(
            Path::new(name).file_name() == Some(OsStr::new(name)),
            "{name:?} cannot be used as a local file name, specify the full target path"
        );
        path.join(name)
    } else {
        path.to_path_buf()
    };
    if target.try_exists()? {
        bail!("{} already exists", target.display());
    }
    Ok(target)
}

/// Writes the whole file next to `target` first, so a failure never leaves a partial file.
fn write_new_file(target: &Path, data: &[u8]) -> Result<()> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist_noclobber(target)?;
    Ok(())
}

pub async fn download(ctx: &Ctx, name: &str, path: &Path) -> Result<()> {
    let target = target_path(name, path)?;
    let passphrase = ctx.passphrase(false)?;

    let job = DownloadJob::prepare(&ctx.client, name, &passphrase, &ctx.options).await?;
    drop(passphrase);
    let progress = job.progress();
    let data = {
        let _status = set_status_updater(move || {
            transfer_status("Downloading", progress.completed(), progress.total())
        });
        job.run().await?
    };
    maybe_block_in_place(|| write_new_file(&target, &data))?;
    info!(
        "Downloaded {name} to {}: {}",
        target.display(),
        pretty_size(data.len() as u64),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use {super::*, tempfile::TempDir};

    #[test]
    fn resolves_targets() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            target_path("report.pdf", dir.path()).unwrap(),
            dir.path().join("report.pdf")
        );
        assert_eq!(
            target_path("report.pdf", &dir.path().join("copy.pdf")).unwrap(),
            dir.path().join("copy.pdf")
        );
        target_path("..", dir.path()).unwrap_err();

        fs_err::write(dir.path().join("report.pdf"), "old").unwrap();
        target_path("report.pdf", dir.path()).unwrap_err();
    }

    #[test]
    fn never_overwrites() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.bin");
        write_new_file(&target, b"payload").unwrap();
        assert_eq!(fs_err::read(&target).unwrap(), b"payload");

        write_new_file(&target, b"other").unwrap_err();
        assert_eq!(fs_err::read(&target).unwrap(), b"payload");
        assert_eq!(fs_err::read_dir(dir.path()).unwrap().count(), 1);
    }
}
