use {
    crate::{
        Ctx,
        info::{pretty_size, transfer_status},
        term::set_status_updater,
    },
    anyhow::{Result, anyhow},
    chunkcrypt_protocol::util::maybe_block_in_place,
    chunkcrypt_sdk::{SourceFile, UploadJob},
    std::path::Path,
    tracing::info,
};

fn default_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            anyhow!(
                "cannot use the file name of {} as a stored name, specify it with --name",
                path.display()
            )
        })
}

pub async fn upload(ctx: &Ctx, path: &Path, name: Option<String>) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => default_name(path)?,
    };
    let bytes = maybe_block_in_place(|| fs_err::read(path))?;
    let passphrase = ctx.passphrase(true)?;

    let job = UploadJob::prepare(SourceFile::new(name.clone(), bytes), &passphrase, &ctx.options)?;
    drop(passphrase);
    let progress = job.progress();
    let report = {
        let _status = set_status_updater(move || {
            transfer_status("Uploading", progress.completed(), progress.total())
        });
        job.run(&ctx.client).await?
    };
    info!(
        "Uploaded {name}: {} in {} chunks, {} stored",
        pretty_size(report.original_size),
        report.chunks.len(),
        pretty_size(report.stored_size),
    );
    Ok(())
}
