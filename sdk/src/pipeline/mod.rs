//! Upload and download of whole files through a [`BlobStore`].

mod download;
mod upload;

pub use self::{
    download::{DownloadJob, download_file},
    upload::{UploadJob, UploadReport, upload_file},
};
use {
    crate::{
        chunker::DEFAULT_CHUNK_SIZE,
        error::{Error, Result},
        retry::RetryPolicy,
        scheduler::TransferScheduler,
        store::BlobStore,
    },
    chunkcrypt_protocol::{ContainerId, ContainerInfo, util::check_container_name},
    tracing::info,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    pub chunk_size: usize,
    pub scheduler: TransferScheduler,
}

impl Default for TransferOptions {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            scheduler: TransferScheduler::default(),
        }
    }
}

impl TransferOptions {
    #[must_use]
    #[inline]
    pub fn retry(&self) -> RetryPolicy {
        self.scheduler.retry
    }
}

fn validate_name(name: &str) -> Result<()> {
    check_container_name(name).map_err(|err| Error::Validation(format!("{err:#}")))
}

async fn find_existing<S: BlobStore>(
    store: &S,
    name: &str,
    retry: &RetryPolicy,
) -> Result<ContainerId> {
    validate_name(name)?;
    retry
        .run(|_| store.find_container(name))
        .await?
        .ok_or_else(|| Error::NotFound(name.into()))
}

/// Returns the files in the store, ordered by name.
#[inline]
pub async fn list_files<S: BlobStore>(
    store: &S,
    options: &TransferOptions,
) -> Result<Vec<ContainerInfo>> {
    options.retry().run(|_| store.list_containers()).await
}

/// Deletes the file and all of its chunks.
#[inline]
pub async fn remove_file<S: BlobStore>(
    store: &S,
    name: &str,
    options: &TransferOptions,
) -> Result<()> {
    let retry = options.retry();
    let container = find_existing(store, name, &retry).await?;
    retry.run(|_| store.delete_container(&container)).await?;
    info!(name, "removed file");
    Ok(())
}
