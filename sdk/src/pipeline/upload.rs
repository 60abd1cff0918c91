use {
    super::{TransferOptions, validate_name},
    crate::{
        chunker::{Chunk, SourceFile, split},
        crypto::{ChunkCipher, OVERHEAD, Passphrase},
        error::{Error, Result},
        progress::ProgressTracker,
        scheduler::TransferUnit,
        store::BlobStore,
    },
    bytes::Bytes,
    chunkcrypt_protocol::{ChunkDescriptor, ContainerId, chunk_name, util::maybe_block_in_place},
    tokio::sync::OnceCell,
    tracing::{info, instrument, warn},
};

/// Outcome of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub container: ContainerId,
    /// Descriptors in chunk order.
    pub chunks: Vec<ChunkDescriptor>,
    pub original_size: u64,
    pub stored_size: u64,
}

/// A file split into chunks, ready to be encrypted and sent.
#[derive(Debug)]
pub struct UploadJob {
    name: String,
    original_size: u64,
    chunks: Vec<Chunk>,
    cipher: ChunkCipher,
    options: TransferOptions,
    progress: ProgressTracker,
}

impl UploadJob {
    #[inline]
    pub fn prepare(
        file: SourceFile,
        passphrase: &Passphrase,
        options: &TransferOptions,
    ) -> Result<Self> {
        validate_name(&file.name)?;
        let chunks = split(&file.bytes, options.chunk_size)?;
        Ok(Self {
            progress: ProgressTracker::new(chunks.len() as u64),
            original_size: file.bytes.len() as u64,
            name: file.name,
            chunks,
            cipher: ChunkCipher::new(passphrase.clone()),
            options: *options,
        })
    }

    #[must_use]
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Tracks uploaded chunks.
    #[must_use]
    #[inline]
    pub fn progress(&self) -> ProgressTracker {
        self.progress.clone()
    }

    /// Creates the container and uploads every chunk into it.
    ///
    /// Chunks uploaded before a failure are left in the store.
    #[instrument(skip_all, fields(name = %self.name, chunks = self.chunks.len()))]
    #[inline]
    pub async fn run<S: BlobStore>(self, store: &S) -> Result<UploadReport> {
        let retry = self.options.retry();
        if retry.run(|_| store.container_exists(&self.name)).await? {
            return Err(Error::DuplicateContainer(self.name));
        }
        // Not retried: a lost response would turn the retry into a duplicate.
        let container = store.create_container(&self.name).await?;

        let units: Vec<_> = self
            .chunks
            .into_iter()
            .map(|chunk| UploadUnit {
                store,
                cipher: &self.cipher,
                container: &container,
                chunk,
                sealed: OnceCell::new(),
            })
            .collect();
        let chunks = match self.options.scheduler.run(&units, &self.progress).await {
            Ok(chunks) => chunks,
            Err(err) => {
                warn!(
                    name = %self.name,
                    %container,
                    uploaded = self.progress.completed(),
                    "upload failed, uploaded chunks are left in the store",
                );
                return Err(err);
            }
        };
        drop(units);
        let stored_size = chunks.iter().map(|c| c.size).sum();
        info!(name = %self.name, stored_size, "uploaded file");
        Ok(UploadReport {
            container,
            chunks,
            original_size: self.original_size,
            stored_size,
        })
    }
}

/// Encrypts and uploads `file` as a new container named after it.
#[inline]
pub async fn upload_file<S: BlobStore>(
    store: &S,
    file: SourceFile,
    passphrase: &Passphrase,
    options: &TransferOptions,
) -> Result<UploadReport> {
    UploadJob::prepare(file, passphrase, options)?.run(store).await
}

struct UploadUnit<'a, S> {
    store: &'a S,
    cipher: &'a ChunkCipher,
    container: &'a ContainerId,
    chunk: Chunk,
    /// Encrypted once, reused by retries.
    sealed: OnceCell<Bytes>,
}

impl<S: BlobStore> TransferUnit for UploadUnit<'_, S> {
    type Output = ChunkDescriptor;

    async fn attempt(&self) -> Result<ChunkDescriptor> {
        let sealed = self
            .sealed
            .get_or_try_init(|| async {
                maybe_block_in_place(|| self.cipher.encrypt_chunk(&self.chunk))
                    .map(|encrypted| Bytes::from(encrypted.to_bytes()))
            })
            .await?;
        let number = self.chunk.index as u64 + 1;
        let name = chunk_name(number);
        let size = sealed.len() as u64;
        debug_assert_eq!(size, self.chunk.bytes.len() as u64 + OVERHEAD as u64);
        let handle = self
            .store
            .upload_object(self.container, &name, size, number)
            .await?;
        let remote_id = self.store.write_bytes(&handle, sealed.clone()).await?;
        Ok(ChunkDescriptor {
            remote_id,
            name,
            size,
            chunk_number: Some(number),
        })
    }
}
