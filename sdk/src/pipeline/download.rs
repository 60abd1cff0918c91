use {
    super::{TransferOptions, find_existing},
    crate::{
        crypto::{ChunkCipher, OVERHEAD, Passphrase},
        error::{Error, Result},
        progress::ProgressTracker,
        reassembler::Reassembler,
        scheduler::TransferUnit,
        store::BlobStore,
    },
    chunkcrypt_protocol::{ChunkDescriptor, order_chunks, util::maybe_block_in_place},
    tracing::{info, instrument},
};

/// A stored file whose chunk list has been fetched and validated.
#[derive(Debug)]
pub struct DownloadJob<'a, S> {
    store: &'a S,
    name: String,
    /// Ordered by chunk number, starting from 1 without gaps.
    chunks: Vec<ChunkDescriptor>,
    cipher: ChunkCipher,
    options: TransferOptions,
    progress: ProgressTracker,
}

impl<'a, S: BlobStore> DownloadJob<'a, S> {
    #[inline]
    pub async fn prepare(
        store: &'a S,
        name: &str,
        passphrase: &Passphrase,
        options: &TransferOptions,
    ) -> Result<Self> {
        let retry = options.retry();
        let container = find_existing(store, name, &retry).await?;
        let children = retry.run(|_| store.list_children(&container)).await?;
        let chunks = order_chunks(children).map_err(Error::integrity)?;
        Ok(Self {
            store,
            name: name.into(),
            progress: ProgressTracker::new(chunks.len() as u64),
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

    /// Size of the decrypted file.
    #[inline]
    pub fn expected_size(&self) -> Result<u64> {
        self.chunks.iter().try_fold(0_u64, |total, chunk| {
            let plaintext = chunk.size.checked_sub(OVERHEAD as u64).ok_or_else(|| {
                Error::Integrity(format!(
                    "{} is too small to be an encrypted chunk: {} bytes",
                    chunk.name, chunk.size,
                ))
            })?;
            Ok(total + plaintext)
        })
    }

    /// Tracks downloaded and decrypted chunks.
    #[must_use]
    #[inline]
    pub fn progress(&self) -> ProgressTracker {
        self.progress.clone()
    }

    /// Downloads and decrypts every chunk and returns the reassembled file.
    ///
    /// Nothing is returned unless every chunk was decrypted successfully.
    #[instrument(skip_all, fields(name = %self.name, chunks = self.chunks.len()))]
    #[inline]
    pub async fn run(self) -> Result<Vec<u8>> {
        let expected_size = self.expected_size()?;
        let units: Vec<_> = self
            .chunks
            .iter()
            .map(|descriptor| DownloadUnit {
                store: self.store,
                cipher: &self.cipher,
                descriptor,
            })
            .collect();
        let plaintexts = self.options.scheduler.run(&units, &self.progress).await?;

        let mut reassembler = Reassembler::new(plaintexts.len());
        for (index, plaintext) in plaintexts.into_iter().enumerate() {
            reassembler.insert(index, plaintext)?;
        }
        let data = reassembler.finish(Some(expected_size))?;
        info!(name = %self.name, size = data.len(), "downloaded file");
        Ok(data)
    }
}

/// Downloads the file stored as `name` and decrypts it into memory.
#[inline]
pub async fn download_file<S: BlobStore>(
    store: &S,
    name: &str,
    passphrase: &Passphrase,
    options: &TransferOptions,
) -> Result<Vec<u8>> {
    DownloadJob::prepare(store, name, passphrase, options)
        .await?
        .run()
        .await
}

struct DownloadUnit<'a, S> {
    store: &'a S,
    cipher: &'a ChunkCipher,
    descriptor: &'a ChunkDescriptor,
}

impl<S: BlobStore> TransferUnit for DownloadUnit<'_, S> {
    type Output = Vec<u8>;

    async fn attempt(&self) -> Result<Vec<u8>> {
        let bytes = self
            .store
            .download_object(&self.descriptor.remote_id)
            .await?;
        if bytes.len() as u64 != self.descriptor.size {
            return Err(Error::Integrity(format!(
                "{} size mismatch; received {}, listed {}",
                self.descriptor.name,
                bytes.len(),
                self.descriptor.size,
            )));
        }
        maybe_block_in_place(|| self.cipher.decrypt_bytes(&bytes))
    }
}
