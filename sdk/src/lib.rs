//! Chunked passphrase encryption of files and their transfer to a blob store.
//!
//! Upload: the file is split into fixed-size chunks, every chunk is encrypted on its
//! own and sent to the store by a [`TransferScheduler`] in bounded batches.
//! Download reverses the flow and reassembles the decrypted chunks by their numbers.

pub mod chunker;
pub mod client;
pub mod crypto;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod reassembler;
pub mod retry;
pub mod scheduler;
pub mod store;

pub use crate::{
    chunker::{Chunk, SourceFile},
    client::Client,
    crypto::{ChunkCipher, EncryptedChunk, Passphrase},
    error::{Error, Result},
    pipeline::{
        DownloadJob, TransferOptions, UploadJob, UploadReport, download_file, list_files,
        remove_file, upload_file,
    },
    progress::ProgressTracker,
    retry::{Backoff, RetryPolicy},
    scheduler::{TransferScheduler, TransferUnit},
    store::{BlobStore, MemoryStore},
};
