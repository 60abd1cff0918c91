//! Remote blob store contract.
//!
//! A logical file is stored as a container holding one object per encrypted chunk.
//! Implementations report transport problems as [`Error::Network`](crate::Error::Network)
//! so that they are retried, and everything else as a final error.

mod memory;

pub use self::memory::MemoryStore;
use {
    crate::error::Result,
    bytes::Bytes,
    chunkcrypt_protocol::{ChunkDescriptor, ContainerId, ContainerInfo, ObjectId, UploadHandle},
    std::future::Future,
};

pub trait BlobStore: Send + Sync {
    fn list_containers(&self) -> impl Future<Output = Result<Vec<ContainerInfo>>> + Send;

    fn find_container(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<ContainerId>>> + Send;

    #[inline]
    fn container_exists(&self, name: &str) -> impl Future<Output = Result<bool>> + Send {
        async move { Ok(self.find_container(name).await?.is_some()) }
    }

    /// Fails with [`Error::DuplicateContainer`](crate::Error::DuplicateContainer)
    /// if the name is taken.
    fn create_container(&self, name: &str) -> impl Future<Output = Result<ContainerId>> + Send;

    /// Returns objects of the container in no particular order.
    fn list_children(
        &self,
        container: &ContainerId,
    ) -> impl Future<Output = Result<Vec<ChunkDescriptor>>> + Send;

    /// Announces an object of exactly `size` bytes.
    fn upload_object(
        &self,
        container: &ContainerId,
        name: &str,
        size: u64,
        chunk_number: u64,
    ) -> impl Future<Output = Result<UploadHandle>> + Send;

    /// Sends the content of an announced object.
    fn write_bytes(
        &self,
        handle: &UploadHandle,
        bytes: Bytes,
    ) -> impl Future<Output = Result<ObjectId>> + Send;

    fn download_object(&self, object: &ObjectId) -> impl Future<Output = Result<Bytes>> + Send;

    /// Deletes the container and all of its objects.
    fn delete_container(&self, container: &ContainerId)
    -> impl Future<Output = Result<()>> + Send;
}
