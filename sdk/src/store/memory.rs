use {
    super::BlobStore,
    crate::error::{Error, Result},
    anyhow::anyhow,
    bytes::Bytes,
    chrono::Utc,
    chunkcrypt_protocol::{
        ChunkDescriptor, ContainerId, ContainerInfo, DateTimeUtc, ObjectId, UploadHandle,
    },
    parking_lot::Mutex,
    rand::seq::SliceRandom,
    std::{
        collections::{BTreeMap, HashMap},
        hash::Hash,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    },
    tokio::time::sleep,
    tracing::debug,
};

/// In-process store.
///
/// Besides serving as a store for local runs, it can inject transient transfer
/// failures and delay transfers. It also records how many transfers ran at the same time.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    /// Remaining injected write failures per chunk number.
    write_failures: Mutex<HashMap<u64, u32>>,
    /// Remaining writes per chunk number that are stored but reported as failed.
    lost_write_responses: Mutex<HashMap<u64, u32>>,
    /// Remaining injected read failures per object.
    read_failures: Mutex<HashMap<ObjectId, u32>>,
    latency: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    write_attempts: AtomicUsize,
    read_attempts: AtomicUsize,
}

#[derive(Debug, Default)]
struct State {
    containers: BTreeMap<ContainerId, Container>,
    pending: HashMap<UploadHandle, PendingUpload>,
    objects: HashMap<ObjectId, Bytes>,
}

#[derive(Debug)]
struct Container {
    name: String,
    created_at: DateTimeUtc,
    children: Vec<ChunkDescriptor>,
}

#[derive(Debug)]
struct PendingUpload {
    container: ContainerId,
    name: String,
    size: u64,
    chunk_number: u64,
}

impl MemoryStore {
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every object transfer by `latency`.
    #[inline]
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Makes the next `times` writes of chunk `chunk_number` fail with a network error.
    #[inline]
    pub fn fail_writes(&self, chunk_number: u64, times: u32) {
        self.write_failures.lock().insert(chunk_number, times);
    }

    /// Makes the next `times` writes of chunk `chunk_number` store the object
    /// and then fail with a network error, as if the response was lost.
    #[inline]
    pub fn lose_write_responses(&self, chunk_number: u64, times: u32) {
        self.lost_write_responses.lock().insert(chunk_number, times);
    }

    /// Makes the next `times` reads of `object` fail with a network error.
    #[inline]
    pub fn fail_reads(&self, object: &ObjectId, times: u32) {
        self.read_failures.lock().insert(object.clone(), times);
    }

    /// Largest number of object transfers observed in progress at once.
    #[must_use]
    #[inline]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    #[must_use]
    #[inline]
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    #[must_use]
    #[inline]
    pub fn read_attempts(&self) -> usize {
        self.read_attempts.load(Ordering::SeqCst)
    }

    #[must_use]
    #[inline]
    pub fn object_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Flips one bit of the stored object.
    #[inline]
    pub fn corrupt(&self, object: &ObjectId, position: usize) -> Result<()> {
        let mut state = self.state.lock();
        let bytes = state.objects.get_mut(object).ok_or_else(|| unknown_object(object))?;
        let mut data = bytes.to_vec();
        let byte = data
            .get_mut(position)
            .ok_or_else(|| Error::Validation(format!("position {position} is out of range")))?;
        *byte ^= 0x01;
        *bytes = data.into();
        Ok(())
    }

    /// Removes an object without touching the container listing.
    #[inline]
    pub fn drop_object(&self, object: &ObjectId) {
        self.state.lock().objects.remove(object);
    }

    async fn transfer<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            sleep(latency).await;
        }
        let result = f();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn take_failure<K: Eq + Hash>(failures: &Mutex<HashMap<K, u32>>, key: &K) -> bool {
    let mut failures = failures.lock();
    match failures.get_mut(key) {
        Some(remaining) if *remaining > 0 => {
            *remaining -= 1;
            true
        }
        _ => false,
    }
}

fn unknown_container(id: &ContainerId) -> Error {
    Error::store(anyhow!("unknown container {id}"))
}

fn unknown_object(id: &ObjectId) -> Error {
    Error::store(anyhow!("unknown object {id}"))
}

impl BlobStore for MemoryStore {
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        let state = self.state.lock();
        let mut list: Vec<_> = state
            .containers
            .iter()
            .map(|(id, container)| ContainerInfo {
                id: id.clone(),
                name: container.name.clone(),
                created_at: container.created_at,
                object_count: container.children.len() as u64,
                total_size: container.children.iter().map(|c| c.size).sum(),
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }

    async fn find_container(&self, name: &str) -> Result<Option<ContainerId>> {
        Ok(self
            .state
            .lock()
            .containers
            .iter()
            .find(|(_, container)| container.name == name)
            .map(|(id, _)| id.clone()))
    }

    async fn create_container(&self, name: &str) -> Result<ContainerId> {
        let mut state = self.state.lock();
        if state.containers.values().any(|c| c.name == name) {
            return Err(Error::DuplicateContainer(name.into()));
        }
        let id = ContainerId::generate();
        state.containers.insert(
            id.clone(),
            Container {
                name: name.into(),
                created_at: Utc::now(),
                children: Vec::new(),
            },
        );
        debug!(%id, name, "created container");
        Ok(id)
    }

    async fn list_children(&self, container: &ContainerId) -> Result<Vec<ChunkDescriptor>> {
        let mut children = self
            .state
            .lock()
            .containers
            .get(container)
            .ok_or_else(|| unknown_container(container))?
            .children
            .clone();
        children.shuffle(&mut rand::rng());
        Ok(children)
    }

    async fn upload_object(
        &self,
        container: &ContainerId,
        name: &str,
        size: u64,
        chunk_number: u64,
    ) -> Result<UploadHandle> {
        let mut state = self.state.lock();
        if !state.containers.contains_key(container) {
            return Err(unknown_container(container));
        }
        let handle = UploadHandle::generate();
        state.pending.insert(
            handle.clone(),
            PendingUpload {
                container: container.clone(),
                name: name.into(),
                size,
                chunk_number,
            },
        );
        Ok(handle)
    }

    async fn write_bytes(&self, handle: &UploadHandle, bytes: Bytes) -> Result<ObjectId> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        self.transfer(|| {
            let mut state = self.state.lock();
            let chunk_number = state
                .pending
                .get(handle)
                .ok_or_else(|| Error::store(anyhow!("unknown upload handle {handle}")))?
                .chunk_number;
            if take_failure(&self.write_failures, &chunk_number) {
                return Err(Error::network(anyhow!(
                    "injected failure writing chunk {chunk_number}"
                )));
            }
            let pending = state
                .pending
                .remove(handle)
                .ok_or_else(|| Error::store(anyhow!("unknown upload handle {handle}")))?;
            if bytes.len() as u64 != pending.size {
                return Err(Error::store(anyhow!(
                    "size mismatch; announced {}, received {}",
                    pending.size,
                    bytes.len(),
                )));
            }
            let id = ObjectId::generate();
            let container = state
                .containers
                .get_mut(&pending.container)
                .ok_or_else(|| unknown_container(&pending.container))?;
            container.children.push(ChunkDescriptor {
                remote_id: id.clone(),
                name: pending.name,
                size: pending.size,
                chunk_number: Some(pending.chunk_number),
            });
            state.objects.insert(id.clone(), bytes);
            if take_failure(&self.lost_write_responses, &chunk_number) {
                return Err(Error::network(anyhow!(
                    "injected lost response after storing chunk {chunk_number}"
                )));
            }
            Ok(id)
        })
        .await
    }

    async fn download_object(&self, object: &ObjectId) -> Result<Bytes> {
        self.read_attempts.fetch_add(1, Ordering::SeqCst);
        self.transfer(|| {
            if take_failure(&self.read_failures, object) {
                return Err(Error::network(anyhow!("injected failure reading {object}")));
            }
            self.state
                .lock()
                .objects
                .get(object)
                .cloned()
                .ok_or_else(|| unknown_object(object))
        })
        .await
    }

    async fn delete_container(&self, container: &ContainerId) -> Result<()> {
        let mut state = self.state.lock();
        let removed = state
            .containers
            .remove(container)
            .ok_or_else(|| unknown_container(container))?;
        for child in removed.children {
            state.objects.remove(&child.remote_id);
        }
        state.pending.retain(|_, pending| pending.container != *container);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn objects_lifecycle() {
        let store = MemoryStore::new();
        let container = store.create_container("a.txt").await.unwrap();
        assert!(store.container_exists("a.txt").await.unwrap());
        assert!(matches!(
            store.create_container("a.txt").await,
            Err(Error::DuplicateContainer(_))
        ));

        let handle = store
            .upload_object(&container, "chunk1.enc", 3, 1)
            .await
            .unwrap();
        let object = store
            .write_bytes(&handle, Bytes::from_static(b"abc"))
            .await
            .unwrap();
        // Handles are single-use.
        assert!(matches!(
            store.write_bytes(&handle, Bytes::from_static(b"abc")).await,
            Err(Error::Store(_))
        ));
        assert_eq!(&store.download_object(&object).await.unwrap()[..], b"abc");

        let children = store.list_children(&container).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].chunk_number, Some(1));
        let info = store.list_containers().await.unwrap();
        assert_eq!(info[0].object_count, 1);
        assert_eq!(info[0].total_size, 3);

        store.delete_container(&container).await.unwrap();
        assert!(!store.container_exists("a.txt").await.unwrap());
        assert_eq!(store.object_count(), 0);
    }

    #[tokio::test]
    async fn rejects_wrong_size() {
        let store = MemoryStore::new();
        let container = store.create_container("a").await.unwrap();
        let handle = store
            .upload_object(&container, "chunk1.enc", 4, 1)
            .await
            .unwrap();
        assert!(matches!(
            store.write_bytes(&handle, Bytes::from_static(b"abc")).await,
            Err(Error::Store(_))
        ));
    }

    #[tokio::test]
    async fn injected_failures_keep_the_handle() {
        let store = MemoryStore::new();
        store.fail_writes(1, 1);
        let container = store.create_container("a").await.unwrap();
        let handle = store
            .upload_object(&container, "chunk1.enc", 1, 1)
            .await
            .unwrap();
        let err = store
            .write_bytes(&handle, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        store
            .write_bytes(&handle, Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert_eq!(store.write_attempts(), 2);
    }

    #[tokio::test]
    async fn lost_responses_and_failed_reads() {
        let store = MemoryStore::new();
        store.lose_write_responses(1, 1);
        let container = store.create_container("a").await.unwrap();
        let handle = store
            .upload_object(&container, "chunk1.enc", 1, 1)
            .await
            .unwrap();
        let err = store
            .write_bytes(&handle, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.object_count(), 1);
        let children = store.list_children(&container).await.unwrap();
        let object = &children[0].remote_id;

        store.fail_reads(object, 1);
        assert!(store.download_object(object).await.unwrap_err().is_transient());
        assert_eq!(&store.download_object(object).await.unwrap()[..], b"x");
        assert_eq!(store.read_attempts(), 2);
    }
}
