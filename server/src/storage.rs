use {
    anyhow::{Context as _, Result, bail},
    chrono::Utc,
    chunkcrypt_protocol::{
        ChunkDescriptor, ContainerId, ContainerInfo, DateTimeUtc, ObjectId, UploadHandle,
    },
    fs_err::{File, create_dir_all, remove_file, rename},
    parking_lot::Mutex,
    serde::{Deserialize, Serialize},
    std::{
        collections::HashMap,
        io::{self, Write},
        path::PathBuf,
        time::{Duration, Instant},
    },
    tempfile::NamedTempFile,
    tracing::{debug, warn},
};

const INDEX_FILE: &str = "index.json";
/// Upload handles that were not used within this time are forgotten.
pub const PENDING_UPLOAD_TTL: Duration = Duration::from_secs(3600);

/// Objects are kept as plain files named by their id. Containers and the object
/// list of each container live in a JSON index that is rewritten atomically.
#[derive(Debug)]
pub struct Storage {
    root: PathBuf,
    objects: PathBuf,
    tmp: PathBuf,
    index: Mutex<Index>,
    pending: Mutex<HashMap<UploadHandle, (Instant, PendingUpload)>>,
    pending_ttl: Duration,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Index {
    containers: Vec<StoredContainer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredContainer {
    id: ContainerId,
    name: String,
    created_at: DateTimeUtc,
    objects: Vec<ChunkDescriptor>,
}

impl Index {
    fn get(&self, id: &ContainerId) -> Option<&StoredContainer> {
        self.containers.iter().find(|c| c.id == *id)
    }
}

#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub container: ContainerId,
    pub name: String,
    pub size: u64,
    pub chunk_number: Option<u64>,
}

impl Storage {
    pub fn new(root: PathBuf) -> Result<Self> {
        if !root.try_exists()? {
            bail!("storage root doesn't exist: {}", root.display());
        }
        let objects = root.join("objects");
        let tmp = root.join("tmp");
        create_dir_all(&objects)?;
        create_dir_all(&tmp)?;

        let index_path = root.join(INDEX_FILE);
        let index = if index_path.try_exists()? {
            serde_json::from_reader(File::open(&index_path)?)
                .with_context(|| format!("failed to parse {}", index_path.display()))?
        } else {
            Index::default()
        };
        Ok(Self {
            root,
            objects,
            tmp,
            index: Mutex::new(index),
            pending: Mutex::default(),
            pending_ttl: PENDING_UPLOAD_TTL,
        })
    }

    #[must_use]
    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    fn save_index(&self, index: &Index) -> Result<()> {
        let mut file = NamedTempFile::new_in(&self.tmp)?;
        serde_json::to_writer_pretty(&mut file, index)?;
        file.flush()?;
        file.persist(self.root.join(INDEX_FILE))?;
        Ok(())
    }

    fn object_path(&self, id: &ObjectId) -> Result<PathBuf> {
        if !id.is_well_formed() {
            bail!("invalid object id: {id:?}");
        }
        Ok(self.objects.join(id.as_str()))
    }

    pub fn list_containers(&self) -> Vec<ContainerInfo> {
        let index = self.index.lock();
        let mut list: Vec<_> = index
            .containers
            .iter()
            .map(|c| ContainerInfo {
                id: c.id.clone(),
                name: c.name.clone(),
                created_at: c.created_at,
                object_count: c.objects.len() as u64,
                total_size: c.objects.iter().map(|o| o.size).sum(),
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    pub fn find_container(&self, name: &str) -> Option<ContainerId> {
        self.index
            .lock()
            .containers
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id.clone())
    }

    /// Returns `None` if the name is taken.
    pub fn create_container(&self, name: &str) -> Result<Option<ContainerId>> {
        let mut index = self.index.lock();
        if index.containers.iter().any(|c| c.name == name) {
            return Ok(None);
        }
        let id = ContainerId::generate();
        index.containers.push(StoredContainer {
            id: id.clone(),
            name: name.into(),
            created_at: Utc::now(),
            objects: Vec::new(),
        });
        if let Err(err) = self.save_index(&index) {
            index.containers.pop();
            return Err(err);
        }
        debug!(%id, name, "created container");
        Ok(Some(id))
    }

    pub fn list_children(&self, id: &ContainerId) -> Result<Vec<ChunkDescriptor>> {
        Ok(self
            .index
            .lock()
            .get(id)
            .with_context(|| format!("container not found: {id}"))?
            .objects
            .clone())
    }

    pub fn start_upload(&self, upload: PendingUpload) -> Result<UploadHandle> {
        if self.index.lock().get(&upload.container).is_none() {
            bail!("container not found: {}", upload.container);
        }
        let handle = UploadHandle::generate();
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|_, (created, _)| created.elapsed() < self.pending_ttl);
        if pending.len() < before {
            debug!(expired = before - pending.len(), "dropped unused upload handles");
        }
        pending.insert(handle.clone(), (Instant::now(), upload));
        Ok(handle)
    }

    /// Removes the pending upload. A handle can be used only once, and only
    /// before it expires.
    pub fn take_pending(&self, handle: &UploadHandle) -> Option<PendingUpload> {
        let (created, upload) = self.pending.lock().remove(handle)?;
        (created.elapsed() < self.pending_ttl).then_some(upload)
    }

    pub fn create_file(&self) -> Result<NamedTempFile> {
        Ok(NamedTempFile::new_in(&self.tmp)?)
    }

    pub fn commit_object(&self, mut file: NamedTempFile, upload: PendingUpload) -> Result<ObjectId> {
        file.flush()?;
        let id = ObjectId::generate();
        let path = self.object_path(&id)?;
        let (_, old_path) = file.keep()?;
        if let Err(err) = rename(&old_path, &path) {
            let _ = remove_file(&old_path);
            return Err(err.into());
        }

        let mut index = self.index.lock();
        let Some(container) = index.containers.iter_mut().find(|c| c.id == upload.container)
        else {
            let _ = remove_file(&path);
            bail!("container was deleted during upload: {}", upload.container);
        };
        container.objects.push(ChunkDescriptor {
            remote_id: id.clone(),
            name: upload.name,
            size: upload.size,
            chunk_number: upload.chunk_number,
        });
        self.save_index(&index)?;
        Ok(id)
    }

    pub fn open_object(&self, id: &ObjectId) -> Result<File> {
        Ok(File::open(self.object_path(id)?)?)
    }

    pub fn delete_container(&self, id: &ContainerId) -> Result<()> {
        let removed = {
            let mut index = self.index.lock();
            let position = index
                .containers
                .iter()
                .position(|c| c.id == *id)
                .with_context(|| format!("container not found: {id}"))?;
            let removed = index.containers.remove(position);
            self.save_index(&index)?;
            removed
        };
        self.pending
            .lock()
            .retain(|_, (_, upload)| upload.container != *id);
        for object in removed.objects {
            let path = self.object_path(&object.remote_id)?;
            if let Err(err) = remove_file(&path) {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!(?err, "failed to remove object file");
                }
            }
        }
        debug!(%id, name = %removed.name, "deleted container");
        Ok(())
    }
}
