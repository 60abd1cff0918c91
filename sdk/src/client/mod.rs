use {
    crate::{
        error::{Error, Result},
        store::BlobStore,
    },
    anyhow::{Context, format_err},
    bytes::{Bytes, BytesMut},
    chunkcrypt_protocol::{
        AccessToken, ChunkDescriptor, ContainerId, ContainerInfo, ObjectId, UploadHandle,
        encoding::{self, deserialize},
        endpoints::{
            CreateContainer, DeleteContainer, FindContainer, ListChildren, ListContainers,
            RequestToResponse, StartUpload,
        },
    },
    reqwest::{Method, Response, Url, header::CONTENT_LENGTH},
    serde::{Serialize, de::DeserializeOwned},
    std::time::Duration,
    tokio::time::timeout,
    tracing::instrument,
};

/// HTTP client of `chunkcrypt_server`.
///
/// Reuse created client or clone it in order to reuse a connection pool.
/// Every call is a single attempt; retries are up to the caller.
#[derive(Debug, Clone)]
pub struct Client {
    reqwest: reqwest::Client,
    server_url: Url,
    token: AccessToken,
    /// Limit for metadata requests and for any pause while an object is transferred.
    timeout: Duration,
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound for a whole object download. Slow but steady transfers are
/// only limited by this; stalls are caught by the per-read timeout.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(3600 * 24);

#[must_use]
#[inline]
pub fn transfer_timeout(size: u64) -> Duration {
    // Assuming transfer speed above 1 MB/s.
    DEFAULT_TIMEOUT.saturating_add(Duration::from_micros(size))
}

impl Client {
    #[inline]
    pub fn new(server_url: Url, token: AccessToken) -> anyhow::Result<Self> {
        Ok(Self {
            server_url,
            token,
            reqwest: reqwest::Client::builder()
                .connect_timeout(DEFAULT_TIMEOUT)
                .build()?,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    #[must_use]
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    #[inline]
    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    #[instrument(skip_all, fields(path = R::PATH))]
    #[inline(never)]
    pub async fn request<R>(&self, request: &R) -> Result<R::Response>
    where
        R: RequestToResponse + Serialize + Send + Sync,
        R::Response: DeserializeOwned + Send + Sync,
    {
        let url = self
            .server_url
            .join(R::PATH)
            .map_err(|err| Error::Validation(format!("invalid server URL: {err}")))?;
        let body = encoding::serialize(&request).map_err(Error::store)?;
        let bytes = self
            .reqwest
            .request(Method::POST, url)
            .timeout(self.timeout)
            .bearer_auth(self.token.as_unmasked_str())
            .body(body)
            .send()
            .await
            .map_err(RequestError::transport)?
            .error_for_status()
            .map_err(RequestError::status)?
            .bytes()
            .await
            .map_err(RequestError::transport)?;
        decode_response(&bytes)
    }

    fn url(&self, prefix: &str, id: &str) -> Result<Url> {
        let mut url = self.server_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Validation("server URL cannot be a base".into()))?
            .pop_if_empty()
            .push(prefix.trim_matches('/'))
            .push(id);
        Ok(url)
    }
}

fn decode_response<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    deserialize::<Result<T, String>>(bytes)
        .context("failed to decode server response")
        .map_err(Error::Store)?
        .map_err(|msg| Error::store(format_err!("server error: {msg}")))
}

fn content_length(response: &Response) -> Result<u64, RequestError> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .context("missing content length header")
        .and_then(|len| {
            len.to_str()
                .map_err(anyhow::Error::from)
                .and_then(|len| Ok(len.parse()?))
                .context("failed content length parsing")
        })
        .map_err(RequestError::Application)
}

impl BlobStore for Client {
    #[inline]
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        self.request(&ListContainers).await
    }

    #[inline]
    async fn find_container(&self, name: &str) -> Result<Option<ContainerId>> {
        self.request(&FindContainer(name.into())).await
    }

    #[inline]
    async fn create_container(&self, name: &str) -> Result<ContainerId> {
        self.request(&CreateContainer { name: name.into() })
            .await?
            .ok_or_else(|| Error::DuplicateContainer(name.into()))
    }

    #[inline]
    async fn list_children(&self, container: &ContainerId) -> Result<Vec<ChunkDescriptor>> {
        self.request(&ListChildren(container.clone())).await
    }

    #[inline]
    async fn upload_object(
        &self,
        container: &ContainerId,
        name: &str,
        size: u64,
        chunk_number: u64,
    ) -> Result<UploadHandle> {
        self.request(&StartUpload {
            container: container.clone(),
            name: name.into(),
            size,
            chunk_number: Some(chunk_number),
        })
        .await
    }

    #[instrument(skip_all, fields(%handle, size = bytes.len()))]
    #[inline]
    async fn write_bytes(&self, handle: &UploadHandle, bytes: Bytes) -> Result<ObjectId> {
        let url = self.url(chunkcrypt_protocol::endpoints::UPLOAD_PATH_PREFIX, handle.as_str())?;
        let size = bytes.len() as u64;
        let response = self
            .reqwest
            .put(url)
            .timeout(transfer_timeout(size))
            .bearer_auth(self.token.as_unmasked_str())
            .header(CONTENT_LENGTH, size)
            .body(bytes)
            .send()
            .await
            .map_err(RequestError::transport)?
            .error_for_status()
            .map_err(RequestError::status)?
            .bytes()
            .await
            .map_err(RequestError::transport)?;
        decode_response(&response)
    }

    #[instrument(skip_all, fields(%object))]
    #[inline]
    async fn download_object(&self, object: &ObjectId) -> Result<Bytes> {
        let url = self.url(chunkcrypt_protocol::endpoints::OBJECT_PATH_PREFIX, object.as_str())?;
        let mut response = timeout(
            self.timeout,
            self.reqwest
                .get(url)
                .bearer_auth(self.token.as_unmasked_str())
                .timeout(RESPONSE_TIMEOUT)
                .send(),
        )
        .await
        .map_err(RequestError::transport)?
        .map_err(RequestError::transport)?
        .error_for_status()
        .map_err(RequestError::status)?;
        let declared_size = content_length(&response)?;
        let mut content = BytesMut::new();
        while let Some(chunk) = timeout(self.timeout, response.chunk())
            .await
            .map_err(RequestError::transport)?
            .map_err(RequestError::transport)?
        {
            content.extend_from_slice(&chunk);
        }
        if content.len() as u64 != declared_size {
            // Connection closed early.
            return Err(RequestError::transport(format_err!(
                "object size mismatch; received {}, declared {declared_size}",
                content.len(),
            ))
            .into());
        }
        Ok(content.freeze())
    }

    #[inline]
    async fn delete_container(&self, container: &ContainerId) -> Result<()> {
        self.request(&DeleteContainer(container.clone())).await
    }
}

enum RequestError {
    Transport(anyhow::Error),
    Application(anyhow::Error),
}

impl RequestError {
    fn application(err: impl Into<anyhow::Error>) -> Self {
        Self::Application(err.into())
    }

    fn transport(err: impl Into<anyhow::Error>) -> Self {
        Self::Transport(err.into())
    }

    /// Server failures may go away on retry, client errors won't.
    fn status(err: reqwest::Error) -> Self {
        if err.status().is_some_and(|status| status.is_server_error()) {
            Self::transport(err)
        } else {
            Self::application(err)
        }
    }
}

impl From<RequestError> for Error {
    #[inline]
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Transport(err) => Self::Network(err),
            RequestError::Application(err) => Self::Store(err),
        }
    }
}
