#![allow(clippy::collapsible_else_if)]

mod content_streaming;
pub mod handler;
pub mod signal;
pub mod storage;

use {
    crate::{signal::shutdown_signal, storage::Storage},
    anyhow::{Context as _, Result, anyhow},
    chunkcrypt_protocol::{
        AccessToken, ObjectId, UploadHandle,
        encoding::{self, deserialize},
        endpoints::{
            CreateContainer, DeleteContainer, FindContainer, ListChildren, ListContainers,
            OBJECT_PATH_PREFIX, RequestToResponse, StartUpload, UPLOAD_PATH_PREFIX,
        },
    },
    derivative::Derivative,
    futures::Future,
    http_body_util::{BodyExt, Full, combinators::BoxBody},
    hyper::{
        Method, Request, Response, StatusCode,
        body::{self, Bytes},
        header::AUTHORIZATION,
        server::conn::http1,
        service::service_fn,
    },
    hyper_util::{rt::TokioIo, server::graceful::GracefulShutdown},
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    std::{
        collections::HashSet,
        convert::Infallible,
        error::Error as _,
        io,
        net::SocketAddr,
        path::{Path, PathBuf},
        sync::Arc,
        time::Duration,
    },
    tokio::net::TcpListener,
    tracing::{debug, info, warn},
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Derivative, Clone, Serialize, Deserialize)]
#[derivative(Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub storage_path: PathBuf,
    #[derivative(Debug = "ignore")]
    pub access_tokens: Vec<AccessToken>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "info".into()
}

impl Config {
    pub fn parse(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        json5::from_str(&fs_err::read_to_string(path)?)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

#[derive(Debug, Clone)]
struct Context {
    storage: Arc<Storage>,
    access_tokens: Arc<HashSet<AccessToken>>,
}

/// Serves requests until a shutdown signal arrives.
pub async fn run(config: Config) -> Result<()> {
    let listener = TcpListener::bind(&config.bind_addr).await?;
    serve(config, listener).await
}

pub async fn serve(config: Config, listener: TcpListener) -> Result<()> {
    if config.access_tokens.is_empty() {
        warn!("no access tokens configured, all requests will be rejected");
    }
    let ctx = Context {
        storage: Arc::new(Storage::new(config.storage_path)?),
        access_tokens: Arc::new(config.access_tokens.into_iter().collect()),
    };
    info!("Listening on: {}", listener.local_addr()?);

    let graceful = GracefulShutdown::new();
    let mut signal = std::pin::pin!(shutdown_signal());
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let ctx = ctx.clone();
                    let connection = http1::Builder::new().keep_alive(true).serve_connection(
                        TokioIo::new(stream),
                        service_fn(move |req| handle_request(ctx.clone(), req)),
                    );
                    let connection = graceful.watch(connection);
                    tokio::spawn(async move {
                        if let Err(err) = connection.await {
                            log_connection_error(&err);
                        }
                    });
                }
                Err(err) => warn!(?err, "failed to accept"),
            },
            signal = &mut signal => {
                info!("received {}, shutting down", signal?);
                break;
            }
        }
    }

    tokio::time::timeout(SHUTDOWN_TIMEOUT, graceful.shutdown())
        .await
        .map_err(|_| anyhow!("timed out waiting for connections to close"))?;
    Ok(())
}

fn log_connection_error(err: &hyper::Error) {
    if let Some(io_err) = err.source().and_then(|err| err.downcast_ref::<io::Error>()) {
        match io_err.kind() {
            io::ErrorKind::NotConnected | io::ErrorKind::ConnectionReset => {
                debug!(?err, "canceled request");
            }
            _ => warn!(?err, "error while serving HTTP connection"),
        }
    } else if err.is_incomplete_message() {
        debug!(?err, "interrupted request");
    } else {
        warn!(?err, "error while serving HTTP connection");
    }
}

async fn handle_request(
    ctx: Context,
    request: Request<body::Incoming>,
) -> Result<Response<BoxBody<Bytes, Infallible>>, Infallible> {
    match try_handle_request(ctx, request).await {
        Ok(response) => Ok(response),
        Err(code) => {
            let mut response = Response::new(Full::new(Bytes::from(code.as_str().to_owned())).boxed());
            *response.status_mut() = code;
            Ok(response)
        }
    }
}

async fn try_handle_request(
    ctx: Context,
    request: Request<body::Incoming>,
) -> Result<Response<BoxBody<Bytes, Infallible>>, StatusCode> {
    auth(&ctx, &request).map_err(|err| {
        warn!(?err, "auth error");
        StatusCode::UNAUTHORIZED
    })?;

    let ctx = handler::Context {
        storage: ctx.storage,
    };

    let path = request.uri().path().to_owned();
    if let Some(handle) = path.strip_prefix(UPLOAD_PATH_PREFIX) {
        let handle = UploadHandle(handle.into());
        if !handle.is_well_formed() || request.method() != Method::PUT {
            return Err(StatusCode::NOT_FOUND);
        }
        content_streaming::upload(ctx, request, &handle).await
    } else if let Some(id) = path.strip_prefix(OBJECT_PATH_PREFIX) {
        let id = ObjectId(id.into());
        if !id.is_well_formed() || request.method() != Method::GET {
            return Err(StatusCode::NOT_FOUND);
        }
        content_streaming::download(ctx, &id).await
    } else if request.method() != Method::POST {
        Err(StatusCode::NOT_FOUND)
    } else if path == ListContainers::PATH {
        wrap_request(ctx, request, handler::list_containers).await
    } else if path == FindContainer::PATH {
        wrap_request(ctx, request, handler::find_container).await
    } else if path == CreateContainer::PATH {
        wrap_request(ctx, request, handler::create_container).await
    } else if path == ListChildren::PATH {
        wrap_request(ctx, request, handler::list_children).await
    } else if path == StartUpload::PATH {
        wrap_request(ctx, request, handler::start_upload).await
    } else if path == DeleteContainer::PATH {
        wrap_request(ctx, request, handler::delete_container).await
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

async fn wrap_request<T, F, Fut>(
    ctx: handler::Context,
    request: Request<body::Incoming>,
    f: F,
) -> Result<Response<BoxBody<Bytes, Infallible>>, StatusCode>
where
    T: RequestToResponse + DeserializeOwned,
    <T as RequestToResponse>::Response: Serialize,
    F: FnOnce(handler::Context, T) -> Fut,
    Fut: Future<Output = anyhow::Result<<T as RequestToResponse>::Response>>,
{
    let request = parse_request(request).await?;
    let response = f(ctx, request).await.map_err(|err| {
        warn!(?err, "handler error");
        format!("{err:#}")
    });
    Ok(Response::new(BodyExt::boxed(Full::new(serialize_response(
        response,
    )))))
}

async fn parse_request<T: DeserializeOwned>(
    request: Request<body::Incoming>,
) -> Result<T, StatusCode> {
    let bytes = request
        .into_body()
        .collect()
        .await
        .map_err(|err| {
            warn!(?err, "failed to read request body");
            StatusCode::BAD_REQUEST
        })?
        .to_bytes();
    deserialize(&bytes).map_err(|err| {
        warn!(?err, "failed to deserialize request body");
        StatusCode::BAD_REQUEST
    })
}

fn serialize_response<T: Serialize>(response: Result<T, String>) -> Bytes {
    match encoding::serialize_response(response) {
        Ok(bytes) => bytes.into(),
        Err(err) => {
            warn!(?err, "failed to serialize response");
            // Always encodable.
            encoding::serialize_response::<()>(Err(format!("failed to serialize response: {err}")))
                .unwrap_or_default()
                .into()
        }
    }
}

fn auth(ctx: &Context, request: &Request<body::Incoming>) -> Result<()> {
    let auth = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| anyhow!("missing authorization header"))?
        .to_str()?;
    let token: AccessToken = auth
        .strip_prefix("Bearer ")
        .ok_or_else(|| anyhow!("authorization header is not Bearer"))?
        .parse()?;
    if !ctx.access_tokens.contains(&token) {
        return Err(anyhow!("invalid bearer token"));
    }
    Ok(())
}
