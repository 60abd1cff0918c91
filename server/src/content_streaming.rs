use {
    crate::{handler, serialize_response},
    chunkcrypt_protocol::{ObjectId, UploadHandle, util::maybe_block_in_place},
    futures_util::StreamExt,
    http_body_util::{BodyExt, Full, StreamBody, combinators::BoxBody},
    hyper::{
        Request, Response, StatusCode,
        body::{self, Bytes, Frame},
        header::CONTENT_LENGTH,
    },
    std::{
        convert::Infallible,
        io::{Read, Write},
    },
    tokio::sync::mpsc,
    tokio_stream::wrappers::ReceiverStream,
    tracing::{debug, warn},
};

const CONTENT_CHUNK_LEN: usize = 64 * 1024;

pub async fn upload(
    ctx: handler::Context,
    mut request: Request<body::Incoming>,
    handle: &UploadHandle,
) -> Result<Response<BoxBody<Bytes, Infallible>>, StatusCode> {
    let content_length: u64 = request
        .headers()
        .get(CONTENT_LENGTH)
        .ok_or_else(|| {
            warn!("missing content length in request");
            StatusCode::LENGTH_REQUIRED
        })?
        .to_str()
        .map_err(|err| {
            warn!(%err, "invalid content length in request");
            StatusCode::BAD_REQUEST
        })?
        .parse()
        .map_err(|err| {
            warn!(%err, "invalid content length in request");
            StatusCode::BAD_REQUEST
        })?;

    let pending = ctx.storage.take_pending(handle).ok_or_else(|| {
        warn!(%handle, "unknown upload handle");
        StatusCode::NOT_FOUND
    })?;
    if content_length != pending.size {
        warn!(
            content_length,
            announced = pending.size,
            "content length doesn't match announced size"
        );
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut file = maybe_block_in_place(|| ctx.storage.create_file()).map_err(|err| {
        warn!(%err, "failed to create file");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let mut received_length = 0;
    while let Some(frame) = request.body_mut().frame().await {
        let frame = frame.map_err(|err| {
            warn!(%err, "failed to read request frame");
            StatusCode::BAD_REQUEST
        })?;
        let data = frame.data_ref().ok_or_else(|| {
            warn!("unexpected trailer frame in request");
            StatusCode::BAD_REQUEST
        })?;
        received_length += data.len() as u64;
        if received_length > content_length {
            warn!(content_length, received_length, "request body is too long");
            return Err(StatusCode::BAD_REQUEST);
        }
        maybe_block_in_place(|| file.write_all(data)).map_err(|err| {
            warn!(%err, "failed to write to object file");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    }

    if content_length != received_length {
        warn!(content_length, received_length, "content length mismatch");
        return Err(StatusCode::BAD_REQUEST);
    }

    let id = maybe_block_in_place(|| ctx.storage.commit_object(file, pending)).map_err(|err| {
        warn!(%err, "failed to commit object file");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    debug!(%id, size = received_length, "stored object");

    Ok(Response::new(BodyExt::boxed(Full::new(serialize_response(
        Ok(id),
    )))))
}

pub async fn download(
    ctx: handler::Context,
    id: &ObjectId,
) -> Result<Response<BoxBody<Bytes, Infallible>>, StatusCode> {
    let mut file = maybe_block_in_place(|| ctx.storage.open_object(id)).map_err(|err| {
        warn!(%err, "couldn't open object file");
        StatusCode::NOT_FOUND
    })?;
    let len = file
        .metadata()
        .map_err(|err| {
            warn!(%err, "couldn't get metadata for object file");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .len();
    let (tx, rx) = mpsc::channel(5);
    tokio::spawn(async move {
        let mut buf = vec![0_u8; CONTENT_CHUNK_LEN];
        loop {
            match maybe_block_in_place(|| file.read(&mut buf)) {
                Ok(0) => break,
                Ok(len) => {
                    let Some(data) = buf.get(..len) else {
                        break;
                    };
                    if tx.send(Bytes::copy_from_slice(data)).await.is_err() {
                        // Client went away.
                        break;
                    }
                }
                Err(err) => {
                    warn!(%err, "failed to read object file");
                    break;
                }
            }
        }
    });
    Response::builder()
        .header(CONTENT_LENGTH, len)
        .body(BodyExt::boxed(StreamBody::new(
            ReceiverStream::new(rx).map(|bytes| Ok(Frame::data(bytes))),
        )))
        .map_err(|err| {
            warn!(%err, "failed to build response");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
