use {
    crate::storage::{PendingUpload, Storage},
    anyhow::{Result, bail},
    chunkcrypt_protocol::{
        endpoints::{
            CreateContainer, DeleteContainer, FindContainer, ListChildren, ListContainers,
            Response, StartUpload,
        },
        parse_chunk_number,
        util::{check_container_name, maybe_block_in_place},
    },
    std::sync::Arc,
    tracing::info,
};

/// Objects above this size are rejected before any data is sent.
pub const MAX_OBJECT_SIZE: u64 = 1 << 30;

#[derive(Debug, Clone)]
pub struct Context {
    pub storage: Arc<Storage>,
}

pub async fn list_containers(ctx: Context, _: ListContainers) -> Result<Response<ListContainers>> {
    Ok(ctx.storage.list_containers())
}

pub async fn find_container(ctx: Context, request: FindContainer) -> Result<Response<FindContainer>> {
    Ok(ctx.storage.find_container(&request.0))
}

pub async fn create_container(
    ctx: Context,
    request: CreateContainer,
) -> Result<Response<CreateContainer>> {
    check_container_name(&request.name)?;
    let id = maybe_block_in_place(|| ctx.storage.create_container(&request.name))?;
    if let Some(id) = &id {
        info!(%id, name = %request.name, "container created");
    }
    Ok(id)
}

pub async fn list_children(ctx: Context, request: ListChildren) -> Result<Response<ListChildren>> {
    ctx.storage.list_children(&request.0)
}

pub async fn start_upload(ctx: Context, request: StartUpload) -> Result<Response<StartUpload>> {
    if request.size > MAX_OBJECT_SIZE {
        bail!(
            "object is too large: {} bytes (max {MAX_OBJECT_SIZE})",
            request.size
        );
    }
    let number_from_name = parse_chunk_number(&request.name)?;
    if let Some(number) = request.chunk_number {
        if number != number_from_name {
            bail!(
                "chunk number {number} doesn't match object name {:?}",
                request.name
            );
        }
    }
    ctx.storage.start_upload(PendingUpload {
        container: request.container,
        name: request.name,
        size: request.size,
        chunk_number: request.chunk_number,
    })
}

pub async fn delete_container(
    ctx: Context,
    request: DeleteContainer,
) -> Result<Response<DeleteContainer>> {
    maybe_block_in_place(|| ctx.storage.delete_container(&request.0))?;
    info!(id = %request.0, "container deleted");
    Ok(())
}
