use {
    crate::{ChunkDescriptor, ContainerId, ContainerInfo, UploadHandle},
    serde::{Deserialize, Serialize},
};

/// Prefix of the URL path that receives the bytes of a started upload.
pub const UPLOAD_PATH_PREFIX: &str = "/upload/";
/// Prefix of the URL path that returns the raw bytes of a stored object.
pub const OBJECT_PATH_PREFIX: &str = "/object/";

pub trait RequestToResponse {
    type Response;
    const PATH: &'static str;
}
macro_rules! response_type {
    ($request:ty, $response:ty, $version:literal) => {
        impl RequestToResponse for $request {
            type Response = $response;
            const PATH: &'static str = concat!("/api/", $version, "/", stringify!($request));
        }
    };
}

pub type Response<Request> = <Request as RequestToResponse>::Response;

/// Returns all containers, ordered by name.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListContainers;
response_type!(ListContainers, Vec<ContainerInfo>, "v1");

/// Returns the id of the container with the specified name, if it exists.
#[derive(Debug, Serialize, Deserialize)]
pub struct FindContainer(pub String);
response_type!(FindContainer, Option<ContainerId>, "v1");

/// Creates an empty container.
/// Returns `None` if a container with this name already exists.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateContainer {
    pub name: String,
}
response_type!(CreateContainer, Option<ContainerId>, "v1");

/// Returns all objects of the container. The order is unspecified.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListChildren(pub ContainerId);
response_type!(ListChildren, Vec<ChunkDescriptor>, "v1");

/// Reserves an object of exactly `size` bytes in the container.
/// The bytes are then sent with `PUT /upload/<handle>`, which returns
/// the id of the new object. A handle can be used only once.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartUpload {
    pub container: ContainerId,
    pub name: String,
    pub size: u64,
    pub chunk_number: Option<u64>,
}
response_type!(StartUpload, UploadHandle, "v1");

/// Deletes the container and all of its objects.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteContainer(pub ContainerId);
response_type!(DeleteContainer, (), "v1");
