#![allow(clippy::collapsible_else_if, reason = "clarity")]

pub mod chunk;
pub mod credentials;
pub mod encoding;
pub mod endpoints;
pub mod util;

pub use crate::{
    chunk::{ChunkDescriptor, chunk_name, order_chunks, parse_chunk_number},
    credentials::AccessToken,
};
use {
    chrono::Utc,
    derive_more::{Display, From, Into},
    rand::distr::{Alphanumeric, SampleString},
    serde::{Deserialize, Serialize},
};

pub type DateTimeUtc = chrono::DateTime<Utc>;

const ID_LENGTH: usize = 24;

macro_rules! random_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
            From, Into,
        )]
        pub struct $name(pub String);

        impl $name {
            #[must_use]
            #[inline]
            pub fn generate() -> Self {
                Self(Alphanumeric.sample_string(&mut rand::rng(), ID_LENGTH))
            }

            #[must_use]
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Ids travel in URL paths, so only ASCII alphanumerics are accepted.
            #[must_use]
            #[inline]
            pub fn is_well_formed(&self) -> bool {
                !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_alphanumeric())
            }
        }
    };
}

random_id!(ContainerId);
random_id!(ObjectId);
random_id!(UploadHandle);

/// A logical file stored in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: ContainerId,
    pub name: String,
    pub created_at: DateTimeUtc,
    pub object_count: u64,
    /// Sum of stored (encrypted) object sizes.
    pub total_size: u64,
}
