//! Naming and ordering of chunk objects inside a container.
//!
//! A chunk object is named `chunk<N>.enc`, where `N` is the 1-based sequential
//! number of the chunk. Remote listings are not guaranteed to come back in upload
//! order, so the order of chunks is always recovered from the chunk number.
//! Stores that keep object metadata also record the number as a structured field;
//! when it is present it must agree with the name.

use {
    crate::ObjectId,
    anyhow::{Context as _, Result, bail, ensure},
    serde::{Deserialize, Serialize},
};

pub const CHUNK_NAME_PREFIX: &str = "chunk";
pub const CHUNK_EXTENSION: &str = "enc";

/// Remote metadata of one uploaded chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    pub remote_id: ObjectId,
    pub name: String,
    /// Stored (encrypted) size in bytes.
    pub size: u64,
    /// 1-based chunk number, if the store keeps it as metadata.
    pub chunk_number: Option<u64>,
}

impl ChunkDescriptor {
    /// Returns the 1-based chunk number of this object.
    #[inline]
    pub fn chunk_number(&self) -> Result<u64> {
        match (self.chunk_number, parse_chunk_number(&self.name)) {
            (Some(0), _) => bail!("object {:?} has chunk number 0", self.name),
            (Some(recorded), Ok(parsed)) if recorded != parsed => bail!(
                "object {:?} is recorded as chunk {recorded} but named as chunk {parsed}",
                self.name,
            ),
            (Some(recorded), _) => Ok(recorded),
            (None, parsed) => parsed,
        }
    }
}

#[must_use]
#[inline]
pub fn chunk_name(number: u64) -> String {
    format!("{CHUNK_NAME_PREFIX}{number}.{CHUNK_EXTENSION}")
}

/// Parses `N` out of `chunk<N>` or `chunk<N>.<ext>`.
#[inline]
pub fn parse_chunk_number(name: &str) -> Result<u64> {
    let rest = name
        .strip_prefix(CHUNK_NAME_PREFIX)
        .with_context(|| format!("{name:?} is not a chunk name"))?;
    let digits = rest.split_once('.').map_or(rest, |(digits, _ext)| digits);
    ensure!(
        !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        "{name:?} does not contain a chunk number",
    );
    let number: u64 = digits
        .parse()
        .with_context(|| format!("chunk number in {name:?} is out of range"))?;
    ensure!(number >= 1, "chunk numbers start at 1, got {name:?}");
    Ok(number)
}

/// Sorts the descriptors by chunk number and checks that the numbers
/// form the exact sequence `1..=len`.
///
/// A write that was stored but whose response was lost gets retried, leaving two
/// objects for the same chunk. Such copies have the same size and either one
/// decrypts to the same plaintext, so only the first is kept. Copies that differ
/// in size are rejected.
#[inline]
pub fn order_chunks(descriptors: Vec<ChunkDescriptor>) -> Result<Vec<ChunkDescriptor>> {
    let mut numbered = descriptors
        .into_iter()
        .map(|descriptor| Ok((descriptor.chunk_number()?, descriptor)))
        .collect::<Result<Vec<_>>>()?;
    numbered.sort_by_key(|(number, _)| *number);
    let mut ordered: Vec<ChunkDescriptor> = Vec::with_capacity(numbered.len());
    let mut expected = 1_u64;
    for (number, descriptor) in numbered {
        if number < expected {
            let kept = ordered
                .last()
                .with_context(|| format!("duplicate chunk {number}"))?;
            ensure!(
                kept.size == descriptor.size,
                "duplicate chunk {number} with different sizes ({} and {})",
                kept.size,
                descriptor.size,
            );
            continue;
        }
        if number > expected {
            bail!("missing chunk {expected}");
        }
        ordered.push(descriptor);
        expected += 1;
    }
    Ok(ordered)
}
