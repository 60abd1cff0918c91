use crate::error::{Error, Result};

/// Default size of a plaintext chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// A contiguous slice of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based position of the chunk in the file.
    pub index: usize,
    pub bytes: Vec<u8>,
}

/// A file read into memory, ready to be split.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    #[must_use]
    #[inline]
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Number of chunks `split` produces for `len` bytes.
#[must_use]
#[inline]
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size)
}

/// Splits `data` into chunks of `chunk_size` bytes. Only the last chunk may be shorter.
///
/// An empty input produces no chunks.
#[inline]
pub fn split(data: &[u8], chunk_size: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(Error::Validation("chunk size must be positive".into()));
    }
    Ok(data
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, bytes)| Chunk {
            index,
            bytes: bytes.to_vec(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|_| rand::random::<u8>()).collect()
    }

    #[test]
    fn chunk_count_law() {
        for _ in 0..200 {
            let len = rand::random_range(0..5000);
            let chunk_size = rand::random_range(1..700);
            let data = random_bytes(len);
            let chunks = split(&data, chunk_size).unwrap();
            assert_eq!(chunks.len(), len.div_ceil(chunk_size));
            assert_eq!(chunks.len(), chunk_count(len, chunk_size));
            for (expected_index, chunk) in chunks.iter().enumerate() {
                assert_eq!(chunk.index, expected_index);
                if expected_index + 1 < chunks.len() {
                    assert_eq!(chunk.bytes.len(), chunk_size);
                } else {
                    assert!(!chunk.bytes.is_empty() && chunk.bytes.len() <= chunk_size);
                }
            }
            let joined: Vec<u8> = chunks.into_iter().flat_map(|c| c.bytes).collect();
            assert_eq!(joined, data);
        }
    }

    #[test]
    fn deterministic() {
        let data = random_bytes(1000);
        assert_eq!(split(&data, 33).unwrap(), split(&data, 33).unwrap());
    }

    #[test]
    fn scenario_sizes() {
        const MB: usize = 1024 * 1024;
        let data = vec![7_u8; 25 * MB];
        let sizes: Vec<usize> = split(&data, 10 * MB)
            .unwrap()
            .iter()
            .map(|c| c.bytes.len())
            .collect();
        assert_eq!(sizes, [10 * MB, 10 * MB, 5 * MB]);
    }

    #[test]
    fn edge_cases() {
        assert!(split(&[], 10).unwrap().is_empty());
        assert_eq!(split(&[1, 2, 3], 3).unwrap().len(), 1);
        assert_eq!(split(&[1, 2, 3], 100).unwrap()[0].bytes, [1, 2, 3]);
        assert!(matches!(split(&[1], 0), Err(Error::Validation(_))));
    }
}
