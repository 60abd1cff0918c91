use {
    crate::error::{Error, Result},
    std::collections::HashMap,
};

/// Collects decrypted chunks that arrive in any order and joins them by index.
#[derive(Debug)]
pub struct Reassembler {
    parts: Vec<Option<Vec<u8>>>,
    received: usize,
}

impl Reassembler {
    #[must_use]
    #[inline]
    pub fn new(total_count: usize) -> Self {
        Self {
            parts: vec![None; total_count],
            received: 0,
        }
    }

    #[inline]
    pub fn insert(&mut self, index: usize, bytes: Vec<u8>) -> Result<()> {
        let total = self.parts.len();
        let slot = self.parts.get_mut(index).ok_or_else(|| {
            Error::Integrity(format!("chunk index {index} is out of range (total {total})"))
        })?;
        if slot.is_some() {
            return Err(Error::Integrity(format!("duplicate chunk index {index}")));
        }
        *slot = Some(bytes);
        self.received += 1;
        Ok(())
    }

    #[must_use]
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.received == self.parts.len()
    }

    /// Concatenates all chunks in ascending index order.
    ///
    /// Fails if a chunk is missing or if the result is not `expected_len` bytes long.
    #[inline]
    pub fn finish(self, expected_len: Option<u64>) -> Result<Vec<u8>> {
        if let Some(missing) = self.parts.iter().position(Option::is_none) {
            return Err(Error::Integrity(format!("missing chunk index {missing}")));
        }
        let len = self.parts.iter().flatten().map(Vec::len).sum();
        let mut out = Vec::with_capacity(len);
        for part in self.parts.into_iter().flatten() {
            out.extend_from_slice(&part);
        }
        if let Some(expected_len) = expected_len {
            if out.len() as u64 != expected_len {
                return Err(Error::Integrity(format!(
                    "reassembled size mismatch; actual {}, expected {expected_len}",
                    out.len(),
                )));
            }
        }
        Ok(out)
    }
}

/// Joins `parts` keyed by 0-based index. Every index in `0..total_count` must be present.
#[inline]
pub fn merge(parts: HashMap<usize, Vec<u8>>, total_count: usize) -> Result<Vec<u8>> {
    let mut reassembler = Reassembler::new(total_count);
    for (index, bytes) in parts {
        reassembler.insert(index, bytes)?;
    }
    reassembler.finish(None)
}
