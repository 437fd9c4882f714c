use bytes::Bytes;

use crate::stub::ChunkLease;

/// At most one undelivered server chunk, plus a read cursor into it.
///
/// Dropping the buffer is invalidation: the bytes go away and the lease (if
/// the transport pools chunk memory) is released with them.
pub(crate) struct ChunkBuffer {
    data: Bytes,
    read_offset: usize,
    lease: Option<ChunkLease>,
}

impl ChunkBuffer {
    pub(crate) fn new(data: Bytes, read_offset: usize, lease: Option<ChunkLease>) -> Self {
        debug_assert!(read_offset <= data.len());
        ChunkBuffer {
            data,
            read_offset,
            lease,
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.read_offset
    }

    pub(crate) fn is_drained(&self) -> bool {
        self.remaining() == 0
    }

    /// Discards up to `n` bytes; returns how many were actually discarded.
    pub(crate) fn skip(&mut self, n: usize) -> usize {
        let n = n.min(self.remaining());
        self.read_offset += n;
        n
    }

    /// Copies as much as fits into `dst`, advancing the cursor.
    pub(crate) fn copy_into(&mut self, dst: &mut [u8]) -> usize {
        let n = self.remaining().min(dst.len());
        dst[..n].copy_from_slice(&self.data[self.read_offset..self.read_offset + n]);
        self.read_offset += n;
        n
    }
}
