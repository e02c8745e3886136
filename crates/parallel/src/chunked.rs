//! Chunked processing over voxel coordinate lists

use crate::strategy::{ParallelStrategy, ProcessingMode};
use voxmeta_core::{Error, Result};

/// A contiguous run of entries from a coordinate list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the first entry in the source list
    pub offset: usize,
    /// Number of entries in this chunk
    pub len: usize,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// Range of source positions covered by this chunk
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Iterator over chunks covering `total` entries
pub struct ChunkIterator {
    total: usize,
    chunk_size: usize,
    current: usize,
}

impl ChunkIterator {
    /// Create a new chunk iterator; a zero chunk size is treated as one
    pub fn new(total: usize, chunk_size: usize) -> Self {
        Self {
            total,
            chunk_size: chunk_size.max(1),
            current: 0,
        }
    }
}

impl Iterator for ChunkIterator {
    type Item = Chunk;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.total {
            return None;
        }
        let len = self.chunk_size.min(self.total - self.current);
        let chunk = Chunk::new(self.current, len);
        self.current += len;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total - self.current).div_ceil(self.chunk_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkIterator {}

/// Processor for chunked voxel operations
///
/// Work is split into chunks of coordinates; chunks run concurrently and
/// their outputs are concatenated back in coordinate order.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedProcessor {
    chunk_size: usize,
    mode: ProcessingMode,
}

impl Default for ChunkedProcessor {
    fn default() -> Self {
        Self::new(4096, ProcessingMode::Parallel)
    }
}

impl ChunkedProcessor {
    /// Create a new chunked processor
    pub fn new(chunk_size: usize, mode: ProcessingMode) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            mode,
        }
    }

    /// Chunk size in entries
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Processing mode
    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    /// Apply `f` to every chunk of `items`
    ///
    /// `f` must return exactly one output per input entry; the outputs are
    /// returned in the order of `items`.
    pub fn map_chunks<I, T, F>(&self, items: &[I], f: F) -> Result<Vec<T>>
    where
        I: Sync,
        T: Send,
        F: Fn(&[I]) -> Vec<T> + Sync + Send,
    {
        let chunks: Vec<Chunk> = ChunkIterator::new(items.len(), self.chunk_size).collect();

        let results = self
            .mode
            .par_map(0..chunks.len(), |i| f(&items[chunks[i].range()]))?;

        let mut output = Vec::with_capacity(items.len());
        for (chunk, chunk_out) in chunks.iter().zip(results) {
            if chunk_out.len() != chunk.len {
                return Err(Error::ShapeMismatch {
                    expected: vec![chunk.len],
                    actual: vec![chunk_out.len()],
                });
            }
            output.extend(chunk_out);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_iterator() {
        let chunks: Vec<_> = ChunkIterator::new(10, 4).collect();
        assert_eq!(
            chunks,
            vec![Chunk::new(0, 4), Chunk::new(4, 4), Chunk::new(8, 2)]
        );
        assert_eq!(ChunkIterator::new(10, 4).len(), 3);
        assert_eq!(ChunkIterator::new(0, 4).count(), 0);
    }

    #[test]
    fn test_chunk_coverage() {
        let total = 1001;
        let mut covered = vec![false; total];
        for chunk in ChunkIterator::new(total, 64) {
            for i in chunk.range() {
                assert!(!covered[i], "Entry {} covered twice", i);
                covered[i] = true;
            }
        }
        assert!(covered.iter().all(|&c| c));
    }

    #[test]
    fn test_map_chunks_order() {
        let items: Vec<usize> = (0..500).collect();
        for mode in [ProcessingMode::Sequential, ProcessingMode::Parallel] {
            let processor = ChunkedProcessor::new(7, mode);
            let out = processor
                .map_chunks(&items, |chunk| chunk.iter().map(|&i| i * 3).collect())
                .unwrap();
            assert_eq!(out, items.iter().map(|&i| i * 3).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_map_chunks_length_checked() {
        let items = [1, 2, 3];
        let processor = ChunkedProcessor::new(2, ProcessingMode::Sequential);
        let result = processor.map_chunks(&items, |_| vec![0u8]);
        assert!(result.is_err());
    }
}
