use std::path::Path;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::TransferError;
use crate::types::Chunk;

/// Number of chunks needed to cover `total_size` bytes: `ceil(total / chunk)`.
pub fn total_chunks(total_size: u64, chunk_size: u64) -> Result<u32, TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::InvalidChunkSize(0));
    }
    u32::try_from(total_size.div_ceil(chunk_size)).map_err(|_| TransferError::TooManyChunks {
        total_size,
        chunk_size,
    })
}

// ---------------------------------------------------------------------------
// ChunkSource
// ---------------------------------------------------------------------------

/// Reads a source strictly sequentially into fixed-size chunks.
///
/// Every chunk but the last is exactly `chunk_size` bytes. The sequence is
/// finite and cannot be restarted; once a read fails the source is spent.
pub struct ChunkSource<R = File> {
    reader: R,
    chunk_size: usize,
    total_size: u64,
    total_chunks: u32,
    offset: u64,
    next_index: u32,
}

impl ChunkSource<File> {
    /// Opens `path` and sizes the chunk sequence from its metadata.
    pub async fn open(path: &Path, chunk_size: u64) -> Result<Self, TransferError> {
        let file = File::open(path).await?;
        let total_size = file.metadata().await?.len();
        Self::new(file, total_size, chunk_size)
    }
}

impl<R: AsyncRead + Unpin> ChunkSource<R> {
    /// Wraps `reader`, which must yield exactly `total_size` bytes.
    pub fn new(reader: R, total_size: u64, chunk_size: u64) -> Result<Self, TransferError> {
        if total_size == 0 {
            return Err(TransferError::EmptyFile);
        }
        let total_chunks = total_chunks(total_size, chunk_size)?;
        let chunk_size = usize::try_from(chunk_size)
            .map_err(|_| TransferError::InvalidChunkSize(i64::try_from(chunk_size).unwrap_or(i64::MAX)))?;

        Ok(Self {
            reader,
            chunk_size,
            total_size,
            total_chunks,
            offset: 0,
            next_index: 0,
        })
    }

    /// Reads the next chunk. Returns `None` after the last one.
    ///
    /// A chunk is only returned once it is completely filled; a read error
    /// or a source shorter than announced fails instead of yielding a
    /// partial chunk.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        let remaining = self.remaining();
        if remaining == 0 {
            return Ok(None);
        }

        let index = self.next_index;
        let read_size = remaining.min(self.chunk_size as u64) as usize;
        let mut buf = vec![0u8; read_size];
        let mut filled = 0;

        while filled < read_size {
            let n = self
                .reader
                .read(&mut buf[filled..])
                .await
                .map_err(|source| TransferError::ChunkRead {
                    index,
                    offset: self.offset,
                    source,
                })?;
            if n == 0 {
                return Err(TransferError::UnexpectedEof {
                    index,
                    expected: read_size,
                    got: filled,
                });
            }
            filled += n;
        }

        let chunk = Chunk {
            index,
            offset: self.offset,
            length: read_size,
            payload: Bytes::from(buf),
        };
        trace!(chunk = index, offset = chunk.offset, len = read_size, "chunk read");

        self.offset += read_size as u64;
        self.next_index += 1;
        Ok(Some(chunk))
    }

    /// `ceil(total_size / chunk_size)`, fixed before the first read.
    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    /// Total bytes the source yields.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size as u64
    }

    /// Current byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes remaining to read.
    pub fn remaining(&self) -> u64 {
        self.total_size - self.offset
    }
}
