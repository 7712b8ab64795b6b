// Byte sources and the chunked reader on top of them.
// Sequential passes pull fixed-size chunks; the old file is also read at
// arbitrary (offset, length) pairs to recover a single row.

use crate::error::DiffError;
use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;
#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(windows)]
use std::os::windows::fs::FileExt;

pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// A read-only, byte-addressable input.
///
/// Implementations must return the same bytes for the same range for the
/// whole lifetime of a run; offsets recorded during indexing are replayed later.
pub trait ByteSource: Send + Sync {
    fn len(&self) -> u64;

    /// Read up to `buf.len()` bytes starting at `offset`. Returns the number
    /// of bytes read, 0 at end of source.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Positional reads against an open file, no shared cursor.
pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    #[cfg(unix)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.seek_read(buf, offset)
    }
}

// Memory-mapped file. Empty files cannot be mapped, so they keep `None`.
pub struct MmapSource {
    mmap: Option<Mmap>,
}

impl MmapSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let mmap = if len > 0 {
            // The file must not be modified while the run holds the mapping.
            unsafe { Some(Mmap::map(&file)?) }
        } else {
            None
        };
        Ok(Self { mmap })
    }

    fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }
}

impl ByteSource for MmapSource {
    fn len(&self) -> u64 {
        self.bytes().len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        Ok(copy_from_slice_at(self.bytes(), offset, buf))
    }
}

/// In-memory input, for embedding hosts that already hold the bytes.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        Ok(copy_from_slice_at(&self.data, offset, buf))
    }
}

fn copy_from_slice_at(data: &[u8], offset: u64, buf: &mut [u8]) -> usize {
    let start = match usize::try_from(offset) {
        Ok(s) if s < data.len() => s,
        _ => return 0,
    };
    let n = buf.len().min(data.len() - start);
    buf[..n].copy_from_slice(&data[start..start + n]);
    n
}

/// Open a file either memory-mapped or through positional reads.
pub fn open_source(path: impl AsRef<Path>, mmap: bool) -> io::Result<Arc<dyn ByteSource>> {
    if mmap {
        Ok(Arc::new(MmapSource::open(path)?))
    } else {
        Ok(Arc::new(FileSource::open(path)?))
    }
}

// Fill `buf` from `offset`, stopping early only at end of source.
fn read_full_at(source: &dyn ByteSource, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match source.read_at(offset + filled as u64, &mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Re-read one recorded byte range.
///
/// An offset outside `[0, len)` yields an empty buffer instead of an error so
/// a single bad index entry cannot abort the run; ranges past EOF are clamped.
pub fn read_range(source: &dyn ByteSource, offset: u64, length: u32) -> Result<Vec<u8>, DiffError> {
    let len = source.len();
    if offset >= len {
        warn!(offset, len, "read_range: offset out of bounds, returning empty row");
        return Ok(Vec::new());
    }
    let wanted = (length as u64).min(len - offset) as usize;
    let mut buf = vec![0u8; wanted];
    let got = read_full_at(source, offset, &mut buf)?;
    buf.truncate(got);
    Ok(buf)
}

/// One sequential chunk and its absolute position in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub offset: u64,
    pub bytes: Vec<u8>,
}

/// Forward-only cursor yielding `[offset, offset + chunk_size)` ranges until EOF.
pub struct ChunkReader<'a> {
    source: &'a dyn ByteSource,
    chunk_size: usize,
    pos: u64,
}

impl<'a> ChunkReader<'a> {
    pub fn new(source: &'a dyn ByteSource, chunk_size: usize) -> Self {
        Self {
            source,
            chunk_size: chunk_size.max(1),
            pos: 0,
        }
    }

    /// Bytes handed out so far.
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn total_len(&self) -> u64 {
        self.source.len()
    }

    pub fn next_chunk(&mut self) -> Result<Option<Chunk>, DiffError> {
        let len = self.source.len();
        if self.pos >= len {
            return Ok(None);
        }
        let size = (self.chunk_size as u64).min(len - self.pos) as usize;
        let mut bytes = vec![0u8; size];
        let got = read_full_at(self.source, self.pos, &mut bytes)?;
        if got == 0 {
            return Ok(None);
        }
        bytes.truncate(got);
        let chunk = Chunk {
            offset: self.pos,
            bytes,
        };
        self.pos += got as u64;
        Ok(Some(chunk))
    }
}
