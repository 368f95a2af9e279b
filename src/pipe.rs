//! Content pipes: the byte source a parser reads from.
//!
//! A pipe is anything that can [`Read`] and [`Seek`] and knows its own
//! length. Pipes may additionally cache data ahead of the read position;
//! the parser disables that while it performs random access scans near the
//! end of a file.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Byte source consumed by [`Mp3Parser`](crate::Mp3Parser).
pub trait ContentPipe: Read + Seek {
    /// Total length of the content in bytes.
    ///
    /// The default implementation seeks to the end and back.
    fn byte_len(&mut self) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let len = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(pos))?;
        Ok(len)
    }

    /// Advisory hint that sequential reads are coming.
    fn start_caching(&mut self) {}

    /// Advisory hint that random access reads are coming.
    fn stop_caching(&mut self) {}
}

impl<T: AsRef<[u8]>> ContentPipe for Cursor<T> {
    #[inline]
    fn byte_len(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().as_ref().len() as u64)
    }
}

/// Wraps any `Read + Seek`er as a [`ContentPipe`], remembering its length
/// and the caching hints it was given.
pub struct ReadSeekPipe<T: Read + Seek> {
    inner: T,
    byte_len: Option<u64>,
    caching: bool,
}

impl<T: Read + Seek> ReadSeekPipe<T> {
    /// Wraps `inner` with caching enabled. Pass the content length if it is
    /// known up front; otherwise it is measured the first time it is asked for.
    #[inline]
    pub fn new(inner: T, byte_len: Option<u64>) -> Self {
        ReadSeekPipe {
            inner,
            byte_len,
            caching: true,
        }
    }

    /// Whether the pipe currently has caching enabled.
    #[inline]
    pub fn is_caching(&self) -> bool {
        self.caching
    }

    /// Unwraps the pipe, returning the underlying reader.
    #[inline]
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl ReadSeekPipe<BufReader<File>> {
    /// Opens the file at `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self::new(BufReader::new(file), Some(len)))
    }
}

impl<T: Read + Seek> ContentPipe for ReadSeekPipe<T> {
    fn byte_len(&mut self) -> io::Result<u64> {
        if let Some(len) = self.byte_len {
            return Ok(len);
        }
        let pos = self.inner.stream_position()?;
        let len = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(pos))?;
        self.byte_len = Some(len);
        Ok(len)
    }

    #[inline]
    fn start_caching(&mut self) {
        self.caching = true;
    }

    #[inline]
    fn stop_caching(&mut self) {
        self.caching = false;
    }
}

impl<T: Read + Seek> Read for ReadSeekPipe<T> {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<T: Read + Seek> Seek for ReadSeekPipe<T> {
    #[inline]
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
