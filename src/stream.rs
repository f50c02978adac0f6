//! Seekable byte stream over a file or an in-memory buffer.
//!
//! Codecs only ever see a [`Stream`], so the same decode and encode code runs
//! against files and memory. All operations are blocking; a short read or
//! write reports exactly how many bytes moved.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use alloc::vec::Vec;

/// Uniform read/write/seek source.
#[derive(Debug)]
pub enum Stream<'a> {
    /// An open file handle.
    File(&'a mut File),
    /// Read-only memory. Writes fail.
    Memory(Cursor<&'a [u8]>),
    /// Fixed-size writable memory. Writes past the end fail with `WriteZero`.
    MemoryMut(Cursor<&'a mut [u8]>),
    /// Growable memory.
    Vec(Cursor<&'a mut Vec<u8>>),
}

impl<'a> Stream<'a> {
    pub fn from_file(file: &'a mut File) -> Self {
        Stream::File(file)
    }

    pub fn from_memory(data: &'a [u8]) -> Self {
        Stream::Memory(Cursor::new(data))
    }

    pub fn from_memory_mut(buf: &'a mut [u8]) -> Self {
        Stream::MemoryMut(Cursor::new(buf))
    }

    /// Write into `buf`, starting at its current end.
    pub fn from_vec(buf: &'a mut Vec<u8>) -> Self {
        let end = buf.len() as u64;
        let mut cursor = Cursor::new(buf);
        cursor.set_position(end);
        Stream::Vec(cursor)
    }

    /// Move to `offset` bytes from the start.
    pub fn seek_absolute(&mut self, offset: u64) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset)).map(|_| ())
    }

    /// Current offset from the start.
    pub fn position(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    /// Fill as much of `buf` as the stream allows, looping over short reads.
    ///
    /// Returns the number of bytes read; less than `buf.len()` only at end
    /// of stream. Detection code uses this to look at headers without
    /// treating truncation as an error.
    pub fn read_up_to(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Read a fixed-size header, failing with `UnexpectedEof` on truncation.
    pub(crate) fn read_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read a fixed-size header for detection; `None` when the stream is
    /// shorter than `N`.
    pub(crate) fn peek_array<const N: usize>(&mut self) -> io::Result<Option<[u8; N]>> {
        let mut buf = [0u8; N];
        let n = self.read_up_to(&mut buf)?;
        Ok((n == N).then_some(buf))
    }
}

impl Read for Stream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::File(f) => f.read(buf),
            Stream::Memory(c) => c.read(buf),
            Stream::MemoryMut(c) => c.read(buf),
            Stream::Vec(c) => c.read(buf),
        }
    }
}

impl Write for Stream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::File(f) => f.write(buf),
            Stream::Memory(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stream is read-only",
            )),
            Stream::MemoryMut(c) => c.write(buf),
            Stream::Vec(c) => c.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::File(f) => f.flush(),
            Stream::Memory(_) | Stream::MemoryMut(_) | Stream::Vec(_) => Ok(()),
        }
    }
}

impl Seek for Stream<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Stream::File(f) => f.seek(pos),
            Stream::Memory(c) => c.seek(pos),
            Stream::MemoryMut(c) => c.seek(pos),
            Stream::Vec(c) => c.seek(pos),
        }
    }
}
