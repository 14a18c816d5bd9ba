use std::fs::File;
use std::io::{self, Read};
use std::ops::Deref;
use std::path::Path;

use memmap2::Mmap;

use crate::common::error::Result;

/// Reader that can hand bytes back so a later consumer sees them again.
///
/// Peeking and unreading are exact: every byte peeked or unread is returned
/// by subsequent reads in the original order.
#[derive(Debug)]
pub struct PushbackReader<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
}

impl<R: Read> PushbackReader<R> {
    pub fn new(inner: R) -> Self {
        PushbackReader {
            inner,
            buf: Vec::new(),
            pos: 0,
        }
    }

    /// Number of bytes waiting in the pushback buffer.
    pub fn buffered(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Push `data` back in front of whatever is still unread.
    pub fn unread(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        if self.pos >= data.len() {
            self.pos -= data.len();
            self.buf[self.pos..self.pos + data.len()].copy_from_slice(data);
        } else {
            let mut joined = Vec::with_capacity(data.len() + self.buffered());
            joined.extend_from_slice(data);
            joined.extend_from_slice(&self.buf[self.pos..]);
            self.buf = joined;
            self.pos = 0;
        }
    }

    /// Look at up to `n` upcoming bytes without consuming them.
    /// Shorter than `n` only at end of stream.
    pub fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        if self.pos > 0 && self.buffered() < n {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        while self.buffered() < n {
            let start = self.buf.len();
            self.buf.resize(self.pos + n, 0);
            match self.inner.read(&mut self.buf[start..]) {
                Ok(0) => {
                    self.buf.truncate(start);
                    break;
                }
                Ok(read) => self.buf.truncate(start + read),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => self.buf.truncate(start),
                Err(e) => {
                    self.buf.truncate(start);
                    return Err(e);
                }
            }
        }
        let end = (self.pos + n).min(self.buf.len());
        Ok(&self.buf[self.pos..end])
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for PushbackReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.buf.len() {
            let n = out.len().min(self.buffered());
            out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            if self.pos == self.buf.len() {
                self.buf.clear();
                self.pos = 0;
            }
            return Ok(n);
        }
        self.inner.read(out)
    }
}

/// Fill `buf` as far as the stream allows. Returns the number of bytes read.
pub fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Contents of a file opened for probing.
pub enum FileBytes {
    Mapped(Mmap),
    Empty,
}

impl Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FileBytes::Mapped(map) => map,
            FileBytes::Empty => &[],
        }
    }
}

/// Map a file read-only.
pub fn map_file(path: impl AsRef<Path>) -> Result<FileBytes> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(FileBytes::Empty);
    }
    // SAFETY: the map is read-only and only lives for the duration of one probe;
    // concurrent truncation of the file by another process is not guarded against.
    let map = unsafe { Mmap::map(&file)? };
    Ok(FileBytes::Mapped(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn peek_then_read_returns_same_bytes() {
        let mut reader = PushbackReader::new(Cursor::new(b"abcdefgh".to_vec()));
        assert_eq!(reader.peek(3).unwrap(), b"abc");
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcdefgh");
    }

    #[test]
    fn unread_after_partial_read_is_lossless() {
        let mut reader = PushbackReader::new(Cursor::new(b"0123456789".to_vec()));
        let mut head = [0u8; 4];
        reader.read_exact(&mut head).unwrap();
        reader.unread(&head);
        reader.unread(b"xy");
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"xy0123456789");
    }

    #[test]
    fn peek_past_end_is_short() {
        let mut reader = PushbackReader::new(Cursor::new(b"ab".to_vec()));
        assert_eq!(reader.peek(10).unwrap(), b"ab");
        assert_eq!(reader.buffered(), 2);
    }

    #[test]
    fn read_up_to_stops_at_eof() {
        let mut cursor = Cursor::new(vec![7u8; 5]);
        let mut buf = [0u8; 8];
        assert_eq!(read_up_to(&mut cursor, &mut buf).unwrap(), 5);
    }
}
