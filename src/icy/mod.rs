//! Shoutcast/Icecast stream unwrapping.
//!
//! A server announces a metadata interval `metaint`, either in its `ICY 200 OK`
//! banner or out of band. Every `metaint` audio bytes, one length byte `n`
//! and `n * 16` bytes of `Key='value';` text are spliced into the stream.
//! [`IcyReader`] removes those blocks so readers only ever see audio.

use std::collections::BTreeMap;
use std::io::{self, Read};

use crate::common::properties::PropertyMap;
use crate::common::util::read_up_to;
use crate::id3::keys;

/// Property key prefix for banner tags.
pub const METADATA_PREFIX: &str = "mp3.shoutcast.metadata.";

pub const METAINT_KEY: &str = "icy-metaint";
pub const NAME_KEY: &str = "icy-name";

const MAX_LINE_LEN: usize = 8192;
const MAX_BANNER_LINES: usize = 128;

/// One key/value pair from the banner or an inline block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcyTag {
    pub name: String,
    pub value: String,
}

/// Receives inline tags as soon as their block is read.
pub trait TagParseListener {
    fn tag_parsed(&mut self, tag: &IcyTag);
}

impl<F: FnMut(&IcyTag)> TagParseListener for F {
    fn tag_parsed(&mut self, tag: &IcyTag) {
        self(tag)
    }
}

/// Audio-only view of an ICY stream.
pub struct IcyReader<R> {
    inner: R,
    /// `None` or zero: no inline metadata.
    metaint: Option<usize>,
    until_meta: usize,
    tags: BTreeMap<String, String>,
    listeners: Vec<Box<dyn TagParseListener>>,
}

impl<R: Read> IcyReader<R> {
    /// Consume the `ICY` banner up to its empty line and take the interval from
    /// `icy-metaint`. A banner without that header yields a pass-through reader.
    pub fn new(mut inner: R) -> io::Result<Self> {
        let mut tags = BTreeMap::new();
        for _ in 0..MAX_BANNER_LINES {
            let Some(line) = read_line(&mut inner)? else {
                break;
            };
            if line.is_empty() {
                break;
            }
            match line.split_once(':') {
                Some((key, value)) => {
                    tags.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
                }
                None => log::trace!("ICY status line {:?}", line),
            }
        }

        let metaint = match tags.get(METAINT_KEY) {
            Some(value) => match value.parse::<usize>() {
                Ok(n) => Some(n),
                Err(_) => {
                    log::debug!("ignoring bad {} {:?}", METAINT_KEY, value);
                    None
                }
            },
            None => None,
        };
        let mut reader = Self::with_metaint(inner, metaint);
        reader.tags = tags;
        Ok(reader)
    }

    /// Reader for a stream whose interval came from outside the stream, e.g.
    /// an HTTP `icy-metaint` header. No banner is expected.
    pub fn with_metaint(inner: R, metaint: Option<usize>) -> Self {
        let metaint = metaint.filter(|&n| n > 0);
        IcyReader {
            inner,
            metaint,
            until_meta: metaint.unwrap_or(0),
            tags: BTreeMap::new(),
            listeners: Vec::new(),
        }
    }

    /// Fall back to `metaint` when the banner announced no interval.
    /// Must be called before the first read.
    pub fn or_metaint(mut self, metaint: Option<usize>) -> Self {
        if self.metaint.is_none() {
            self.metaint = metaint.filter(|&n| n > 0);
            self.until_meta = self.metaint.unwrap_or(0);
        }
        self
    }

    pub fn metaint(&self) -> Option<usize> {
        self.metaint
    }

    pub fn add_listener(&mut self, listener: impl TagParseListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Latest value seen for `name` (lowercase for banner keys).
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    pub fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// File properties seeded from the tags: `icy-name` becomes the title and
    /// every tag is kept under `mp3.shoutcast.metadata.<key>`.
    pub fn properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        if let Some(name) = self.tag(NAME_KEY) {
            props.insert(keys::TITLE, name.trim());
        }
        for (key, value) in self.tags() {
            props.insert(format!("{}{}", METADATA_PREFIX, key), value.trim());
        }
        props
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read one inline block. Returns false at end of stream, including a
    /// block cut short by it.
    fn read_metadata_block(&mut self) -> io::Result<bool> {
        let mut len = [0u8; 1];
        loop {
            match self.inner.read(&mut len) {
                Ok(0) => return Ok(false),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let size = usize::from(len[0]) * 16;
        if size == 0 {
            return Ok(true);
        }
        let mut block = vec![0u8; size];
        let read = read_up_to(&mut self.inner, &mut block)?;
        if read < size {
            log::debug!("ICY metadata block truncated: {} of {} bytes", read, size);
            return Ok(false);
        }

        for tag in parse_inline_tags(&block) {
            log::trace!("ICY tag {}={:?}", tag.name, tag.value);
            for listener in &mut self.listeners {
                listener.tag_parsed(&tag);
            }
            self.tags.insert(tag.name, tag.value);
        }
        Ok(true)
    }
}

impl<R: Read> Read for IcyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let Some(metaint) = self.metaint else {
            return self.inner.read(buf);
        };
        if self.until_meta == 0 {
            if !self.read_metadata_block()? {
                return Ok(0);
            }
            self.until_meta = metaint;
        }
        let want = buf.len().min(self.until_meta);
        let n = self.inner.read(&mut buf[..want])?;
        self.until_meta -= n;
        Ok(n)
    }
}

/// Read one CRLF or LF terminated line without reading past it.
/// `None` at end of stream.
fn read_line<R: Read>(reader: &mut R) -> io::Result<Option<String>> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) if line.is_empty() => return Ok(None),
            Ok(0) => break,
            Ok(_) if byte[0] == b'\n' => break,
            Ok(_) => {
                if line.len() >= MAX_LINE_LEN {
                    return Err(io::Error::new(io::ErrorKind::InvalidData, "ICY banner line too long"));
                }
                line.push(byte[0]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}

/// Split `StreamTitle='A - B';StreamUrl='';` into tags.
///
/// Quoted values may contain `;` and `'`; a value ends at `';` or at the end
/// of the block. NUL padding is ignored.
pub fn parse_inline_tags(block: &[u8]) -> Vec<IcyTag> {
    let end = memchr::memchr(0, block).unwrap_or(block.len());
    let text = String::from_utf8_lossy(&block[..end]);
    let mut rest: &str = &text;
    let mut tags = Vec::new();

    while let Some(eq) = rest.find('=') {
        let name = rest[..eq].trim().to_string();
        let after = &rest[eq + 1..];
        let (value, next) = match after.strip_prefix('\'') {
            Some(quoted) => match quoted.find("';") {
                Some(close) => (&quoted[..close], &quoted[close + 2..]),
                None => (quoted.strip_suffix('\'').unwrap_or(quoted), ""),
            },
            None => match after.find(';') {
                Some(semi) => (&after[..semi], &after[semi + 1..]),
                None => (after, ""),
            },
        };
        if !name.is_empty() {
            tags.push(IcyTag {
                name,
                value: value.to_string(),
            });
        }
        rest = next;
    }
    tags
}
