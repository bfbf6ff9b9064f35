//! The byte sink the muxer writes into.

use std::io::{self, Seek, SeekFrom, Write};

use crate::error::{MuxError, Result};

/// A byte sink with an appendable cursor and a queryable absolute position.
///
/// Seekable writers additionally support repositioning the cursor to any
/// previously returned position; the muxer uses this to back-patch reserved
/// size fields on finalize. The muxer never reads bytes back.
///
/// Implementations must be synchronous: each method returns before the next
/// muxer operation runs.
pub trait Writer {
    /// Appends `buf` at the current position.
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// The current absolute position in bytes.
    fn position(&self) -> u64;

    /// Moves the cursor to `pos`. Fails with [`MuxError::NotSeekable`] on
    /// writers that cannot seek.
    fn set_position(&mut self, pos: u64) -> Result<()>;

    /// Whether [`Writer::set_position`] is supported.
    fn seekable(&self) -> bool;
}

/// Adapter turning any `Write + Seek` sink (files, cursors) into a seekable
/// [`Writer`].
///
/// The position is tracked locally so `position()` never issues a seek.
pub struct SeekWriter<W> {
    inner: W,
    pos: u64,
}

impl<W: Write + Seek> SeekWriter<W> {
    /// Wraps `inner`, which must currently be at its start (or wherever the
    /// stream is meant to begin — positions are relative to this point).
    pub fn new(inner: W) -> Self {
        Self { inner, pos: 0 }
    }

    /// Returns the wrapped sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Seek> Writer for SeekWriter<W> {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn set_position(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    fn seekable(&self) -> bool {
        true
    }
}

/// Adapter for forward-only sinks (sockets, pipes).
///
/// `set_position` always fails, which makes the muxer leave every reserved
/// size field at the EBML "unknown size" marker — the layout live WebM
/// clients consume.
pub struct StreamWriter<W> {
    inner: W,
    pos: u64,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, pos: 0 }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Writer for StreamWriter<W> {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn set_position(&mut self, _pos: u64) -> Result<()> {
        Err(MuxError::NotSeekable)
    }

    fn seekable(&self) -> bool {
        false
    }
}

impl Writer for io::Cursor<Vec<u8>> {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.write_all(buf)?;
        Ok(())
    }

    fn position(&self) -> u64 {
        io::Cursor::position(self)
    }

    fn set_position(&mut self, pos: u64) -> Result<()> {
        io::Cursor::set_position(self, pos);
        Ok(())
    }

    fn seekable(&self) -> bool {
        true
    }
}
