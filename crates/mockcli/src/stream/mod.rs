//! Stream interception.
//!
//! Each captured channel gets an interceptor installed into its process
//! context slot. Interceptors mirror every chunk into a [`Transcript`] and
//! relay the I/O to wherever the session's [`Substitutes`](crate::Substitutes)
//! say it should go. Guards keep the displaced stream so restoring puts back
//! exactly what was there before.

mod input;
mod output;

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, PoisonError};

use crate::context::OutputStream;

pub(crate) use input::InputGuard;
pub(crate) use output::OutputGuard;

/// Where a captured program's stdin comes from.
pub enum Source {
    /// Read from the real standard input that was installed before activation.
    Console,
    /// Read from a caller-supplied reader.
    Reader(Box<dyn Read + Send>),
}

impl Source {
    pub fn reader(reader: impl Read + Send + 'static) -> Self {
        Source::Reader(Box::new(reader))
    }

    /// A source that yields `data` once, then end of input.
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::reader(io::Cursor::new(data.into()))
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Console => f.write_str("Source::Console"),
            Source::Reader(_) => f.write_str("Source::Reader(..)"),
        }
    }
}

/// Where a captured program's stdout or stderr goes.
pub enum Sink {
    /// Relay to the real console stream. For stdout this also prints the
    /// start/end banners.
    Console,
    /// Relay exclusively to a caller-supplied writer.
    Writer(Box<dyn Write + Send>),
}

impl Sink {
    pub fn writer(writer: impl Write + Send + 'static) -> Self {
        Sink::Writer(Box::new(writer))
    }

    pub fn buffer(buffer: &SharedBuffer) -> Self {
        Self::writer(buffer.clone())
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sink::Console => f.write_str("Sink::Console"),
            Sink::Writer(_) => f.write_str("Sink::Writer(..)"),
        }
    }
}

/// Cloneable in-memory writer. All clones share one buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Buffer contents as (lossy) UTF-8.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputStream for SharedBuffer {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Append-only record of one channel's traffic during a session.
///
/// Sealed at finalize; appends after that are dropped.
#[derive(Debug, Default)]
pub(crate) struct Transcript {
    state: Mutex<TranscriptState>,
}

#[derive(Debug, Default)]
struct TranscriptState {
    bytes: Vec<u8>,
    sealed: bool,
}

impl Transcript {
    pub(crate) fn append(&self, chunk: &[u8]) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.sealed {
            state.bytes.extend_from_slice(chunk);
        }
    }

    pub(crate) fn seal(&self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sealed = true;
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .bytes
            .len()
    }

    pub(crate) fn text(&self) -> String {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&state.bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_drops_appends_after_seal() {
        let transcript = Transcript::default();
        transcript.append(b"Hello, ");
        transcript.append(b"world!");
        transcript.seal();
        transcript.append(b" too late");
        assert_eq!(transcript.text(), "Hello, world!");
        assert_eq!(transcript.len(), 13);
    }

    #[test]
    fn test_transcript_joins_split_utf8() {
        let transcript = Transcript::default();
        let snowman = "☃".as_bytes();
        transcript.append(&snowman[..1]);
        transcript.append(&snowman[1..]);
        assert_eq!(transcript.text(), "☃");
    }

    #[test]
    fn test_shared_buffer_clones_share_contents() {
        let buffer = SharedBuffer::new();
        let mut writer = buffer.clone();
        write!(writer, "shared").unwrap();
        assert_eq!(buffer.contents(), "shared");
        buffer.clear();
        assert!(writer.is_empty());
    }

    #[test]
    fn test_source_and_sink_debug() {
        assert_eq!(format!("{:?}", Source::bytes("x")), "Source::Reader(..)");
        assert_eq!(format!("{:?}", Sink::Console), "Sink::Console");
    }
}
