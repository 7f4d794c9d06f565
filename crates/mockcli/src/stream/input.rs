//! Input interception for stdin.
//!
//! Input is pulled, not pushed: the program asks for bytes and the source
//! answers. The interceptor must not change that conversation. Each read the
//! program makes becomes exactly one read on the feeding source, with the
//! program's own buffer, and whatever the source answers (data, end of
//! input, or an error) is handed back unchanged. Nothing is read ahead or
//! buffered, so the source is never pulled faster than the program consumes,
//! and an end of input is only reported when the source reports one.

use std::io::{self, Read};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};

use super::{Source, Transcript};
use crate::context::{context, InputStream};

/// Where intercepted reads are served from.
enum Feed {
    /// The stream that was installed before activation.
    Original,
    /// A caller-supplied reader.
    Reader(Mutex<Box<dyn Read + Send>>),
    /// Nothing; every read is end of input.
    Empty,
}

impl Feed {
    fn from_source(source: Option<Source>) -> Self {
        match source {
            Some(Source::Console) => Feed::Original,
            Some(Source::Reader(reader)) => Feed::Reader(Mutex::new(reader)),
            None => Feed::Empty,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Feed::Original => "console",
            Feed::Reader(_) => "substitute",
            Feed::Empty => "empty",
        }
    }
}

/// Stands in for stdin while a session is active.
struct InputInterceptor {
    original: Arc<dyn InputStream>,
    feed: Feed,
    transcript: Arc<Transcript>,
}

impl InputStream for InputInterceptor {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match &self.feed {
            Feed::Original => self.original.read(buf)?,
            Feed::Reader(reader) => reader
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .read(buf)?,
            Feed::Empty => 0,
        };

        // Only data counts; an empty read is end of input (or an empty buffer).
        if n > 0 {
            self.transcript.append(&buf[..n]);
        } else {
            trace!(feed = self.feed.describe(), "stdin read returned no data");
        }
        Ok(n)
    }
}

/// Holds the displaced stdin until the session restores it.
pub(crate) struct InputGuard {
    original: Arc<dyn InputStream>,
    transcript: Arc<Transcript>,
}

impl InputGuard {
    pub(crate) fn install(source: Option<Source>, transcript: Arc<Transcript>) -> Self {
        let ctx = context();
        let original = ctx.stdin();
        let feed = Feed::from_source(source);
        debug!(feed = feed.describe(), "intercepting stdin");

        let interceptor = Arc::new(InputInterceptor {
            original: Arc::clone(&original),
            feed,
            transcript: Arc::clone(&transcript),
        });
        ctx.replace_stdin(interceptor);

        Self {
            original,
            transcript,
        }
    }

    /// Put the original stdin back and seal the transcript.
    ///
    /// Dropping the interceptor drops the substitute reader with it, unless
    /// the program still holds a read in flight.
    pub(crate) fn restore(self) {
        context().replace_stdin(self.original);
        self.transcript.seal();
        debug!("stdin restored");
    }
}
