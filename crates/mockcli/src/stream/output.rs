//! Output interception for stdout and stderr.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::{Sink, Transcript};
use crate::context::{context, OutputChannel, OutputStream};

/// Where intercepted writes are relayed.
enum Forward {
    /// The stream that was installed before activation.
    Original,
    /// A caller-supplied writer, exclusively.
    Sink(Mutex<Box<dyn Write + Send>>),
    /// Nowhere; the chunk is only recorded.
    Discard,
}

impl Forward {
    fn from_sink(sink: Option<Sink>) -> Self {
        match sink {
            Some(Sink::Console) => Forward::Original,
            Some(Sink::Writer(writer)) => Forward::Sink(Mutex::new(writer)),
            None => Forward::Discard,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Forward::Original => "console",
            Forward::Sink(_) => "substitute",
            Forward::Discard => "suppressed",
        }
    }
}

/// Stands in for an output channel while a session is active.
struct OutputInterceptor {
    original: Arc<dyn OutputStream>,
    forward: Forward,
    transcript: Arc<Transcript>,
}

impl OutputStream for OutputInterceptor {
    fn write(&self, chunk: &[u8]) -> io::Result<usize> {
        // Relay first; a destination that fails the write records nothing.
        let written = match &self.forward {
            Forward::Original => self.original.write(chunk)?,
            Forward::Sink(sink) => sink
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .write(chunk)?,
            Forward::Discard => chunk.len(),
        };
        self.transcript.append(&chunk[..written]);
        Ok(written)
    }

    fn flush(&self) -> io::Result<()> {
        match &self.forward {
            Forward::Original => self.original.flush(),
            Forward::Sink(sink) => sink.lock().unwrap_or_else(PoisonError::into_inner).flush(),
            Forward::Discard => Ok(()),
        }
    }

    fn columns(&self) -> Option<usize> {
        match self.forward {
            Forward::Original => self.original.columns(),
            _ => None,
        }
    }
}

/// Holds the displaced output stream until the session restores it.
pub(crate) struct OutputGuard {
    channel: OutputChannel,
    original: Arc<dyn OutputStream>,
    transcript: Arc<Transcript>,
}

impl OutputGuard {
    /// Wrap `channel` so every write lands in `transcript` and is relayed
    /// according to `sink`.
    pub(crate) fn install(
        channel: OutputChannel,
        sink: Option<Sink>,
        transcript: Arc<Transcript>,
    ) -> Self {
        let ctx = context();
        let original = ctx.output(channel);
        let forward = Forward::from_sink(sink);
        debug!(channel = channel.as_str(), forward = forward.describe(), "intercepting output");

        let interceptor = Arc::new(OutputInterceptor {
            original: Arc::clone(&original),
            forward,
            transcript: Arc::clone(&transcript),
        });
        ctx.replace_output(channel, interceptor);

        Self {
            channel,
            original,
            transcript,
        }
    }

    /// Put the original stream back and seal the transcript.
    ///
    /// Returns the restored stream.
    pub(crate) fn restore(self) -> Arc<dyn OutputStream> {
        context().replace_output(self.channel, Arc::clone(&self.original));
        self.transcript.seal();
        debug!(channel = self.channel.as_str(), "output restored");
        self.original
    }
}
