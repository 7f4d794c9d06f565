//! Process context - the process-wide slots a CLI program talks to.
//!
//! A Rust program has no mutable `argv`, exit procedure or stdio globals, so
//! the harness owns them: one [`ProcessContext`] per process, lazily seeded
//! from the real process on first use. Programs under test reach it through
//! [`crate::process`]; capture sessions swap the contents of its slots and
//! put the originals back when they finish.
//!
//! Slots hold `Arc`s so a caller can clone the current value out of the lock
//! and use it without holding the lock. A session may swap a slot while a
//! write on the previous value is still in flight.

use std::env;
use std::io::{self, Read, Write};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Procedure invoked by [`crate::process::exit`]. Receives the optional code.
pub type ExitHook = Arc<dyn Fn(Option<i32>) + Send + Sync>;

/// Pull-based input channel.
pub trait InputStream: Send + Sync {
    /// Read up to `buf.len()` bytes. `Ok(0)` means end of input.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Output channel.
pub trait OutputStream: Send + Sync {
    /// Write some prefix of `buf`, returning how many bytes were accepted.
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    fn flush(&self) -> io::Result<()>;

    /// Terminal width, when the stream is attached to one.
    fn columns(&self) -> Option<usize> {
        None
    }
}

/// The two output channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputChannel {
    Stdout,
    Stderr,
}

impl OutputChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputChannel::Stdout => "stdout",
            OutputChannel::Stderr => "stderr",
        }
    }
}

/// The host's real standard input.
#[derive(Debug, Default)]
pub struct ConsoleInput;

impl InputStream for ConsoleInput {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        io::stdin().lock().read(buf)
    }
}

/// The host's real standard output or error.
#[derive(Debug)]
pub struct ConsoleOutput {
    channel: OutputChannel,
}

impl ConsoleOutput {
    pub fn new(channel: OutputChannel) -> Self {
        Self { channel }
    }
}

impl OutputStream for ConsoleOutput {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        match self.channel {
            OutputChannel::Stdout => io::stdout().lock().write(buf),
            OutputChannel::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self.channel {
            OutputChannel::Stdout => io::stdout().lock().flush(),
            OutputChannel::Stderr => io::stderr().lock().flush(),
        }
    }

    fn columns(&self) -> Option<usize> {
        env::var("COLUMNS").ok()?.trim().parse().ok()
    }
}

/// Write all of `buf` to an output stream, retrying short writes.
pub fn write_all(stream: &dyn OutputStream, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match stream.write(buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                ))
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// The real termination procedure.
pub fn host_exit_hook() -> ExitHook {
    Arc::new(|code: Option<i32>| std::process::exit(code.unwrap_or(0)))
}

/// Process-wide argument list, exit procedure and stdio channels.
pub struct ProcessContext {
    args: RwLock<Arc<[String]>>,
    exit: RwLock<ExitHook>,
    stdin: RwLock<Arc<dyn InputStream>>,
    stdout: RwLock<Arc<dyn OutputStream>>,
    stderr: RwLock<Arc<dyn OutputStream>>,
}

static CONTEXT: OnceLock<ProcessContext> = OnceLock::new();

/// The process context, seeded from the host process on first use.
pub fn context() -> &'static ProcessContext {
    CONTEXT.get_or_init(ProcessContext::from_host)
}

impl ProcessContext {
    fn from_host() -> Self {
        let args: Vec<String> = env::args_os()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();

        Self {
            args: RwLock::new(args.into()),
            exit: RwLock::new(host_exit_hook()),
            stdin: RwLock::new(Arc::new(ConsoleInput)),
            stdout: RwLock::new(Arc::new(ConsoleOutput::new(OutputChannel::Stdout))),
            stderr: RwLock::new(Arc::new(ConsoleOutput::new(OutputChannel::Stderr))),
        }
    }

    pub fn args(&self) -> Arc<[String]> {
        read_slot(&self.args)
    }

    pub fn exit_hook(&self) -> ExitHook {
        read_slot(&self.exit)
    }

    pub fn stdin(&self) -> Arc<dyn InputStream> {
        read_slot(&self.stdin)
    }

    pub fn output(&self, channel: OutputChannel) -> Arc<dyn OutputStream> {
        match channel {
            OutputChannel::Stdout => read_slot(&self.stdout),
            OutputChannel::Stderr => read_slot(&self.stderr),
        }
    }

    /// Install a new argument list, returning the one it displaced.
    pub(crate) fn replace_args(&self, args: Arc<[String]>) -> Arc<[String]> {
        replace_slot(&self.args, args)
    }

    pub(crate) fn replace_exit_hook(&self, hook: ExitHook) -> ExitHook {
        replace_slot(&self.exit, hook)
    }

    pub(crate) fn replace_stdin(&self, stream: Arc<dyn InputStream>) -> Arc<dyn InputStream> {
        replace_slot(&self.stdin, stream)
    }

    pub(crate) fn replace_output(
        &self,
        channel: OutputChannel,
        stream: Arc<dyn OutputStream>,
    ) -> Arc<dyn OutputStream> {
        match channel {
            OutputChannel::Stdout => replace_slot(&self.stdout, stream),
            OutputChannel::Stderr => replace_slot(&self.stderr, stream),
        }
    }
}

// The exit path unwinds through program code, so a poisoned slot only means
// some thread unwound while holding it. The value inside is still whole.
fn read_slot<T: Clone>(slot: &RwLock<T>) -> T {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn replace_slot<T>(slot: &RwLock<T>, value: T) -> T {
    let mut guard = slot.write().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *guard, value)
}
