//! The process as seen by a CLI program under test.
//!
//! Write the program against these functions instead of `std::env::args`,
//! `std::process::exit` and `std::io::stdout` and it can be captured
//! in-process. Outside a capture session every call goes straight to the
//! real process.
//!
//! ```rust,no_run
//! use std::io::Write;
//! use mockcli::process;
//!
//! fn main_entry() -> anyhow::Result<()> {
//!     let args = process::args();
//!     if args.len() < 2 {
//!         writeln!(process::stderr(), "usage: greet <name>")?;
//!         process::exit(2);
//!     }
//!     writeln!(process::stdout(), "Hello, {}!", args[1])?;
//!     Ok(())
//! }
//! ```

use std::io::{self, Read, Write};

use crate::context::{context, write_all, OutputChannel};

/// The current argument list.
pub fn args() -> Vec<String> {
    context().args().to_vec()
}

/// Replace the current argument list.
///
/// Inside a capture session this only changes the session's list; the
/// original comes back when the session ends.
pub fn set_args<I, S>(args: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();
    context().replace_args(args.into());
}

/// Terminate with `code` (0 when `None`).
///
/// Inside a capture session this finishes the session instead and unwinds
/// the calling thread with an [`ExitSignal`](crate::ExitSignal) payload,
/// which [`Session::run`](crate::Session::run) absorbs.
pub fn exit(code: impl Into<Option<i32>>) -> ! {
    let code = code.into();
    let hook = context().exit_hook();
    hook(code);
    // A hook that returns has declined to intercept.
    std::process::exit(code.unwrap_or(0))
}

/// Handle to the current standard input.
pub fn stdin() -> Stdin {
    Stdin { _private: () }
}

/// Handle to the current standard output.
pub fn stdout() -> Stdout {
    Stdout { _private: () }
}

/// Handle to the current standard error.
pub fn stderr() -> Stderr {
    Stderr { _private: () }
}

/// Reads from whatever stream is installed at the time of each call.
#[derive(Debug)]
pub struct Stdin {
    _private: (),
}

impl Stdin {
    /// Read everything up to end of input as (lossy) UTF-8.
    pub fn read_all(&mut self) -> io::Result<String> {
        let mut bytes = Vec::new();
        self.read_to_end(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Read for Stdin {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        context().stdin().read(buf)
    }
}

/// Writes to whatever stream is installed at the time of each call.
#[derive(Debug)]
pub struct Stdout {
    _private: (),
}

impl Write for Stdout {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        context().output(OutputChannel::Stdout).write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        write_all(&*context().output(OutputChannel::Stdout), buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        context().output(OutputChannel::Stdout).flush()
    }
}

#[derive(Debug)]
pub struct Stderr {
    _private: (),
}

impl Write for Stderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        context().output(OutputChannel::Stderr).write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        write_all(&*context().output(OutputChannel::Stderr), buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        context().output(OutputChannel::Stderr).flush()
    }
}

/// Like `print!`, through [`process::stdout`](crate::process::stdout).
#[macro_export]
macro_rules! cli_print {
    ($($arg:tt)*) => {{
        use ::std::io::Write as _;
        if let Err(e) = ::std::write!($crate::process::stdout(), $($arg)*) {
            ::std::panic!("failed printing to stdout: {}", e);
        }
    }};
}

/// Like `println!`, through [`process::stdout`](crate::process::stdout).
#[macro_export]
macro_rules! cli_println {
    () => {
        $crate::cli_print!("\n")
    };
    ($($arg:tt)*) => {{
        use ::std::io::Write as _;
        if let Err(e) = ::std::writeln!($crate::process::stdout(), $($arg)*) {
            ::std::panic!("failed printing to stdout: {}", e);
        }
    }};
}

/// Like `eprint!`, through [`process::stderr`](crate::process::stderr).
#[macro_export]
macro_rules! cli_eprint {
    ($($arg:tt)*) => {{
        use ::std::io::Write as _;
        if let Err(e) = ::std::write!($crate::process::stderr(), $($arg)*) {
            ::std::panic!("failed printing to stderr: {}", e);
        }
    }};
}

/// Like `eprintln!`, through [`process::stderr`](crate::process::stderr).
#[macro_export]
macro_rules! cli_eprintln {
    () => {
        $crate::cli_eprint!("\n")
    };
    ($($arg:tt)*) => {{
        use ::std::io::Write as _;
        if let Err(e) = ::std::writeln!($crate::process::stderr(), $($arg)*) {
            ::std::panic!("failed printing to stderr: {}", e);
        }
    }};
}
