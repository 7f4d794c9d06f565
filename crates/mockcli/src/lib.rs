//! In-process capture harness for command-line programs.
//!
//! A CLI program written against [`process`] (instead of `std::env::args`,
//! `std::process::exit` and the std stdio handles) can be run inside a test
//! without spawning a subprocess. A capture [`Session`] swaps in a substitute
//! argument list, intercepts the exit call, records everything read from
//! stdin and written to stdout and stderr, and hands back a
//! [`CaptureResult`] once the program exits, runs out of work, or fails.
//!
//! ```rust,no_run
//! use mockcli::{process, Capture, Source};
//!
//! let session = Capture::new()
//!     .args(["shout"])
//!     .stdin(Source::bytes("hello"))
//!     .activate()
//!     .expect("no other capture running");
//!
//! let outcome = session
//!     .run(|| {
//!         let input = process::stdin().read_all()?;
//!         mockcli::cli_print!("{}", input.to_uppercase());
//!         Ok(())
//!     })
//!     .expect("session still active");
//!
//! assert_eq!(outcome.result.stdin, "hello");
//! assert_eq!(outcome.result.stdout, "HELLO");
//! assert_eq!(outcome.result.code, 0);
//! ```
//!
//! Only one session may be active per process. Tests that capture should
//! be serialized (for example with `serial_test`).

pub mod banner;
pub mod context;
pub mod error;
pub mod positional;
pub mod process;
pub mod result;
pub mod session;
pub mod stream;
mod swap;
pub mod telemetry;
pub mod termination;

pub use error::CaptureError;
pub use positional::{activate_positional, Param};
pub use result::CaptureResult;
pub use session::{activate, is_active, Callback, Capture, Session, SessionPhase, Substitutes};
pub use stream::{SharedBuffer, Sink, Source};
pub use termination::{
    ExitSignal, Failure, Outcome, Trigger, DEFAULT_EXIT_CODE, FAILURE_EXIT_CODE, INTERRUPTED_CODE,
};

pub use mockconf::MockConfig;
