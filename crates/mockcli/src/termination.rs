//! Termination detection.
//!
//! A captured program can end three ways: it calls [`process::exit`], it
//! runs out of work (the closure returns, or the future and everything it
//! spawned complete), or it fails (panics, or returns an error). Each of
//! those becomes a call to [`Finalize::finalize`], and only the first one
//! does anything.
//!
//! Panics on threads or tasks the program spawned never reach the program's
//! own call stack. A [`PanicTrap`] installed as the process panic hook
//! records them, and a session that would otherwise drain fails instead.
//!
//! [`process::exit`]: crate::process::exit

use std::any::Any;
use std::fmt;
use std::panic::{self, PanicHookInfo};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::context::ExitHook;
use crate::result::CaptureResult;

/// Code reported by `Session::stop`.
pub const INTERRUPTED_CODE: i32 = 130;

/// Code used when the program exits without one.
pub const DEFAULT_EXIT_CODE: i32 = 0;

/// Code used when the program fails without an explicit code.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// What ended a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The program called `process::exit`.
    Exit,
    /// The program ran out of work.
    Drained,
    /// The program panicked or returned an error.
    Failed,
    /// The session was stopped from outside.
    Interrupted,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trigger::Exit => "exit",
            Trigger::Drained => "drained",
            Trigger::Failed => "failed",
            Trigger::Interrupted => "interrupted",
        })
    }
}

/// Unwind payload thrown by the intercepted exit procedure.
///
/// Code that catches unwinds itself can recognise it with
/// `payload.downcast_ref::<ExitSignal>()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitSignal {
    pub code: i32,
}

/// An uncaught failure of the program under test.
#[derive(Debug, Clone, Error)]
pub enum Failure {
    #[error("program panicked: {0}")]
    Panic(String),

    #[error("program failed: {0:#}")]
    Error(Arc<anyhow::Error>),
}

impl Failure {
    /// Build from a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::from_payload(&*payload)
    }

    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };
        Failure::Panic(message)
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Failure::Panic(_))
    }

    /// The panic message, or the error's message chain.
    pub fn message(&self) -> String {
        match self {
            Failure::Panic(message) => message.clone(),
            Failure::Error(error) => format!("{:#}", error),
        }
    }
}

/// How a session ended: the trigger, the failure if any, and the record.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub trigger: Trigger,
    pub error: Option<Failure>,
    pub result: CaptureResult,
}

/// Result of asking a session to finalize.
#[derive(Debug)]
pub(crate) enum Finalized {
    /// This call tore the session down.
    Now(Outcome),
    /// An earlier trigger already did; this is its outcome.
    Earlier(Outcome),
}

impl Finalized {
    pub(crate) fn into_outcome(self) -> Outcome {
        match self {
            Finalized::Now(outcome) | Finalized::Earlier(outcome) => outcome,
        }
    }
}

/// The single finalize path every trigger funnels into.
pub(crate) trait Finalize: Send + Sync {
    /// Tear down the session and produce its outcome. Only the first call
    /// per session has any effect. When `notify` is set, the completion
    /// callback receives the outcome.
    fn finalize(
        &self,
        trigger: Trigger,
        error: Option<Failure>,
        code: Option<i32>,
        notify: bool,
    ) -> Finalized;
}

/// A process panic hook, as returned by [`panic::take_hook`].
pub(crate) type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Records panics raised anywhere in the process while armed.
///
/// While armed, panics are recorded instead of reported, so nothing reaches
/// the real stderr. Once disarmed it forwards to the hook it displaced.
#[derive(Default)]
pub(crate) struct PanicTrap {
    armed: AtomicBool,
    first: Mutex<Option<Failure>>,
    previous: Mutex<Option<PanicHook>>,
}

impl PanicTrap {
    pub(crate) fn arm(&self, previous: PanicHook) {
        *self.previous.lock().unwrap_or_else(PoisonError::into_inner) = Some(previous);
        self.armed.store(true, Ordering::Release);
    }

    /// Stop recording but keep forwarding to the displaced hook.
    pub(crate) fn disarm_forwarding(&self) {
        self.armed.store(false, Ordering::Release);
    }

    /// Stop recording and hand back the displaced hook, if it is still here.
    pub(crate) fn disarm(&self) -> Option<PanicHook> {
        self.disarm_forwarding();
        self.previous
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Body of the installed panic hook.
    pub(crate) fn report(&self, info: &PanicHookInfo<'_>) {
        if self.armed.load(Ordering::Acquire) {
            if info.payload().is::<ExitSignal>() {
                return;
            }
            let failure = Failure::from_payload(info.payload());
            debug!(location = ?info.location(), error = %failure, "panic recorded by capture session");
            self.first
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get_or_insert(failure);
            return;
        }
        if let Some(previous) = &*self.previous.lock().unwrap_or_else(PoisonError::into_inner) {
            previous(info);
        }
    }

    /// The first panic recorded while armed.
    pub(crate) fn recorded(&self) -> Option<Failure> {
        self.first
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// The final exit code. A failure turns a missing or zero code into 1.
pub(crate) fn resolve_code(error: Option<&Failure>, code: Option<i32>) -> i32 {
    match (error, code) {
        (Some(_), None | Some(0)) => FAILURE_EXIT_CODE,
        (_, Some(code)) => code,
        (None, None) => DEFAULT_EXIT_CODE,
    }
}

/// Exit procedure installed for the lifetime of a session.
///
/// Finalizes the session, then unwinds the calling thread so the program
/// stops where a real exit would have stopped it.
pub(crate) fn intercept_exit(target: Weak<dyn Finalize>) -> ExitHook {
    Arc::new(move |code: Option<i32>| {
        let code = code.unwrap_or(DEFAULT_EXIT_CODE);
        if let Some(session) = target.upgrade() {
            session.finalize(Trigger::Exit, None, Some(code), true);
        }
        trace!(code, "unwinding out of intercepted exit");
        panic::resume_unwind(Box::new(ExitSignal { code }));
    })
}

/// Map the way a program run ended to a finalize request.
pub(crate) fn classify(
    caught: std::thread::Result<anyhow::Result<()>>,
) -> (Trigger, Option<Failure>, Option<i32>) {
    match caught {
        Ok(Ok(())) => (Trigger::Drained, None, Some(DEFAULT_EXIT_CODE)),
        Ok(Err(error)) => (Trigger::Failed, Some(Failure::Error(Arc::new(error))), None),
        Err(payload) => match payload.downcast::<ExitSignal>() {
            Ok(signal) => (Trigger::Exit, None, Some(signal.code)),
            Err(payload) => (Trigger::Failed, Some(Failure::from_panic(payload)), None),
        },
    }
}
