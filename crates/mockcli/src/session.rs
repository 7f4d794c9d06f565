//! Activation and teardown of capture sessions.
//!
//! A session moves through `Active`, `Finalizing` and `Finished`. Activation
//! swaps the argument list, exit procedure and the three stdio slots of the
//! process context; finalize puts every one of them back before anyone sees
//! the result. At most one session is active per process.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::FutureExt;
use tokio::task::LocalSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mockconf::{BannerConfig, MockConfig};

use crate::banner;
use crate::context::{context, OutputChannel};
use crate::error::CaptureError;
use crate::result::CaptureResult;
use crate::stream::{InputGuard, OutputGuard, Sink, Source, Transcript};
use crate::swap::SavedGlobals;
use crate::termination::{
    classify, intercept_exit, resolve_code, ExitSignal, Failure, Finalize, Finalized, Outcome,
    PanicTrap, Trigger, INTERRUPTED_CODE,
};

static ACTIVE: AtomicBool = AtomicBool::new(false);

/// Whether a capture session is active in this process.
pub fn is_active() -> bool {
    ACTIVE.load(Ordering::Acquire)
}

/// Completion callback: receives the failure, if any, and the record.
pub type Callback = Box<dyn FnOnce(Option<Failure>, CaptureResult) + Send>;

/// Per-channel stand-ins for a session.
///
/// A channel left as `None` is still captured. Output on it is suppressed
/// from the console and input on it is empty.
#[derive(Debug, Default)]
pub struct Substitutes {
    pub stdin: Option<Source>,
    pub stdout: Option<Sink>,
    pub stderr: Option<Sink>,
}

/// Builder for a capture session.
///
/// ```rust,no_run
/// use mockcli::{process, Capture, SharedBuffer, Sink};
///
/// let out = SharedBuffer::new();
/// let session = Capture::new()
///     .args(["greet", "world"])
///     .stdout(Sink::buffer(&out))
///     .activate()
///     .expect("no other capture running");
///
/// let outcome = session
///     .run(|| {
///         let args = process::args();
///         mockcli::cli_println!("Hello, {}!", args[1]);
///         process::exit(0)
///     })
///     .expect("session still active");
///
/// assert_eq!(outcome.result.stdout, "Hello, world!\n");
/// ```
#[derive(Default)]
pub struct Capture {
    args: Option<Vec<String>>,
    substitutes: Substitutes,
    on_complete: Option<Callback>,
    config: Option<MockConfig>,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Argument list seen by the program. Defaults to the current one.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn stdin(mut self, source: Source) -> Self {
        self.substitutes.stdin = Some(source);
        self
    }

    pub fn stdout(mut self, sink: Sink) -> Self {
        self.substitutes.stdout = Some(sink);
        self
    }

    pub fn stderr(mut self, sink: Sink) -> Self {
        self.substitutes.stderr = Some(sink);
        self
    }

    /// Replace all three channel substitutes at once.
    pub fn substitutes(mut self, substitutes: Substitutes) -> Self {
        self.substitutes = substitutes;
        self
    }

    /// Called once with the outcome when the program exits, drains or fails.
    /// Not called by [`Session::stop`].
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Option<Failure>, CaptureResult) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Use `config` instead of loading it from files and environment.
    pub fn config(mut self, config: MockConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Swap in the substitutes and start capturing.
    ///
    /// Fails with [`CaptureError::AlreadyActive`] before touching anything
    /// if another session is active.
    pub fn activate(self) -> Result<Session, CaptureError> {
        self.activate_with(load_config)
    }

    fn activate_with(self, load: impl FnOnce() -> MockConfig) -> Result<Session, CaptureError> {
        let claim = ActiveClaim::acquire()?;
        let config = match self.config {
            Some(config) => config,
            None => load(),
        };

        let id = Uuid::new_v4();
        let ctx = context();
        let args: Arc<[String]> = match self.args {
            Some(args) => args.into(),
            None => ctx.args(),
        };

        let Substitutes {
            stdin,
            stdout,
            stderr,
        } = self.substitutes;

        let banner = match stdout {
            Some(Sink::Console) if config.banner.enabled => Some(config.banner),
            _ => None,
        };
        if let Some(banner_config) = &banner {
            banner::write_start(&*ctx.output(OutputChannel::Stdout), banner_config);
        }

        let transcripts = Transcripts::default();
        let trap = Arc::new(PanicTrap::default());
        info!(session = %id, argc = args.len(), banner = banner.is_some(), "capture session activated");

        let inner = Arc::new_cyclic(|weak: &Weak<SessionInner>| {
            let target: Weak<dyn Finalize> = weak.clone();
            let installed = Installed {
                stdin: InputGuard::install(stdin, Arc::clone(&transcripts.stdin)),
                stdout: OutputGuard::install(
                    OutputChannel::Stdout,
                    stdout,
                    Arc::clone(&transcripts.stdout),
                ),
                stderr: OutputGuard::install(
                    OutputChannel::Stderr,
                    stderr,
                    Arc::clone(&transcripts.stderr),
                ),
                globals: SavedGlobals::install(args, intercept_exit(target), Arc::clone(&trap)),
            };

            SessionInner {
                id,
                banner,
                transcripts,
                trap,
                state: Mutex::new(State::Active(Box::new(installed))),
                on_complete: Mutex::new(self.on_complete),
            }
        });

        // From here on teardown clears the flag.
        claim.keep();
        Ok(Session { inner })
    }
}

/// Ownership of the `ACTIVE` flag during activation. Released on drop
/// unless kept.
struct ActiveClaim {
    kept: bool,
}

impl ActiveClaim {
    fn acquire() -> Result<Self, CaptureError> {
        ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self { kept: false })
            .map_err(|_| CaptureError::AlreadyActive)
    }

    fn keep(mut self) {
        self.kept = true;
    }
}

impl Drop for ActiveClaim {
    fn drop(&mut self) {
        if !self.kept {
            ACTIVE.store(false, Ordering::Release);
        }
    }
}

impl fmt::Debug for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capture")
            .field("args", &self.args)
            .field("substitutes", &self.substitutes)
            .field("on_complete", &self.on_complete.is_some())
            .field("config", &self.config)
            .finish()
    }
}

/// Activate with optional argument list, substitutes and completion callback.
pub fn activate(
    args: Option<Vec<String>>,
    substitutes: Option<Substitutes>,
    on_complete: Option<Callback>,
) -> Result<Session, CaptureError> {
    let mut capture = Capture::new();
    capture.args = args;
    capture.substitutes = substitutes.unwrap_or_default();
    capture.on_complete = on_complete;
    capture.activate()
}

fn load_config() -> MockConfig {
    MockConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "failed to load mockcli config, using defaults");
        MockConfig::default()
    })
}

/// Where a session is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Active,
    Finalizing,
    Finished,
}

/// A live capture. Dropping it while active stops it.
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn phase(&self) -> SessionPhase {
        match &*self.inner.lock_state() {
            State::Active(_) => SessionPhase::Active,
            State::Finalizing => SessionPhase::Finalizing,
            State::Finished(_) => SessionPhase::Finished,
        }
    }

    /// Tear the session down now and return what was captured, with code
    /// 130. The completion callback is not called.
    ///
    /// Fails with [`CaptureError::SessionClosed`] if the program already
    /// finished the session.
    pub fn stop(self) -> Result<CaptureResult, CaptureError> {
        match self
            .inner
            .finalize(Trigger::Interrupted, None, Some(INTERRUPTED_CODE), false)
        {
            Finalized::Now(outcome) => Ok(outcome.result),
            Finalized::Earlier(_) => Err(CaptureError::SessionClosed(self.inner.id)),
        }
    }

    /// Run a synchronous program inside the session.
    ///
    /// The session finishes when the program calls
    /// [`process::exit`](crate::process::exit), returns, panics or returns
    /// an error, whichever comes first. A program that returns after a
    /// thread it spawned panicked fails with that panic. Panics raised after
    /// the session finished are not captured and keep unwinding.
    pub fn run<F>(&self, program: F) -> Result<Outcome, CaptureError>
    where
        F: FnOnce() -> anyhow::Result<()>,
    {
        self.ensure_active()?;
        let caught = panic::catch_unwind(AssertUnwindSafe(program));
        Ok(self.conclude(caught))
    }

    /// Run an asynchronous program inside the session.
    ///
    /// The program runs on a [`LocalSet`], so it may `spawn_local` further
    /// tasks. Returning `Ok(())` only drains the session once every spawned
    /// task has completed too. If a spawned task panicked meanwhile, the
    /// session fails with that panic instead of draining.
    ///
    /// Must be awaited from within a tokio runtime.
    pub async fn run_async<F, Fut>(&self, program: F) -> Result<Outcome, CaptureError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        self.ensure_active()?;
        let tasks = LocalSet::new();
        let caught = tasks
            .run_until(AssertUnwindSafe(async move { program().await }).catch_unwind())
            .await;

        if matches!(caught, Ok(Ok(()))) {
            debug!(session = %self.inner.id, "program returned, waiting for spawned tasks");
            tasks.await;
        }
        Ok(self.conclude(caught))
    }

    fn ensure_active(&self) -> Result<(), CaptureError> {
        match self.phase() {
            SessionPhase::Active => Ok(()),
            _ => Err(CaptureError::SessionClosed(self.inner.id)),
        }
    }

    fn conclude(&self, caught: std::thread::Result<anyhow::Result<()>>) -> Outcome {
        let caught = match caught {
            Err(payload) if !payload.is::<ExitSignal>() && self.phase() == SessionPhase::Finished => {
                // Nothing is capturing any more.
                panic::resume_unwind(payload)
            }
            caught => caught,
        };
        let (trigger, error, code) = match classify(caught) {
            (Trigger::Drained, None, code) => match self.inner.trap.recorded() {
                Some(failure) => (Trigger::Failed, Some(failure), None),
                None => (Trigger::Drained, None, code),
            },
            classified => classified,
        };
        self.inner.finalize(trigger, error, code, true).into_outcome()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("phase", &self.phase())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Finalized::Now(outcome) =
            self.inner
                .finalize(Trigger::Interrupted, None, Some(INTERRUPTED_CODE), false)
        {
            warn!(
                session = %self.inner.id,
                stdout_bytes = outcome.result.stdout.len(),
                "capture session dropped while active, stopped it"
            );
        }
    }
}

#[derive(Debug, Default)]
struct Transcripts {
    stdin: Arc<Transcript>,
    stdout: Arc<Transcript>,
    stderr: Arc<Transcript>,
}

/// Everything activation swapped in, with the originals it displaced.
struct Installed {
    globals: SavedGlobals,
    stdin: InputGuard,
    stdout: OutputGuard,
    stderr: OutputGuard,
}

enum State {
    Active(Box<Installed>),
    Finalizing,
    Finished(Outcome),
}

struct SessionInner {
    id: Uuid,
    /// Set when stdout is relayed to the console with banners on.
    banner: Option<BannerConfig>,
    transcripts: Transcripts,
    /// Panics raised off the program's own call stack.
    trap: Arc<PanicTrap>,
    state: Mutex<State>,
    on_complete: Mutex<Option<Callback>>,
}

impl SessionInner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, code: i32) -> CaptureResult {
        CaptureResult::new(
            code,
            self.transcripts.stdin.text(),
            self.transcripts.stdout.text(),
            self.transcripts.stderr.text(),
        )
    }

    fn teardown(&self, installed: Installed) {
        let Installed {
            globals,
            stdin,
            stdout,
            stderr,
        } = installed;

        stdin.restore();
        stderr.restore();
        let console = stdout.restore();
        globals.restore();

        if let Some(banner_config) = &self.banner {
            banner::write_end(&*console, banner_config);
        }
        ACTIVE.store(false, Ordering::Release);
    }
}

impl Finalize for SessionInner {
    fn finalize(
        &self,
        trigger: Trigger,
        error: Option<Failure>,
        code: Option<i32>,
        notify: bool,
    ) -> Finalized {
        let mut state = self.lock_state();
        match std::mem::replace(&mut *state, State::Finalizing) {
            State::Active(installed) => self.teardown(*installed),
            State::Finished(outcome) => {
                *state = State::Finished(outcome.clone());
                debug!(session = %self.id, %trigger, "session already finished");
                return Finalized::Earlier(outcome);
            }
            State::Finalizing => {
                // An earlier teardown unwound part way through.
                warn!(session = %self.id, %trigger, "finalize found an interrupted teardown");
                ACTIVE.store(false, Ordering::Release);
                let outcome = Outcome {
                    trigger,
                    error: None,
                    result: self.record(resolve_code(None, code)),
                };
                *state = State::Finished(outcome.clone());
                return Finalized::Earlier(outcome);
            }
        }

        let code = resolve_code(error.as_ref(), code);
        let outcome = Outcome {
            trigger,
            error,
            result: self.record(code),
        };
        *state = State::Finished(outcome.clone());
        drop(state);

        match &outcome.error {
            Some(failure) => {
                info!(session = %self.id, %trigger, code, error = %failure, "capture session finished")
            }
            None => info!(session = %self.id, %trigger, code, "capture session finished"),
        }

        if notify {
            let callback = self
                .on_complete
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(callback) = callback {
                callback(outcome.error.clone(), outcome.result.clone());
            }
        }

        Finalized::Now(outcome)
    }
}
