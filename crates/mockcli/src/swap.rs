//! Argument list, exit procedure and panic hook swapping.

use std::panic;
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use crate::context::{context, ExitHook};
use crate::termination::PanicTrap;

/// The argument list and exit procedure a session displaced. The displaced
/// panic hook is parked in the trap.
pub(crate) struct SavedGlobals {
    args: Arc<[String]>,
    exit: ExitHook,
    trap: Arc<PanicTrap>,
}

impl SavedGlobals {
    /// Install `args`, `exit` and `trap` as the panic hook, keeping the
    /// originals.
    pub(crate) fn install(args: Arc<[String]>, exit: ExitHook, trap: Arc<PanicTrap>) -> Self {
        let ctx = context();
        debug!(argc = args.len(), "swapping argument list, exit procedure and panic hook");

        // take_hook and set_hook panic on a panicking thread.
        if thread::panicking() {
            warn!("activated while panicking, panic hook left in place");
        } else {
            trap.arm(panic::take_hook());
            let hook_trap = Arc::clone(&trap);
            panic::set_hook(Box::new(move |info| hook_trap.report(info)));
        }

        Self {
            args: ctx.replace_args(args),
            exit: ctx.replace_exit_hook(exit),
            trap,
        }
    }

    /// Put the originals back, whatever the program did to the slots meanwhile.
    pub(crate) fn restore(self) {
        let ctx = context();
        ctx.replace_args(self.args);
        ctx.replace_exit_hook(self.exit);

        if thread::panicking() {
            // The trap stays installed but forwards to the displaced hook.
            self.trap.disarm_forwarding();
            debug!("argument list and exit procedure restored, panic hook forwarding");
            return;
        }
        if let Some(previous) = self.trap.disarm() {
            panic::set_hook(previous);
        }
        debug!("argument list, exit procedure and panic hook restored");
    }
}
