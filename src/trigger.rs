//! Deferred, one-shot reboot into the bootloader.
//!
//! Once submitted, the reboot action waits a short grace period so that
//! in-flight USB transactions and log output can complete, then hands over to
//! the reboot primitive. Submission is debounced: only the first submission
//! ever schedules the action, all the following ones are ignored. There is no
//! way to cancel a submitted reboot.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use log::{error, info};

use crate::settings::Settings;

// =============================================================================
// Public Interface
// =============================================================================

/// The primitive restarting the device into its bootloader.
pub trait RebootPrimitive: Send + Sync {
    /// Restart the device with the given mode code.
    ///
    /// This does not return under normal operation. Returning at all means the
    /// reboot failed.
    fn reboot(&self, mode_code: u32);
}

/// Handle to the debounced reboot action. Clones share the same action, so at
/// most one reboot is ever in flight no matter how many sessions hold a clone.
#[derive(Clone)]
pub struct DeferredReboot {
    inner: Arc<Inner>,
}

struct Inner {
    submitted: AtomicBool,
    delay: Duration,
    reset_code: u32,
    primitive: Arc<dyn RebootPrimitive>,
}

impl DeferredReboot {
    pub fn new(settings: &Settings, primitive: Arc<dyn RebootPrimitive>) -> Self {
        DeferredReboot {
            inner: Arc::new(Inner {
                submitted: AtomicBool::new(false),
                delay: settings.reboot_delay,
                reset_code: settings.reset_code,
                primitive,
            }),
        }
    }

    /// Schedule the reboot action unless it has already been scheduled.
    ///
    /// Returns `true` only for the submission that actually scheduled it.
    pub fn submit(&self) -> bool {
        if self
            .inner
            .submitted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("reboot".into())
            .spawn(move || inner.run());
        if let Err(e) = spawned {
            // Without a thread of its own the action still has to happen; run
            // it in place.
            error!("could not spawn the reboot thread ({}), rebooting inline", e);
            self.inner.run();
        }
        true
    }

    /// Whether a reboot has been submitted.
    pub fn is_pending(&self) -> bool {
        self.inner.submitted.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for DeferredReboot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredReboot")
            .field("pending", &self.is_pending())
            .field("delay", &self.inner.delay)
            .field("reset_code", &self.inner.reset_code)
            .finish()
    }
}

// =============================================================================
// Private stuff
// =============================================================================

impl Inner {
    fn run(&self) {
        thread::sleep(self.delay);
        info!("rebooting into bootloader (mode {:#04x})", self.reset_code);
        self.primitive.reboot(self.reset_code);
        error!(
            "reboot primitive returned, device is still running (mode {:#04x})",
            self.reset_code
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
