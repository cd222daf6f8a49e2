//! Platform registration.
//!
//! External collaborators register exactly one [`Platform`] per boot: the
//! ordered component list, the retained-memory window, the wake-IRQ
//! reader/classifier, and the optional early-diagnostic descriptor. The
//! engine owns nothing chip-specific itself.
//!
//! Registration is guarded by an atomic flag (one in-flight engine per
//! process lifetime); a second attempt fails with
//! `ConfigError::AlreadyRegistered`. [`crate::suspend::Orchestrator::new`]
//! stays guard-free so the state machine can be driven in unit tests.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use poketable::Mmio;

use crate::component::Component;
use crate::diag::{self, DiagConfig};
use crate::hom::HomConfig;
use crate::image::RetainedWindow;
use crate::suspend::{Orchestrator, TransitionOps};
use crate::wake::{WakeClassifier, WakeIrq};

/// Registration / assembly-time configuration errors. Detected
/// synchronously; no partial state is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A Platform is already registered in this process.
    AlreadyRegistered,
    /// Assembled image does not fit the retained-memory window.
    WindowTooSmall { need: usize, have: usize },
    /// The retained window could not be resolved to physical memory.
    MapFailed,
}

/// Everything the engine needs from the chip, registered once at boot.
pub struct Platform {
    pub components: Vec<Box<dyn Component>>,
    pub wake_irq: Box<dyn WakeIrq>,
    pub classify: WakeClassifier,
    pub window: RetainedWindow,
    /// Relocatable interpreter blob laid at the head of every image.
    pub interp: &'static [u32],
    /// Early-diagnostic UART, if the board wires one.
    pub diag: Option<DiagConfig>,
    /// Hibernation-on-memory contract, if the firmware supports it.
    pub hom: Option<HomConfig>,
}

static REGISTERED: AtomicBool = AtomicBool::new(false);

/// Register the Platform and build the process-wide orchestrator.
///
/// `ops` is the arch transition implementation and `bus` the MMIO access
/// used for the firmware marker region.
pub fn register(
    platform: Platform,
    ops: Box<dyn TransitionOps>,
    bus: Box<dyn Mmio>,
) -> Result<Orchestrator, ConfigError> {
    if REGISTERED
        .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
        .is_err()
    {
        return Err(ConfigError::AlreadyRegistered);
    }

    if let Some(cfg) = &platform.diag {
        // Diagnostics come up first so a wedged first suspend still says
        // something on the wire.
        unsafe { diag::init(cfg) };
    }

    Ok(Orchestrator::new(platform, ops, bus))
}

#[cfg(test)]
pub(crate) fn reset_registration_for_tests() {
    REGISTERED.store(false, Ordering::Release);
}
