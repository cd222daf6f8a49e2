//! Wake classification.
//!
//! The interrupt that ends a low-power wait is not always a reason to
//! resume: a periodic housekeeping interrupt must put the core straight
//! back to sleep. The Platform supplies a pure classifier; the engine has
//! no policy of its own and simply trusts it.

/// Is this wake a reason to resume normal execution?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeKind {
    /// Resume normal execution.
    Genuine,
    /// Ignore and re-enter the low-power sequence.
    Early,
}

/// A classified wake: the raw interrupt id plus the classifier's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeEvent {
    pub irq: u32,
    pub kind: WakeKind,
}

/// Platform-supplied pure classifier.
pub type WakeClassifier = fn(u32) -> WakeKind;

/// Interrupt-controller seam: read the pending wake id, acknowledge it,
/// and report which sources are armed. Driver internals beyond this are
/// outside the engine.
pub trait WakeIrq {
    /// Snapshot of the wake sources relevant to the next attempt.
    fn sources(&mut self) -> crate::component::WakeSources;

    /// Pending/acknowledged interrupt id after a wake.
    fn pending(&mut self) -> u32;

    /// Acknowledge `irq` so the controller can signal the next wake.
    fn ack(&mut self, irq: u32);
}
