//! Suspend orchestrator.
//!
//! Top-level state machine driving one suspend attempt:
//!
//! ```text
//! Idle → Begin → (PrepareImage) → Enter → WaitForWake → ClassifyWake
//!                                   ▲                        │
//!                                   └──────── Early ─────────┤
//!                                                        Genuine
//!                                                            ▼
//!                            Idle ← End ← PostEnter ─────────┘
//! ```
//!
//! The machine is an enum with a pure transition function, driven by a
//! structured loop that branches on the wake classification, never by
//! unstructured control transfer. It never exits except through `End`;
//! the one exception is a `begin`/`pre_enter` failure, which rolls back
//! and returns with the system still fully running (no transition
//! happened).
//!
//! Exactly one core drives the transition; any other cores must already
//! be parked before `Enter`; that is an external precondition, not
//! enforced here. Interrupts stay masked except inside `WaitForWake`
//! (`TransitionOps::core_idle` unmasks, waits, re-masks).

use alloc::boxed::Box;

use poketable::Mmio;

use crate::component::{ComponentError, PowerState};
use crate::context::{FrozenContext, TranslationState};
use crate::diag;
use crate::image::{assemble_into, ImageDescriptor, RetainedWindow};
use crate::platform::{ConfigError, Platform};
use crate::wake::{WakeEvent, WakeKind};

/// Orchestrator states. `Idle` is both initial and terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Begin,
    PrepareImage,
    Enter,
    WaitForWake,
    ClassifyWake,
    PostEnter,
    End,
}

impl Phase {
    /// Pure transition function. `wake` is meaningful only out of
    /// `ClassifyWake`: `Early` loops back to `Enter`, `Genuine` proceeds.
    pub fn next(self, level: PowerState, wake: Option<WakeKind>) -> Phase {
        match self {
            Phase::Idle => Phase::Begin,
            Phase::Begin => {
                if level.needs_image() {
                    Phase::PrepareImage
                } else {
                    Phase::Enter
                }
            }
            Phase::PrepareImage => Phase::Enter,
            Phase::Enter => Phase::WaitForWake,
            Phase::WaitForWake => Phase::ClassifyWake,
            Phase::ClassifyWake => match wake {
                Some(WakeKind::Early) => Phase::Enter,
                _ => Phase::PostEnter,
            },
            Phase::PostEnter => Phase::End,
            Phase::End => Phase::Idle,
        }
    }
}

/// One suspend attempt's failure modes. Hardware hangs and resume-marker
/// mismatches are deliberately not represented: the former never returns
/// and the latter never reaches this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendError {
    /// A component refused in `begin`/`pre_enter`; rollback already ran.
    Lifecycle(ComponentError),
    /// Image assembly failed; nothing was entered.
    Config(ConfigError),
    /// The Platform registered no hibernation contract.
    Unsupported,
}

impl From<ConfigError> for SuspendError {
    fn from(e: ConfigError) -> Self {
        SuspendError::Config(e)
    }
}

/// Arch seam: the handful of privileged operations the orchestrator
/// sequences but cannot express portably. Hardware implementation lives
/// in `arch`; tests drive the machine with a recording mock.
pub trait TransitionOps {
    /// Clean+invalidate every cache level that could hold dirty data.
    fn flush_caches(&mut self);

    /// Switch the active translation to the identity/transitional
    /// mapping, returning what `restore_mapping` needs.
    fn enter_transitional_mapping(&mut self) -> TranslationState;

    /// Undo `enter_transitional_mapping`.
    fn restore_mapping(&mut self, saved: TranslationState);

    /// Jump into the relocated interpreter over the assembled
    /// enter-table. Returns when the table's `End` retires.
    fn run_enter_table(&mut self, desc: &ImageDescriptor);

    /// Same, over the exit-table: walks the hardware back up after a
    /// genuine wake, before translation is restored.
    fn run_exit_table(&mut self, desc: &ImageDescriptor);

    /// Unmask interrupts, halt the core until one arrives, re-mask.
    fn core_idle(&mut self);

    /// Capture the CPU/translation context for hibernation.
    fn freeze_context(&mut self) -> FrozenContext;

    /// Hibernation terminal step: run the enter-table, then halt. On
    /// hardware this does not return; execution resumes through the
    /// firmware/trampoline handshake. Mocks return to let tests and
    /// simulated resumes unwind.
    fn enter_hibernate(&mut self, desc: &ImageDescriptor);

    /// Called after the image is assembled and before the firmware
    /// marker is armed. The aarch64 implementation patches the resume
    /// trampoline's window-base literal; software mocks need nothing.
    fn prepare_resume(&mut self, window: &RetainedWindow, desc: &ImageDescriptor) {
        let _ = (window, desc);
    }
}

/// The process-wide transition engine. One instance, created at boot by
/// [`crate::platform::register`], never duplicated.
pub struct Orchestrator {
    pub(crate) platform: Platform,
    pub(crate) ops: Box<dyn TransitionOps>,
    pub(crate) bus: Box<dyn Mmio>,
    pub(crate) phase: Phase,
}

impl Orchestrator {
    /// Build an orchestrator without touching the global registration
    /// guard. Unit tests drive the machine through this.
    pub fn new(platform: Platform, ops: Box<dyn TransitionOps>, bus: Box<dyn Mmio>) -> Self {
        Self {
            platform,
            ops,
            bus,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run `begin` on every component in registration order. On the first
    /// failure, run `end` on everything that already succeeded, in
    /// reverse order, and surface that error unchanged. Shared with the
    /// hibernate entry sequence in `hom`.
    pub(crate) fn begin_components(&mut self, level: PowerState) -> Result<(), ComponentError> {
        let wake = self.platform.wake_irq.sources();
        let comps = &mut self.platform.components;
        for k in 0..comps.len() {
            if let Err(e) = comps[k].begin(level, &wake) {
                diag::puts("[PM] begin refused by ");
                diag::puts(comps[k].name());
                diag::puts("\n");
                for rolled in comps[..k].iter_mut().rev() {
                    rolled.end(level);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Same contract as [`Self::begin_components`], for `pre_enter`.
    pub(crate) fn pre_enter_components(&mut self, level: PowerState) -> Result<(), ComponentError> {
        let comps = &mut self.platform.components;
        for k in 0..comps.len() {
            if let Err(e) = comps[k].pre_enter(level) {
                for rolled in comps[..k].iter_mut().rev() {
                    rolled.end(level);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Drive one full suspend attempt. Returns the genuine wake event, or
    /// the lifecycle/configuration error after rollback.
    pub fn suspend(&mut self, level: PowerState) -> Result<WakeEvent, SuspendError> {
        let mut desc: Option<ImageDescriptor> = None;
        let mut saved: Option<TranslationState> = None;
        // Overwritten in ClassifyWake before any use.
        let mut event = WakeEvent {
            irq: 0,
            kind: WakeKind::Genuine,
        };

        self.phase = Phase::Idle.next(level, None);
        loop {
            match self.phase {
                Phase::Idle => break,
                Phase::Begin => {
                    diag::puts("[PM] suspend: begin\n");
                    if let Err(e) = self.begin_components(level) {
                        self.phase = Phase::Idle;
                        return Err(SuspendError::Lifecycle(e));
                    }
                    if let Err(e) = self.pre_enter_components(level) {
                        self.phase = Phase::Idle;
                        return Err(SuspendError::Lifecycle(e));
                    }
                }
                Phase::PrepareImage => {
                    let d = assemble_into(
                        &self.platform.window,
                        self.platform.interp,
                        &self.platform.components,
                        None,
                    );
                    match d {
                        Ok(d) => desc = Some(d),
                        Err(e) => {
                            // Assembly failed before any hardware state
                            // changed; unwind the lifecycle and report.
                            for c in self.platform.components.iter_mut().rev() {
                                c.end(level);
                            }
                            self.phase = Phase::Idle;
                            return Err(SuspendError::Config(e));
                        }
                    }
                }
                Phase::Enter => {
                    // Shallow levels keep memory and translation live and
                    // go straight to core-idle.
                    if level.needs_image() {
                        self.ops.flush_caches();
                        if saved.is_none() {
                            saved = Some(self.ops.enter_transitional_mapping());
                        }
                        if let Some(d) = &desc {
                            self.ops.run_enter_table(d);
                        }
                    }
                }
                Phase::WaitForWake => {
                    self.ops.core_idle();
                }
                Phase::ClassifyWake => {
                    let irq = self.platform.wake_irq.pending();
                    let kind = (self.platform.classify)(irq);
                    self.platform.wake_irq.ack(irq);
                    event = WakeEvent { irq, kind };
                }
                Phase::PostEnter => {
                    // Walk the hardware back up while still on the
                    // transitional mapping, then restore translation.
                    if let Some(d) = &desc {
                        self.ops.run_exit_table(d);
                    }
                    if let Some(s) = saved.take() {
                        self.ops.restore_mapping(s);
                    }
                    for c in self.platform.components.iter_mut().rev() {
                        c.post_enter(level);
                    }
                }
                Phase::End => {
                    for c in self.platform.components.iter_mut().rev() {
                        c.end(level);
                    }
                    diag::puts("[PM] suspend: woke, irq ");
                    diag::put_hex32(event.irq);
                    diag::puts("\n");
                }
            }
            self.phase = self.phase.next(level, Some(event.kind));
        }
        Ok(event)
    }
}
