//! Hibernation-on-memory orchestration.
//!
//! The deeper power level: main memory in self-refresh *and* CPU and
//! translation state lost. On top of the suspend sequence this adds a
//! frozen CPU context, a firmware marker handshake, and a resume
//! trampoline laid into the image:
//!
//! 1. Freeze translation bases, translation control and the stack
//!    pointer into the retained window, where the trampoline can reach
//!    them with translation off.
//! 2. Assemble the image with the resume trampoline appended.
//! 3. Arm the marker region: signature plus the physical address of the
//!    trampoline. The boot firmware checks this on every power-up.
//! 4. Flush, drop to the transitional mapping, run the enter table, halt.
//!
//! On resume the firmware finds the marker and jumps to the trampoline,
//! which restores translation state from the frozen context *before any
//! other code runs*, disarms the marker, and continues up the saved
//! stack, so from the caller's point of view, `hibernate` simply
//! returns. A marker mismatch on what firmware believes is a resume is
//! fatal here; the firmware's cold-boot fallback takes over.

use crate::image::{self, assemble_into};
use crate::marker;
use crate::suspend::{Orchestrator, SuspendError};
use crate::component::PowerState;
use crate::context::CONTEXT_WORDS;

/// The per-board hibernation contract, registered with the Platform.
#[derive(Debug, Clone, Copy)]
pub struct HomConfig {
    /// Physical base of the firmware marker region.
    pub marker_base: u32,
    /// Relocatable resume trampoline, appended to the image.
    pub resume_code: &'static [u32],
    /// Virtual address the trampoline branches to once translation is
    /// back; recorded in the image descriptor.
    pub continuation: u32,
}

impl Orchestrator {
    /// Drive one hibernation attempt. Returns after a firmware-mediated
    /// resume, or with an error (after rollback) if the attempt never
    /// left normal execution.
    pub fn hibernate(&mut self) -> Result<(), SuspendError> {
        let hom = match self.platform.hom {
            Some(h) => h,
            None => return Err(SuspendError::Unsupported),
        };
        let level = PowerState::MemRetained;

        crate::pm_dbg!("hom: begin");
        if let Err(e) = self.begin_components_for_hom(level) {
            return Err(SuspendError::Lifecycle(e));
        }

        // Freeze CPU/translation context where the trampoline can read
        // it with translation off.
        let ctx = self.ops.freeze_context();
        let mut words = [0u32; CONTEXT_WORDS];
        ctx.encode_into(&mut words);
        image::store_context(&self.platform.window, &words);

        let desc = match assemble_into(
            &self.platform.window,
            self.platform.interp,
            &self.platform.components,
            Some(hom.resume_code),
        ) {
            Ok(d) => d,
            Err(e) => {
                for c in self.platform.components.iter_mut().rev() {
                    c.end(level);
                }
                return Err(SuspendError::Config(e));
            }
        };
        image::set_continuation(&self.platform.window, hom.continuation);
        self.ops.prepare_resume(&self.platform.window, &desc);

        // Arm the firmware handshake last: from here on, a reset is a
        // resume.
        marker::write(self.bus.as_mut(), hom.marker_base, desc.resume_base);

        self.ops.flush_caches();
        let saved = self.ops.enter_transitional_mapping();
        self.ops.enter_hibernate(&desc);

        // Resume path: the trampoline already restored translation and
        // brought us back up the saved stack. Disarm the marker before
        // anything else so an unrelated reset stays a cold boot, then
        // walk the hardware back up and drop the transitional mapping.
        marker::clear(self.bus.as_mut(), hom.marker_base);
        self.ops.run_exit_table(&desc);
        self.ops.restore_mapping(saved);
        for c in self.platform.components.iter_mut().rev() {
            c.post_enter(level);
        }
        for c in self.platform.components.iter_mut().rev() {
            c.end(level);
        }
        crate::pm_dbg!("hom: resumed");
        Ok(())
    }

    /// `begin` + `pre_enter` with the standard rollback contract.
    fn begin_components_for_hom(
        &mut self,
        level: PowerState,
    ) -> Result<(), crate::component::ComponentError> {
        self.begin_components(level)?;
        self.pre_enter_components(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FrozenContext;
    use crate::image::{RetainedWindow, CONTEXT_OFF};
    use crate::platform::Platform;
    use crate::suspend::testutil::{classify, new_log, MockOps, Probe, ScriptedIrq, INTERP_STUB};
    use alloc::boxed::Box;
    use poketable::Mmio;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    /// Bus whose state outlives the orchestrator, for post-hoc asserts.
    #[derive(Clone, Default)]
    struct SharedBus {
        regs: Rc<RefCell<HashMap<u32, u32>>>,
        writes: Rc<RefCell<Vec<(u32, u32)>>>,
    }

    impl Mmio for SharedBus {
        fn read32(&mut self, addr: u32) -> u32 {
            self.regs.borrow().get(&addr).copied().unwrap_or(0)
        }
        fn write32(&mut self, addr: u32, val: u32) {
            self.regs.borrow_mut().insert(addr, val);
            self.writes.borrow_mut().push((addr, val));
        }
    }

    const MARKER_BASE: u32 = 0x8060_0000;
    const RESUME: &[u32] = &[0xE5E5_0001, 0xE5E5_0002, 0xE5E5_0003];

    fn hom_orchestrator(
        buf: &mut Vec<u32>,
        with_hom: bool,
        log: &crate::suspend::testutil::CallLog,
        bus: SharedBus,
    ) -> Orchestrator {
        let window = unsafe { RetainedWindow::from_raw(0x0180_0000, buf.as_mut_ptr(), buf.len()) };
        let platform = Platform {
            components: vec![Box::new(Probe::new("c0", log))],
            wake_irq: Box::new(ScriptedIrq {
                queue: Default::default(),
                acked: vec![],
            }),
            classify,
            window,
            interp: INTERP_STUB,
            diag: None,
            hom: if with_hom {
                Some(HomConfig {
                    marker_base: MARKER_BASE,
                    resume_code: RESUME,
                    continuation: 0xC010_0000,
                })
            } else {
                None
            },
        };
        Orchestrator::new(platform, Box::new(MockOps { log: log.clone() }), Box::new(bus))
    }

    #[test]
    fn test_unsupported_without_contract() {
        let log = new_log();
        let mut buf = vec![0u32; 64];
        let mut orch = hom_orchestrator(&mut buf, false, &log, SharedBus::default());
        assert_eq!(orch.hibernate(), Err(SuspendError::Unsupported));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_hibernate_sequence() {
        let log = new_log();
        let bus = SharedBus::default();
        let mut buf = vec![0u32; 64];
        let mut orch = hom_orchestrator(&mut buf, true, &log, bus.clone());

        orch.hibernate().unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                "c0.begin",
                "c0.pre_enter",
                "ops.freeze",
                "ops.flush",
                "ops.map",
                "ops.hibernate",
                "ops.run_exit",
                "ops.restore",
                "c0.post_enter",
                "c0.end",
            ]
        );

        // Frozen context was stored at its reserved offset (MockOps
        // freezes a known pattern).
        let expect = {
            let mut w = [0u32; CONTEXT_WORDS];
            FrozenContext {
                ttbr0: 0x11,
                ttbr1: 0x22,
                tcr: 0x33,
                sp: 0x44,
                debug_step: 0,
            }
            .encode_into(&mut w);
            w
        };
        assert_eq!(&buf[CONTEXT_OFF..CONTEXT_OFF + CONTEXT_WORDS], &expect);

        // Marker was armed with the resume trampoline's physical base,
        // then disarmed on resume.
        let writes = bus.writes.borrow();
        let armed = writes
            .iter()
            .find(|(addr, val)| *addr == MARKER_BASE && *val != 0)
            .expect("marker never armed");
        assert_eq!(armed.1, marker::SIGNATURE[0]);
        let vec_write = writes
            .iter()
            .find(|(addr, val)| *addr == MARKER_BASE + 0xC && *val != 0)
            .expect("resume vector never recorded");
        // Resume code really is at that physical address in the window.
        let off = ((vec_write.1 - 0x0180_0000) / 4) as usize;
        assert_eq!(&buf[off..off + RESUME.len()], RESUME);

        // Disarmed now.
        let mut check = bus.clone();
        assert!(!marker::matches(&mut check, MARKER_BASE));
    }

    #[test]
    fn test_hibernate_window_too_small_unwinds() {
        let log = new_log();
        let mut buf = vec![0u32; 16];
        let bus = SharedBus::default();
        let mut orch = hom_orchestrator(&mut buf, true, &log, bus.clone());

        assert!(matches!(
            orch.hibernate(),
            Err(SuspendError::Config(_))
        ));
        assert_eq!(log.borrow().last().map(|s| s.as_str()), Some("c0.end"));
        // Never armed the marker.
        assert!(bus.writes.borrow().is_empty());
    }
}
