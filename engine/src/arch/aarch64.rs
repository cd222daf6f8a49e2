//! aarch64 backend: the relocatable interpreter, the resume
//! trampoline, and the hardware [`TransitionOps`].
//!
//! # The interpreter blob
//!
//! `__somnus_interp_start..end` is a self-contained routine with no
//! literal pool and no absolute references, so copying its words
//! anywhere executable yields a working copy. It takes the physical
//! address of a poke table in `w0` and retires instructions until an
//! `End` tag (or any word outside the tag band, which it treats the
//! same way) sends it back through `ret`.
//!
//! # The resume trampoline
//!
//! `__somnus_resume_start..end` is what the firmware jumps to on a
//! warm reset when the marker matches. It runs with translation off at
//! the physical resume vector, finds the retained window through a
//! patched literal at its tail, restores the frozen translation
//! registers and stack, switches the MMU back on and branches to the
//! continuation. The restored tables must identity-map the window and
//! the trampoline itself or the switch-on strands the PC.

use core::arch::{asm, global_asm};
use core::ptr::addr_of;

use crate::context::{FrozenContext, TranslationState};
use crate::image::{ImageDescriptor, RetainedWindow};
use crate::suspend::TransitionOps;

// ═════════════════════════════════════════════════════════════════════
// Interpreter blob
// ═════════════════════════════════════════════════════════════════════

global_asm!(
    r#"
    .section .text
    .balign 4
    .global __somnus_interp_start
    .global __somnus_interp_end
__somnus_interp_start:
    // w0: physical address of the table. Clobbers x0-x7 only.
0:
    ldr  w1, [x0], #4          // instruction tag
    lsr  w3, w1, #16
    movz w4, #0xF0E0
    cmp  w3, w4
    b.ne 1f                    // outside the tag band: stop
    and  w3, w1, #0xFFFF
    cmp  w3, #1
    b.eq 2f                    // Poke
    cmp  w3, #2
    b.eq 3f                    // Or
    cmp  w3, #3
    b.eq 4f                    // Update
    cmp  w3, #4
    b.eq 5f                    // WaitUntil
1:
    ret                        // End
2:
    ldp  w4, w5, [x0], #8      // addr, val
    str  w5, [x4]
    b    0b
3:
    ldp  w4, w5, [x0], #8      // addr, mask
    ldr  w6, [x4]
    orr  w6, w6, w5
    str  w6, [x4]
    b    0b
4:
    ldp  w4, w5, [x0], #8      // addr, clear
    ldr  w7, [x0], #4          // set
    ldr  w6, [x4]
    bic  w6, w6, w5
    orr  w6, w6, w7
    str  w6, [x4]
    b    0b
5:
    ldp  w4, w5, [x0], #8      // addr, mask
    ldr  w7, [x0], #4          // expected
6:
    ldr  w6, [x4]
    and  w6, w6, w5
    cmp  w6, w7
    b.ne 6b
    b    0b
__somnus_interp_end:
"#
);

// ═════════════════════════════════════════════════════════════════════
// Resume trampoline
// ═════════════════════════════════════════════════════════════════════
//
// Literal offsets into the retained window, fixed by the image layout:
// continuation at byte 20 (descriptor word 5), frozen context at bytes
// 32..52 (ttbr0, ttbr1, tcr, sp, debug step counter).

global_asm!(
    r#"
    .section .text
    .balign 4
    .global __somnus_resume_start
    .global __somnus_resume_base_slot
    .global __somnus_resume_end
__somnus_resume_start:
    // Entered from the firmware resume vector, translation off.
    adr  x9, __somnus_resume_base_slot
    ldr  w0, [x9]              // retained window physical base
    ldr  w1, [x0, #48]
    add  w1, w1, #1            // bump the resume step counter
    str  w1, [x0, #48]
    ldr  w10, [x0, #44]        // frozen sp
    ldr  w11, [x0, #20]        // continuation
    ldr  w1, [x0, #40]
    msr  tcr_el1, x1
    ldr  w1, [x0, #32]
    msr  ttbr0_el1, x1
    ldr  w1, [x0, #36]
    msr  ttbr1_el1, x1
    dsb  sy
    tlbi vmalle1
    dsb  sy
    isb
    mrs  x1, sctlr_el1
    orr  x1, x1, #1
    msr  sctlr_el1, x1         // translation back on
    isb
    mov  sp, x10
    br   x11
    .balign 4
__somnus_resume_base_slot:
    .word 0
__somnus_resume_end:
"#
);

extern "C" {
    static __somnus_interp_start: u32;
    static __somnus_interp_end: u32;
    static __somnus_resume_start: u32;
    static __somnus_resume_base_slot: u32;
    static __somnus_resume_end: u32;
}

fn blob(start: *const u32, end: *const u32) -> &'static [u32] {
    // The symbols bracket a contiguous, word-aligned run of .text.
    unsafe { core::slice::from_raw_parts(start, end.offset_from(start) as usize) }
}

/// The interpreter as copyable words, ready for
/// [`crate::platform::Platform::interp`].
pub fn interpreter_code() -> &'static [u32] {
    blob(
        unsafe { addr_of!(__somnus_interp_start) },
        unsafe { addr_of!(__somnus_interp_end) },
    )
}

/// The resume trampoline as copyable words, ready for
/// [`crate::hom::HomConfig::resume_code`]. The window-base literal at
/// its tail is zero until [`HwTransition::prepare_resume`] patches the
/// assembled copy.
pub fn resume_code() -> &'static [u32] {
    blob(
        unsafe { addr_of!(__somnus_resume_start) },
        unsafe { addr_of!(__somnus_resume_end) },
    )
}

/// Word offset of the window-base literal inside [`resume_code`].
fn resume_base_slot_off() -> usize {
    let start = unsafe { addr_of!(__somnus_resume_start) };
    let slot = unsafe { addr_of!(__somnus_resume_base_slot) };
    unsafe { slot.offset_from(start) as usize }
}

// ═════════════════════════════════════════════════════════════════════
// Hardware TransitionOps
// ═════════════════════════════════════════════════════════════════════

/// [`TransitionOps`] over real EL1 system registers.
pub struct HwTransition {
    transitional_ttbr0: u64,
}

impl HwTransition {
    /// # Safety
    ///
    /// `transitional_ttbr0` must point at a live root table that
    /// identity-maps the retained window, the interpreter copy, and
    /// every device the poke tables touch.
    pub const unsafe fn new(transitional_ttbr0: u64) -> Self {
        HwTransition { transitional_ttbr0 }
    }
}

/// Clean and invalidate the data cache by set/way, every level that
/// CLIDR reports as holding data, then synchronize.
fn dcache_clean_invalidate_all() {
    let clidr: u64;
    unsafe {
        asm!("mrs {}, clidr_el1", out(reg) clidr, options(nomem, nostack));
    }
    for level in 0..7u64 {
        let ctype = (clidr >> (3 * level)) & 0b111;
        if ctype == 0 {
            break;
        }
        if ctype < 0b010 {
            // Instruction-only level, nothing dirty to push.
            continue;
        }
        let ccsidr: u64;
        unsafe {
            asm!(
                "msr csselr_el1, {sel}",
                "isb",
                "mrs {out}, ccsidr_el1",
                sel = in(reg) level << 1,
                out = out(reg) ccsidr,
                options(nomem, nostack),
            );
        }
        let line_log2 = (ccsidr & 0x7) as u32 + 4;
        let ways = ((ccsidr >> 3) & 0x3FF) as u32;
        let sets = ((ccsidr >> 13) & 0x7FFF) as u32;
        let way_shift = ways.leading_zeros();
        for set in 0..=sets {
            for way in 0..=ways {
                let operand = ((way as u64) << way_shift)
                    | ((set as u64) << line_log2)
                    | (level << 1);
                unsafe {
                    asm!("dc cisw, {}", in(reg) operand, options(nomem, nostack));
                }
            }
        }
    }
    unsafe {
        asm!("dsb sy", "isb", options(nomem, nostack));
    }
}

impl TransitionOps for HwTransition {
    fn flush_caches(&mut self) {
        dcache_clean_invalidate_all();
    }

    fn enter_transitional_mapping(&mut self) -> TranslationState {
        let (ttbr0, ttbr1, tcr): (u64, u64, u64);
        unsafe {
            asm!(
                "mrs {t0}, ttbr0_el1",
                "mrs {t1}, ttbr1_el1",
                "mrs {tc}, tcr_el1",
                t0 = out(reg) ttbr0,
                t1 = out(reg) ttbr1,
                tc = out(reg) tcr,
                options(nomem, nostack),
            );
            asm!(
                "msr ttbr0_el1, {}",
                "isb",
                "tlbi vmalle1",
                "dsb sy",
                "isb",
                in(reg) self.transitional_ttbr0,
                options(nostack),
            );
        }
        TranslationState {
            ttbr0: ttbr0 as u32,
            ttbr1: ttbr1 as u32,
            tcr: tcr as u32,
        }
    }

    fn restore_mapping(&mut self, saved: TranslationState) {
        unsafe {
            asm!(
                "msr ttbr0_el1, {t0}",
                "msr ttbr1_el1, {t1}",
                "msr tcr_el1, {tc}",
                "isb",
                "tlbi vmalle1",
                "dsb sy",
                "isb",
                t0 = in(reg) saved.ttbr0 as u64,
                t1 = in(reg) saved.ttbr1 as u64,
                tc = in(reg) saved.tcr as u64,
                options(nostack),
            );
        }
    }

    fn run_enter_table(&mut self, desc: &ImageDescriptor) {
        // The window holds a live copy of the interpreter; the
        // descriptor records where it landed.
        let enter: extern "C" fn(u32) =
            unsafe { core::mem::transmute(desc.interp_entry as usize) };
        enter(desc.enter_base);
    }

    fn run_exit_table(&mut self, desc: &ImageDescriptor) {
        let enter: extern "C" fn(u32) =
            unsafe { core::mem::transmute(desc.interp_entry as usize) };
        enter(desc.exit_base);
    }

    fn core_idle(&mut self) {
        unsafe {
            asm!(
                "msr daifclr, #2",
                "wfi",
                "msr daifset, #2",
                options(nomem, nostack),
            );
        }
    }

    fn freeze_context(&mut self) -> FrozenContext {
        let (ttbr0, ttbr1, tcr, sp): (u64, u64, u64, u64);
        unsafe {
            asm!(
                "mrs {t0}, ttbr0_el1",
                "mrs {t1}, ttbr1_el1",
                "mrs {tc}, tcr_el1",
                "mov {sp_out}, sp",
                t0 = out(reg) ttbr0,
                t1 = out(reg) ttbr1,
                tc = out(reg) tcr,
                sp_out = out(reg) sp,
                options(nomem, nostack),
            );
        }
        FrozenContext {
            ttbr0: ttbr0 as u32,
            ttbr1: ttbr1 as u32,
            tcr: tcr as u32,
            sp: sp as u32,
            debug_step: 0,
        }
    }

    fn enter_hibernate(&mut self, desc: &ImageDescriptor) {
        self.run_enter_table(desc);
        // The last table entry drops core power; if it is latched
        // rather than immediate, park here until it lands.
        loop {
            unsafe {
                asm!("wfi", options(nomem, nostack));
            }
        }
    }

    fn prepare_resume(&mut self, window: &RetainedWindow, desc: &ImageDescriptor) {
        let resume_off = window.word_off_of_phys(desc.resume_base);
        window.write_word(resume_off + resume_base_slot_off(), window.phys_base());
    }
}
