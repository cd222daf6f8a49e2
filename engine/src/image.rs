//! Retained-memory image assembly.
//!
//! For power levels that stop the main memory controller, everything the
//! transition needs must already sit in the retained-memory window:
//!
//! ```text
//! ┌────────────┬─────────┬──────────────┬─────┬──────────────┬─────┬────────┐
//! │ descriptor │ context │ interpreter  │ ... │ exit tables  │     │ resume │
//! │  (8 words) │ (5 w)   │ code         │ End │ (reverse     │ End │ code   │
//! │            │         │ enter tables │     │  reg. order) │     │ (HoM)  │
//! └────────────┴─────────┴──────────────┴─────┴──────────────┴─────┴────────┘
//! ```
//!
//! Enter tables are concatenated in registration order, exit tables in
//! reverse registration order, each group closed by a single `End` word.
//! The descriptor records the physical base of every segment at fixed
//! offsets so the resume trampoline (and the boot firmware's jump target)
//! can find them without any relocation data.
//!
//! All writes go through the window's uncached/device alias: the cached
//! mappings are about to be invalidated and must never hold the only copy
//! of this image.

use alloc::boxed::Box;

use poketable::OP_END;

use crate::addrmap::{map_virtual_to_physical, AddrRange, Segment};
use crate::component::Component;
use crate::context::{CONTEXT_WORDS, LAYOUT_VERSION};
use crate::platform::ConfigError;

/// Descriptor size in words.
pub const DESC_WORDS: usize = 8;

/// Word offset of the frozen-context record inside the window.
pub const CONTEXT_OFF: usize = DESC_WORDS;

/// Word offset where the image proper (interpreter code) begins.
pub const IMAGE_OFF: usize = DESC_WORDS + CONTEXT_WORDS;

// Descriptor word offsets. The resume trampoline hardcodes byte
// equivalents of these; see arch/aarch64.rs.
const DESC_VERSION: usize = 0;
const DESC_INTERP: usize = 1;
const DESC_ENTER: usize = 2;
const DESC_EXIT: usize = 3;
const DESC_RESUME: usize = 4;
const DESC_CONTINUATION: usize = 5;

/// The uncached alias of the retained-memory window.
pub struct RetainedWindow {
    phys_base: u32,
    alias: *mut u32,
    len_words: usize,
}

impl RetainedWindow {
    /// Wrap an already-resolved window.
    ///
    /// # Safety
    /// `alias` must point to `len_words` words of retained memory mapped
    /// uncached/device-type, valid for the lifetime of the value, and
    /// `phys_base` must be its physical base.
    pub const unsafe fn from_raw(phys_base: u32, alias: *mut u32, len_words: usize) -> Self {
        Self {
            phys_base,
            alias,
            len_words,
        }
    }

    /// Resolve a window from its virtual base and the address-space
    /// snapshot, failing with `ConfigError::MapFailed` when the range is
    /// not mapped contiguously.
    ///
    /// # Safety
    /// `alias` must be the uncached alias of the same `len_words` words.
    pub unsafe fn map(
        virt_base: u32,
        len_words: usize,
        alias: *mut u32,
        segments: &[Segment],
    ) -> Result<Self, ConfigError> {
        if alias.is_null() {
            return Err(ConfigError::MapFailed);
        }
        let range = AddrRange::new(virt_base, (len_words * 4) as u32);
        let phys = map_virtual_to_physical(range, segments).ok_or(ConfigError::MapFailed)?;
        Ok(Self::from_raw(phys.base, alias, len_words))
    }

    pub fn len_words(&self) -> usize {
        self.len_words
    }

    pub fn phys_base(&self) -> u32 {
        self.phys_base
    }

    /// Word offset of a physical address inside the window.
    pub fn word_off_of_phys(&self, phys: u32) -> usize {
        ((phys - self.phys_base) / 4) as usize
    }

    /// Physical address of word offset `off`.
    pub fn phys_of(&self, off: usize) -> u32 {
        self.phys_base + (off * 4) as u32
    }

    /// Volatile write of one word. Offsets are bounds-checked; the
    /// assembler sizes everything before writing.
    pub fn write_word(&self, off: usize, val: u32) {
        assert!(off < self.len_words);
        unsafe { core::ptr::write_volatile(self.alias.add(off), val) }
    }

    /// Volatile read of one word.
    pub fn read_word(&self, off: usize) -> u32 {
        assert!(off < self.len_words);
        unsafe { core::ptr::read_volatile(self.alias.add(off)) }
    }
}

/// Pure layout of one assembled image, in word offsets from the window
/// base. Computed before any write so sizing failures touch nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    pub interp_off: usize,
    pub interp_words: usize,
    pub enter_off: usize,
    pub enter_words: usize,
    pub exit_off: usize,
    pub exit_words: usize,
    pub resume_off: usize,
    pub resume_words: usize,
}

impl ImageLayout {
    pub fn compute(
        interp_words: usize,
        enter_words: usize,
        exit_words: usize,
        resume_words: usize,
    ) -> Self {
        let interp_off = IMAGE_OFF;
        let enter_off = interp_off + interp_words;
        // One End word closes each table group.
        let exit_off = enter_off + enter_words + 1;
        let resume_off = exit_off + exit_words + 1;
        Self {
            interp_off,
            interp_words,
            enter_off,
            enter_words,
            exit_off,
            exit_words,
            resume_off,
            resume_words,
        }
    }

    /// Size of the image proper: interpreter + tables + the two `End`
    /// group terminators + optional resume code. Excludes the descriptor
    /// and context reservation.
    pub fn image_words(&self) -> usize {
        self.interp_words + self.enter_words + self.exit_words + 2 + self.resume_words
    }

    /// Total window words consumed, reservations included.
    pub fn total_words(&self) -> usize {
        self.resume_off + self.resume_words
    }
}

/// Physical bases of the assembled segments, as recorded in the in-window
/// descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub interp_entry: u32,
    pub enter_base: u32,
    pub exit_base: u32,
    /// Zero when no resume code was laid out.
    pub resume_base: u32,
}

fn table_words(components: &[Box<dyn Component>]) -> (usize, usize) {
    let mut enter = 0usize;
    let mut exit = 0usize;
    for c in components {
        c.visit_enter_tables(&mut |t| enter += t.len());
        c.visit_exit_tables(&mut |t| exit += t.len());
    }
    (enter, exit)
}

/// Lay interpreter + tables (+ resume code) into the window.
///
/// Enter tables go in registration order, exit tables in reverse
/// registration order. Fails with `ConfigError::WindowTooSmall` before
/// writing anything if the computed total exceeds the window.
pub fn assemble_into(
    window: &RetainedWindow,
    interp: &[u32],
    components: &[Box<dyn Component>],
    resume: Option<&[u32]>,
) -> Result<ImageDescriptor, ConfigError> {
    let (enter_words, exit_words) = table_words(components);
    let resume_words = resume.map_or(0, |r| r.len());
    let layout = ImageLayout::compute(interp.len(), enter_words, exit_words, resume_words);

    let need = layout.total_words();
    let have = window.len_words();
    if need > have {
        return Err(ConfigError::WindowTooSmall { need, have });
    }

    let desc = ImageDescriptor {
        interp_entry: window.phys_of(layout.interp_off),
        enter_base: window.phys_of(layout.enter_off),
        exit_base: window.phys_of(layout.exit_off),
        resume_base: if resume.is_some() {
            window.phys_of(layout.resume_off)
        } else {
            0
        },
    };

    window.write_word(DESC_VERSION, LAYOUT_VERSION);
    window.write_word(DESC_INTERP, desc.interp_entry);
    window.write_word(DESC_ENTER, desc.enter_base);
    window.write_word(DESC_EXIT, desc.exit_base);
    window.write_word(DESC_RESUME, desc.resume_base);
    window.write_word(DESC_CONTINUATION, 0);

    let mut pos = layout.interp_off;
    for &w in interp {
        window.write_word(pos, w);
        pos += 1;
    }

    for c in components {
        c.visit_enter_tables(&mut |t| {
            for &w in t {
                window.write_word(pos, w);
                pos += 1;
            }
        });
    }
    window.write_word(pos, OP_END);
    pos += 1;

    for c in components.iter().rev() {
        c.visit_exit_tables(&mut |t| {
            for &w in t {
                window.write_word(pos, w);
                pos += 1;
            }
        });
    }
    window.write_word(pos, OP_END);
    pos += 1;

    if let Some(r) = resume {
        for &w in r {
            window.write_word(pos, w);
            pos += 1;
        }
    }
    debug_assert_eq!(pos, layout.total_words());

    Ok(desc)
}

/// Record the virtual continuation address the resume trampoline branches
/// to after translation is restored. Offset knowledge stays in this
/// module.
pub fn set_continuation(window: &RetainedWindow, continuation: u32) {
    window.write_word(DESC_CONTINUATION, continuation);
}

/// Write the frozen-context record into its reserved slot.
pub fn store_context(window: &RetainedWindow, words: &[u32; CONTEXT_WORDS]) {
    for (i, &w) in words.iter().enumerate() {
        window.write_word(CONTEXT_OFF + i, w);
    }
}
