//! Frozen CPU/translation context for hibernation-on-memory.
//!
//! The resume trampoline reads this record directly from retained memory,
//! before any normal code runs, so the layout is a wire format: fixed
//! word offsets, versioned, stable across builds. Everything outside this
//! module goes through `encode_into`/`decode` and never touches raw
//! offsets.
//!
//! # Layout (word offsets from the record base)
//!
//! | word | field      |
//! |------|------------|
//! | 0    | ttbr0      |
//! | 1    | ttbr1      |
//! | 2    | tcr        |
//! | 3    | sp         |
//! | 4    | debug_step |

/// Size of the encoded record in words.
pub const CONTEXT_WORDS: usize = 5;

/// Layout version for the whole retained-memory contract (descriptor +
/// context). Bumped on any offset change.
pub const LAYOUT_VERSION: u32 = 1;

/// Translation registers live across a transitional-mapping switch.
///
/// Saved when the orchestrator drops to the identity mapping, restored in
/// `PostEnter`. Not serialized; only [`FrozenContext`] crosses the
/// firmware handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationState {
    pub ttbr0: u32,
    pub ttbr1: u32,
    pub tcr: u32,
}

/// CPU context saved immediately before entering hibernation and consumed
/// by the resume trampoline immediately after the firmware jumps to the
/// resume vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrozenContext {
    /// Translation-table base 0.
    pub ttbr0: u32,
    /// Translation-table base 1.
    pub ttbr1: u32,
    /// Translation control value.
    pub tcr: u32,
    /// Saved stack pointer.
    pub sp: u32,
    /// Debug step counter; optional, zero when unused. The trampoline
    /// increments it at fixed points so a wedged resume can be localized
    /// post-mortem.
    pub debug_step: u32,
}

impl FrozenContext {
    /// Serialize to the fixed layout.
    pub fn encode_into(&self, out: &mut [u32; CONTEXT_WORDS]) {
        out[0] = self.ttbr0;
        out[1] = self.ttbr1;
        out[2] = self.tcr;
        out[3] = self.sp;
        out[4] = self.debug_step;
    }

    /// Deserialize from the fixed layout.
    pub fn decode(words: &[u32; CONTEXT_WORDS]) -> Self {
        Self {
            ttbr0: words[0],
            ttbr1: words[1],
            tcr: words[2],
            sp: words[3],
            debug_step: words[4],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_golden_layout() {
        // Offsets are a firmware contract; this test pins them.
        let ctx = FrozenContext {
            ttbr0: 0x4000_0000,
            ttbr1: 0x4000_4000,
            tcr: 0x0000_3520,
            sp: 0xC10F_FFF0,
            debug_step: 7,
        };
        let mut words = [0u32; CONTEXT_WORDS];
        ctx.encode_into(&mut words);
        assert_eq!(words, [0x4000_0000, 0x4000_4000, 0x0000_3520, 0xC10F_FFF0, 7]);
    }

    #[test]
    fn test_roundtrip() {
        let ctx = FrozenContext {
            ttbr0: 1,
            ttbr1: 2,
            tcr: 3,
            sp: 4,
            debug_step: 5,
        };
        let mut words = [0u32; CONTEXT_WORDS];
        ctx.encode_into(&mut words);
        assert_eq!(FrozenContext::decode(&words), ctx);
    }
}
